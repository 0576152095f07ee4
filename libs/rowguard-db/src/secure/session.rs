//! Entry point for guarded data access.
//!
//! An [`AuthSession`] owns the connection and a default principal. Every query
//! it builds carries that principal unless the caller overrides it for a
//! single call with the `*_as` variants.
//!
//! ```ignore
//! let session = AuthSession::new(conn, Principal::Identity("alice".to_owned()));
//!
//! // runs as alice
//! let mine = session.query::<document::Entity>().all(&session).await?;
//!
//! // runs unrestricted, this call only
//! let all = session.query_as::<document::Entity>(Principal::Allow).all(&session).await?;
//! ```

use std::sync::Arc;

use rowguard_security::{Identity, Principal};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, TransactionTrait, Value,
};

use crate::config::{DbConfig, SessionConfig, connect_db};
use crate::secure::{
    AuthDeleteMany, AuthError, AuthPolicy, AuthSelect, AuthUpdateMany, DbRunner, DbRunnerInternal,
    SeaOrmRunner,
};

/// Connection plus default principal.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone, Debug)]
pub struct AuthSession<I> {
    conn: Arc<DatabaseConnection>,
    principal: Principal<I>,
}

impl<I: Identity> AuthSession<I> {
    #[must_use]
    pub fn new(conn: DatabaseConnection, principal: Principal<I>) -> Self {
        tracing::debug!(principal = %principal, "auth session opened");
        Self {
            conn: Arc::new(conn),
            principal,
        }
    }

    /// Open a connection from `config` and wrap it.
    ///
    /// # Errors
    /// See [`connect_db`].
    pub async fn connect(config: &DbConfig, principal: Principal<I>) -> Result<Self, AuthError> {
        let conn = connect_db(config).await?;
        Ok(Self::new(conn, principal))
    }

    /// Open a session from a [`SessionConfig`].
    ///
    /// # Errors
    /// See [`connect_db`].
    pub async fn from_config(config: &SessionConfig<I>) -> Result<Self, AuthError> {
        Self::connect(&config.db, config.default_principal.clone()).await
    }

    /// Default principal of this session.
    #[must_use]
    pub fn principal(&self) -> &Principal<I> {
        &self.principal
    }

    /// A session on the same connection with a different default principal.
    #[must_use]
    pub fn with_principal(&self, principal: Principal<I>) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            principal,
        }
    }

    /// Select from `E` as the session principal.
    pub fn query<E: AuthPolicy<I>>(&self) -> AuthSelect<E, I> {
        self.query_as(self.principal.clone())
    }

    /// Select from `E` as `principal` instead of the session default.
    #[allow(clippy::unused_self)]
    pub fn query_as<E: AuthPolicy<I>>(&self, principal: Principal<I>) -> AuthSelect<E, I> {
        AuthSelect::new(principal)
    }

    /// Select a single row of `E` by primary key, as the session principal.
    ///
    /// # Errors
    /// `AuthError::Invalid` if the primary key is composite.
    pub fn find_by_id<E: AuthPolicy<I>>(
        &self,
        id: impl Into<Value>,
    ) -> Result<AuthSelect<E, I>, AuthError> {
        self.query::<E>().and_id(id)
    }

    pub fn update_many<E: AuthPolicy<I>>(&self) -> AuthUpdateMany<E, I> {
        self.update_many_as(self.principal.clone())
    }

    #[allow(clippy::unused_self)]
    pub fn update_many_as<E: AuthPolicy<I>>(&self, principal: Principal<I>) -> AuthUpdateMany<E, I> {
        AuthUpdateMany::new(principal)
    }

    pub fn delete_many<E: AuthPolicy<I>>(&self) -> AuthDeleteMany<E, I> {
        self.delete_many_as(self.principal.clone())
    }

    #[allow(clippy::unused_self)]
    pub fn delete_many_as<E: AuthPolicy<I>>(&self, principal: Principal<I>) -> AuthDeleteMany<E, I> {
        AuthDeleteMany::new(principal)
    }

    /// Start a transaction carrying the session principal.
    ///
    /// # Errors
    /// `AuthError::Db` if the engine cannot begin a transaction.
    pub async fn begin(&self) -> Result<AuthTx<I>, AuthError> {
        let tx = self.conn.begin().await?;
        Ok(AuthTx {
            tx,
            principal: self.principal.clone(),
        })
    }

    /// Database engine identifier for tracing / logging.
    #[must_use]
    pub fn db_engine(&self) -> &'static str {
        match self.conn.get_database_backend() {
            DbBackend::Postgres => "postgres",
            DbBackend::MySql => "mysql",
            DbBackend::Sqlite => "sqlite",
        }
    }
}

impl<I: Identity> DbRunner for AuthSession<I> {}

impl<I: Identity> DbRunnerInternal for AuthSession<I> {
    fn as_seaorm(&self) -> SeaOrmRunner<'_> {
        SeaOrmRunner::Conn(&self.conn)
    }
}

/// An open transaction started by [`AuthSession::begin`].
///
/// Queries run on it by passing it as the runner. Dropped without
/// [`commit`](Self::commit), the transaction is rolled back.
#[derive(Debug)]
pub struct AuthTx<I> {
    tx: DatabaseTransaction,
    principal: Principal<I>,
}

impl<I: Identity> AuthTx<I> {
    /// Principal inherited from the session that opened the transaction.
    #[must_use]
    pub fn principal(&self) -> &Principal<I> {
        &self.principal
    }

    /// # Errors
    /// `AuthError::Db` if the commit fails.
    pub async fn commit(self) -> Result<(), AuthError> {
        self.tx.commit().await?;
        tracing::debug!(principal = %self.principal, "transaction committed");
        Ok(())
    }

    /// # Errors
    /// `AuthError::Db` if the rollback fails.
    pub async fn rollback(self) -> Result<(), AuthError> {
        self.tx.rollback().await?;
        tracing::debug!(principal = %self.principal, "transaction rolled back");
        Ok(())
    }
}

impl<I: Identity> DbRunner for AuthTx<I> {}

impl<I: Identity> DbRunnerInternal for AuthTx<I> {
    fn as_seaorm(&self) -> SeaOrmRunner<'_> {
        SeaOrmRunner::Tx(&self.tx)
    }
}
