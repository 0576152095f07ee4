use rowguard_security::{Identity, Principal, QueryOp};
use sea_orm::sea_query::{IntoCondition, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, DbBackend, DeleteMany, DeleteResult, EntityTrait, QueryFilter, UpdateMany,
    UpdateResult,
};

use crate::secure::discover::{EntityDescriptor, Intercepted, QueryLike};
use crate::secure::{AuthError, AuthPolicy, DbRunner, DbRunnerInternal, SeaOrmRunner};

/// A `SeaORM` `UpdateMany` bound to a principal.
///
/// The entity's row filters are folded into the `WHERE` clause right before
/// [`exec`](Self::exec), so an identity can only touch rows it could select.
///
/// # Example
/// ```ignore
/// session
///     .update_many::<document::Entity>()
///     .col_expr(document::Column::Title, Expr::value("archived"))
///     .filter(document::Column::FolderId.eq(7))
///     .exec(&session)
///     .await?;
/// ```
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthUpdateMany<E: EntityTrait, I> {
    pub(crate) q: Intercepted<UpdateMany<E>, I>,
}

impl<E, I> AuthUpdateMany<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    pub(crate) fn new(principal: Principal<I>) -> Self {
        Self {
            q: Intercepted::new(
                E::update_many(),
                principal,
                vec![EntityDescriptor::of::<E>()],
                1,
            ),
        }
    }

    /// Set a column expression (mirrors `SeaORM`'s `UpdateMany::col_expr`).
    pub fn col_expr(mut self, col: E::Column, expr: SimpleExpr) -> Self {
        self.q = self.q.with_inner(|u| u.col_expr(col, expr));
        self
    }

    /// Set every `Set` column of an active model.
    pub fn set<A>(mut self, model: A) -> Self
    where
        A: ActiveModelTrait<Entity = E>,
    {
        self.q = self.q.with_inner(|u| u.set(model));
        self
    }

    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.q = self.q.with_inner(|u| QueryFilter::filter(u, filter));
        self
    }

    /// Execute the update.
    ///
    /// # Errors
    /// `AuthError::Denied` for `Principal::Deny` (nothing is sent to the engine),
    /// `AuthError::Db` if the engine fails.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn exec(self, runner: &impl DbRunner) -> Result<UpdateResult, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Update)?;
        let res = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.exec(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.exec(tx).await?,
        };
        tracing::debug!(rows_affected = res.rows_affected, "update executed");
        Ok(res)
    }
}

/// A `SeaORM` `DeleteMany` bound to a principal.
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthDeleteMany<E: EntityTrait, I> {
    pub(crate) q: Intercepted<DeleteMany<E>, I>,
}

impl<E, I> AuthDeleteMany<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    pub(crate) fn new(principal: Principal<I>) -> Self {
        Self {
            q: Intercepted::new(
                E::delete_many(),
                principal,
                vec![EntityDescriptor::of::<E>()],
                1,
            ),
        }
    }

    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.q = self.q.with_inner(|d| QueryFilter::filter(d, filter));
        self
    }

    /// Execute the delete.
    ///
    /// # Errors
    /// `AuthError::Denied` for `Principal::Deny` (nothing is sent to the engine),
    /// `AuthError::Db` if the engine fails.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn exec(self, runner: &impl DbRunner) -> Result<DeleteResult, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Delete)?;
        let res = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.exec(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.exec(tx).await?,
        };
        tracing::debug!(rows_affected = res.rows_affected, "delete executed");
        Ok(res)
    }
}

impl<E, I> QueryLike<I> for AuthUpdateMany<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}

impl<E, I> QueryLike<I> for AuthDeleteMany<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}
