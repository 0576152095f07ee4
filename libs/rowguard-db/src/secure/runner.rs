use sea_orm::{DatabaseConnection, DatabaseTransaction};

mod internal {
    pub trait DbRunnerInternal {
        fn as_seaorm(&self) -> super::SeaOrmRunner<'_>;
    }
}

pub(crate) use internal::DbRunnerInternal;

/// Something guarded queries can run on: an [`AuthSession`](crate::secure::AuthSession)
/// or an [`AuthTx`](crate::secure::AuthTx).
///
/// Sealed. The engine handles behind a runner are only reachable from inside
/// this crate:
///
/// ```compile_fail
/// use rowguard_db::secure::SeaOrmRunner;
/// ```
///
/// ```compile_fail
/// fn raw(session: &rowguard_db::secure::AuthSession<String>) {
///     let _ = session.as_seaorm();
/// }
/// ```
pub trait DbRunner: internal::DbRunnerInternal {}

pub enum SeaOrmRunner<'a> {
    Conn(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}
