use rowguard_security::AccessDenied;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors from guarded queries and guarded models.
///
/// Only [`AuthError::Denied`] reports a policy decision. Every other variant is
/// an engine failure or a bug and must not be presented as "forbidden".
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Denied(#[from] AccessDenied),

    /// The entity descriptors of a query do not line up with its entity slots.
    #[error("entity discovery mismatch: query has {expected} entity slots, found {found} descriptors")]
    DiscoveryMismatch { expected: usize, found: usize },

    #[error("invalid query: {0}")]
    Invalid(&'static str),

    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

impl AuthError {
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    #[must_use]
    pub fn as_access_denied(&self) -> Option<&AccessDenied> {
        match self {
            Self::Denied(denied) => Some(denied),
            Self::DiscoveryMismatch { .. } | Self::Invalid(_) | Self::Db(_) => None,
        }
    }
}
