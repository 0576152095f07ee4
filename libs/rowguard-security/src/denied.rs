use crate::principal::Principal;
use std::fmt;

/// Query operations that can be refused outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryOp {
    Select,
    Count,
    Update,
    Delete,
    /// Rendering the SQL a query would run.
    Build,
}

impl QueryOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the principal attempted when it was refused.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeniedAction {
    Query(QueryOp),
    Read(String),
    Write(String),
}

impl DeniedAction {
    /// The field name for attribute denials.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Read(field) | Self::Write(field) => Some(field),
            Self::Query(_) => None,
        }
    }
}

impl fmt::Display for DeniedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(op) => write!(f, "{op}"),
            Self::Read(field) => write!(f, "read field `{field}`"),
            Self::Write(field) => write!(f, "write field `{field}`"),
        }
    }
}

/// Policy refusal: a principal may not perform `action` on `entity`.
///
/// The principal is kept in its rendered form so the error stays independent
/// of the identity type and can cross API boundaries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("access denied: {principal} may not {action} on `{entity}`")]
pub struct AccessDenied {
    principal: String,
    action: DeniedAction,
    entity: String,
}

impl AccessDenied {
    #[must_use]
    pub fn new<I: fmt::Display>(
        principal: &Principal<I>,
        action: DeniedAction,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.to_string(),
            action,
            entity: entity.into(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    #[must_use]
    pub fn action(&self) -> &DeniedAction {
        &self.action
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }
}
