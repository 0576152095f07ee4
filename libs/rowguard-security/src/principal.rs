use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity value a policy is evaluated against.
///
/// Any `Clone + Debug + Display + Send + Sync` type qualifies (user ids,
/// `String`s, newtypes over UUIDs). The access layer never inspects it; it is
/// only handed to policy callbacks and rendered into errors.
pub trait Identity: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Identity for T where T: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// The acting party attached to a query and to every object it produces.
///
/// - `Allow` skips row filters and attribute checks entirely.
/// - `Deny` refuses every query before the engine is touched.
/// - `Identity(i)` is passed verbatim to the entity's policy.
///
/// `Default` is `Allow`: objects that were never produced by an authorized
/// query (constructed by hand) are unrestricted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal<I> {
    Allow,
    Deny,
    Identity(I),
}

impl<I> Principal<I> {
    #[inline]
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[inline]
    #[must_use]
    pub const fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }

    /// The identity value, if this principal carries one.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> Option<&I> {
        match self {
            Self::Identity(id) => Some(id),
            Self::Allow | Self::Deny => None,
        }
    }

    #[must_use]
    pub const fn as_ref(&self) -> Principal<&I> {
        match self {
            Self::Allow => Principal::Allow,
            Self::Deny => Principal::Deny,
            Self::Identity(id) => Principal::Identity(id),
        }
    }

    /// Convert the carried identity, keeping `Allow`/`Deny` as they are.
    #[must_use]
    pub fn map<J, F>(self, f: F) -> Principal<J>
    where
        F: FnOnce(I) -> J,
    {
        match self {
            Self::Allow => Principal::Allow,
            Self::Deny => Principal::Deny,
            Self::Identity(id) => Principal::Identity(f(id)),
        }
    }
}

impl<I> Default for Principal<I> {
    fn default() -> Self {
        Self::Allow
    }
}

impl<I> From<I> for Principal<I> {
    #[inline]
    fn from(id: I) -> Self {
        Self::Identity(id)
    }
}

impl<I: fmt::Display> fmt::Display for Principal<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
            Self::Identity(id) => write!(f, "{id}"),
        }
    }
}
