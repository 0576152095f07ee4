#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Value types shared by every rowguard layer.
//!
//! A [`Principal`] is the acting party attached to queries and to the objects
//! they produce. [`AccessDenied`] is the single policy error raised when a
//! principal is refused a query, a field read or a field write.

pub mod denied;
pub mod principal;

pub use denied::{AccessDenied, DeniedAction, QueryOp};
pub use principal::{Identity, Principal};
