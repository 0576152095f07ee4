#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Row- and attribute-level access control over `SeaORM`.
//!
//! Applications talk to an [`secure::AuthSession`], which attaches a
//! [`Principal`](rowguard_security::Principal) to every query. Row filters are
//! folded into the query right before execution and every returned model is
//! wrapped in [`secure::Guarded`], which checks field reads and writes against
//! the entity's [`secure::AuthPolicy`].

pub mod config;
pub mod secure;

pub use config::{DbConfig, SessionConfig, connect_db};
