//! Guarded ORM layer.
//!
//! Two independent controls on top of `SeaORM`:
//!
//! - **Row filters.** Guarded queries ([`AuthSelect`], [`AuthSelectTwo`],
//!   [`AuthSelectTwoMany`], [`AuthProjection`], [`AuthUpdateMany`],
//!   [`AuthDeleteMany`]) ask every distinct entity taking part for its
//!   [`AuthPolicy::add_filters`] once, right before execution.
//! - **Field gating.** Every model a query returns is a [`Guarded`] stamped
//!   with the query's principal; field reads and writes are checked against
//!   [`AuthPolicy::blocked_read_fields`] / [`AuthPolicy::blocked_write_fields`].
//!
//! # Principals
//!
//! | Principal | Queries | Fields |
//! |-----------|---------|--------|
//! | `Allow` | run unchanged | unrestricted |
//! | `Deny` | `AccessDenied` before the engine is called | all blocked |
//! | `Identity(i)` | row filters for `i` | policy for `i` |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use rowguard_db::secure::{AuthPolicy, AuthSession, FieldSet, Guarded, GuardedFields};
//! use sea_orm::entity::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq, DeriveEntityModel, GuardedFields)]
//! #[sea_orm(table_name = "documents")]
//! pub struct Model {
//!     #[sea_orm(primary_key)]
//!     pub id: i32,
//!     pub owner: String,
//!     pub secret: String,
//! }
//!
//! impl AuthPolicy<String> for Entity {
//!     fn add_filters<Q: QueryFilter>(query: Q, identity: &String) -> Q {
//!         query.filter(Column::Owner.eq(identity.clone()))
//!     }
//! }
//!
//! let docs = session.query::<Entity>().all(&session).await?;
//! let owner: String = docs[0].owner()?;
//! ```

mod db_ops;
mod discover;
mod error;
mod fields;
mod guard;
mod policy;
mod runner;
mod select;
mod session;

pub use db_ops::{AuthDeleteMany, AuthUpdateMany};
pub use discover::{EntityDescriptor, QueryLike, discover_entities};
pub use error::AuthError;
pub use fields::FieldSet;
pub use guard::Guarded;
pub use policy::AuthPolicy;
pub use select::{AuthProjection, AuthSelect, AuthSelectTwo, AuthSelectTwoMany};
pub use session::{AuthSession, AuthTx};

pub use runner::DbRunner;
pub(crate) use runner::{DbRunnerInternal, SeaOrmRunner};

pub use rowguard_db_macros::GuardedFields;
pub use rowguard_security::{AccessDenied, DeniedAction, Identity, Principal, QueryOp};
