#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # rowguard-db-macros
//!
//! Procedural macros for the `rowguard-db` guarded ORM layer.
//!
//! ## `#[derive(GuardedFields)]`
//!
//! Generates a trait with one typed getter and one typed setter per model
//! field, implemented for `Guarded<Model, I>`. Every accessor goes through the
//! guard, so the entity's `AuthPolicy` is consulted on each call.
//!
//! ```ignore
//! use rowguard_db::secure::GuardedFields;
//! use sea_orm::entity::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq, DeriveEntityModel, GuardedFields)]
//! #[sea_orm(table_name = "documents")]
//! pub struct Model {
//!     #[sea_orm(primary_key)]
//!     pub id: i32,
//!     pub owner: String,
//!     #[guarded(skip)]
//!     pub checksum: String,
//! }
//!
//! // generated:
//! // pub trait GuardedFields {
//! //     fn id(&self) -> Result<i32, AuthError>;
//! //     fn set_id(&mut self, value: i32) -> Result<(), AuthError>;
//! //     fn owner(&self) -> Result<String, AuthError>;
//! //     fn set_owner(&mut self, value: String) -> Result<(), AuthError>;
//! // }
//! ```
//!
//! ### Attributes
//!
//! - Struct: `#[guarded(trait_name = "DocumentFields")]` renames the generated trait.
//! - Field: `#[guarded(skip)]` generates no accessors for the field.

use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;
use syn::{DeriveInput, parse_macro_input};

mod guarded_fields;

/// Derive typed, policy-checked accessors for a `SeaORM` `Model`.
///
/// Must sit next to `DeriveEntityModel`: the generated code refers to the
/// sibling `Entity` and `Column` types.
#[proc_macro_derive(GuardedFields, attributes(guarded))]
#[proc_macro_error]
pub fn derive_guarded_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    guarded_fields::expand_derive_guarded_fields(input).into()
}
