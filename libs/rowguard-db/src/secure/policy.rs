use rowguard_security::Identity;
use sea_orm::{EntityTrait, QueryFilter};

use crate::secure::{FieldSet, Guarded};

/// Per-entity access policy for principals of identity type `I`.
///
/// Every method has an allow-everything default, so an entity that should be
/// unrestricted only needs an empty impl:
///
/// ```rust,ignore
/// impl AuthPolicy<UserId> for tag::Entity {}
/// ```
///
/// None of the hooks are consulted for `Principal::Allow`, and
/// `Principal::Deny` never reaches them either: queries are refused and every
/// field counts as blocked.
///
/// # Example
/// ```rust,ignore
/// impl AuthPolicy<String> for document::Entity {
///     fn add_filters<Q: QueryFilter>(query: Q, identity: &String) -> Q {
///         query.filter(document::Column::Owner.eq(identity.clone()))
///     }
///
///     fn blocked_read_fields(doc: &Guarded<document::Model, String>, identity: &String) -> FieldSet {
///         // Reading `owner` here is not re-checked.
///         match doc.get(document::Column::Owner) {
///             Ok(owner) if owner == sea_orm::Value::from(identity.clone()) => FieldSet::empty(),
///             _ => FieldSet::empty().with(document::Column::Secret),
///         }
///     }
/// }
/// ```
pub trait AuthPolicy<I: Identity>: EntityTrait {
    /// Restrict the rows of this entity visible to `identity`.
    ///
    /// Called at most once per query for each distinct entity taking part in
    /// it, in discovery order, right before the query runs. `Q` is whatever
    /// shape the query has (plain select, two-entity select, update, delete),
    /// so the predicates should only reference this entity's columns.
    fn add_filters<Q>(query: Q, identity: &I) -> Q
    where
        Q: QueryFilter,
    {
        let _ = identity;
        query
    }

    /// Columns `identity` may not read on `object`.
    ///
    /// The policy may read `object`'s own fields while deciding; those reads
    /// bypass the check.
    fn blocked_read_fields(object: &Guarded<Self::Model, I>, identity: &I) -> FieldSet {
        let _ = (object, identity);
        FieldSet::empty()
    }

    /// Columns `identity` may not write on `object`.
    fn blocked_write_fields(object: &Guarded<Self::Model, I>, identity: &I) -> FieldSet {
        let _ = (object, identity);
        FieldSet::empty()
    }
}
