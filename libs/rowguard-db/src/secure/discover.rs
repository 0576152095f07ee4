use std::any::TypeId;
use std::fmt;

use rowguard_security::{AccessDenied, DeniedAction, Identity, Principal, QueryOp};
use sea_orm::{DbBackend, QueryFilter, QueryTrait};

use crate::secure::{AuthError, AuthPolicy};

/// One entity taking part in a query of shape `Q`.
///
/// Pairs the entity's runtime identity with its
/// [`AuthPolicy::add_filters`] instantiated for `Q`.
pub struct EntityDescriptor<Q, I> {
    type_id: TypeId,
    name: String,
    apply: fn(Q, &I) -> Q,
}

impl<Q, I> EntityDescriptor<Q, I>
where
    Q: QueryFilter,
    I: Identity,
{
    #[must_use]
    pub fn of<E: AuthPolicy<I>>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: E::default().table_name().to_owned(),
            apply: <E as AuthPolicy<I>>::add_filters::<Q>,
        }
    }
}

impl<Q, I> EntityDescriptor<Q, I> {
    /// Table name of the entity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<Q, I> Clone for EntityDescriptor<Q, I> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            name: self.name.clone(),
            apply: self.apply,
        }
    }
}

impl<Q, I> fmt::Debug for EntityDescriptor<Q, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reconcile a query's descriptors with its entity slots and drop repeats.
///
/// A query shape with `slots` entity positions must carry exactly one
/// descriptor per position. Repeated entity types keep their first position.
///
/// # Errors
/// `AuthError::DiscoveryMismatch` when the counts differ.
pub fn discover_entities<Q, I>(
    entities: &[EntityDescriptor<Q, I>],
    slots: usize,
) -> Result<Vec<&EntityDescriptor<Q, I>>, AuthError> {
    if entities.len() != slots {
        tracing::error!(
            expected = slots,
            found = entities.len(),
            "entity discovery does not match query shape"
        );
        return Err(AuthError::DiscoveryMismatch {
            expected: slots,
            found: entities.len(),
        });
    }

    let mut seen: Vec<TypeId> = Vec::with_capacity(entities.len());
    let mut distinct = Vec::with_capacity(entities.len());
    for entity in entities {
        if !seen.contains(&entity.type_id) {
            seen.push(entity.type_id);
            distinct.push(entity);
        }
    }
    tracing::debug!(slots, distinct = distinct.len(), "entities discovered");
    Ok(distinct)
}

/// The state every guarded query shape shares.
///
/// `slots` is the number of entity positions of the engine query shape
/// (one for `Select`, two for `SelectTwo`); `applied` records the entities
/// whose filters are already part of `inner`.
pub(crate) struct Intercepted<Q, I> {
    pub(crate) inner: Q,
    pub(crate) principal: Principal<I>,
    entities: Vec<EntityDescriptor<Q, I>>,
    slots: usize,
    applied: Vec<TypeId>,
}

impl<Q, I> Intercepted<Q, I>
where
    Q: QueryFilter,
    I: Identity,
{
    pub(crate) fn new(
        inner: Q,
        principal: Principal<I>,
        entities: Vec<EntityDescriptor<Q, I>>,
        slots: usize,
    ) -> Self {
        Self {
            inner,
            principal,
            entities,
            slots,
            applied: Vec::new(),
        }
    }

    /// Change the engine query without changing its shape.
    pub(crate) fn with_inner(mut self, f: impl FnOnce(Q) -> Q) -> Self {
        self.inner = f(self.inner);
        self
    }

    /// Move to a new query shape with its own descriptors.
    ///
    /// Entities already folded into the old shape stay marked as applied.
    pub(crate) fn reshape<Q2: QueryFilter>(
        self,
        f: impl FnOnce(Q) -> Q2,
        entities: Vec<EntityDescriptor<Q2, I>>,
        slots: usize,
    ) -> Intercepted<Q2, I> {
        Intercepted {
            inner: f(self.inner),
            principal: self.principal,
            entities,
            slots,
            applied: self.applied,
        }
    }

    /// Table name of the query's primary entity.
    pub(crate) fn primary(&self) -> &str {
        self.entities.first().map_or("<unknown>", |e| e.name.as_str())
    }

    /// Distinct participating tables, in discovery order.
    pub(crate) fn participants(&self) -> Vec<&str> {
        let mut seen: Vec<TypeId> = Vec::new();
        self.entities
            .iter()
            .filter(|e| {
                if seen.contains(&e.type_id) {
                    false
                } else {
                    seen.push(e.type_id);
                    true
                }
            })
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Fold row filters into the query for its principal.
    ///
    /// - `Deny`: refused before anything else happens.
    /// - `Allow`: the query is left as is.
    /// - `Identity(i)`: each distinct entity not yet applied contributes its
    ///   `add_filters` once, in discovery order.
    pub(crate) fn apply_row_policy(self, op: QueryOp) -> Result<Self, AuthError> {
        if self.principal.is_allow() {
            return Ok(self);
        }
        if self.principal.is_deny() {
            tracing::warn!(entity = self.primary(), op = op.as_str(), "query denied");
            return Err(
                AccessDenied::new(&self.principal, DeniedAction::Query(op), self.primary()).into(),
            );
        }

        let mut inner = self.inner;
        let mut applied = self.applied;
        if let Principal::Identity(id) = &self.principal {
            for entity in discover_entities(&self.entities, self.slots)? {
                if applied.contains(&entity.type_id) {
                    continue;
                }
                inner = (entity.apply)(inner, id);
                applied.push(entity.type_id);
                tracing::debug!(entity = %entity.name, principal = %id, "row filters applied");
            }
        }

        Ok(Self {
            inner,
            principal: self.principal,
            entities: self.entities,
            slots: self.slots,
            applied,
        })
    }
}

impl<Q, I> Intercepted<Q, I>
where
    Q: QueryFilter + QueryTrait + Clone,
    I: Identity,
{
    /// Render the SQL the query would run, filtering a copy.
    pub(crate) fn render(&self, backend: DbBackend) -> Result<String, AuthError> {
        let filtered = self.clone().apply_row_policy(QueryOp::Build)?;
        Ok(filtered.inner.build(backend).to_string())
    }
}

impl<Q: Clone, I: Clone> Clone for Intercepted<Q, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            principal: self.principal.clone(),
            entities: self.entities.clone(),
            slots: self.slots,
            applied: self.applied.clone(),
        }
    }
}

impl<Q, I: fmt::Debug> fmt::Debug for Intercepted<Q, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("principal", &self.principal)
            .field("entities", &self.entities)
            .field("applied", &self.applied.len())
            .finish_non_exhaustive()
    }
}

/// The interception hook shared by every guarded query shape.
pub trait QueryLike<I: Identity>: Sized {
    /// Principal the query runs as.
    fn principal(&self) -> &Principal<I>;

    /// Distinct participating tables, in discovery order.
    fn participants(&self) -> Vec<&str>;

    /// Fold the principal's row filters into the query.
    ///
    /// Terminal operations call this right before execution. Calling it again
    /// on an already filtered query adds nothing.
    ///
    /// # Errors
    /// `AuthError::Denied` for `Principal::Deny`;
    /// `AuthError::DiscoveryMismatch` if the query's entities cannot be resolved.
    fn apply_row_policy(self, op: QueryOp) -> Result<Self, AuthError>;

    /// The SQL this query would execute on `backend`, with row filters applied.
    ///
    /// # Errors
    /// Same as [`QueryLike::apply_row_policy`].
    fn build(&self, backend: DbBackend) -> Result<String, AuthError>;
}
