use std::cell::Cell;
use std::fmt;

use rowguard_security::{AccessDenied, DeniedAction, Identity, Principal};
use sea_orm::sea_query::ValueType;
use sea_orm::{DbErr, EntityName, EntityTrait, IdenStatic, ModelTrait, Value};

use crate::secure::{AuthError, AuthPolicy, FieldSet};

type ColumnOf<M> = <<M as ModelTrait>::Entity as EntityTrait>::Column;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Raises the evaluation flag for as long as it lives.
///
/// Lowering happens in `Drop`, so the flag is cleared on early return and on
/// unwinding out of a policy callback.
struct ReentrancyFlag<'a>(&'a Cell<bool>);

impl<'a> ReentrancyFlag<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ReentrancyFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A materialized model stamped with the principal that produced it.
///
/// Field access goes through [`get`](Self::get), [`read`](Self::read) and
/// [`set`](Self::set), one column at a time; the model itself is never handed
/// out. Each call recomputes the blocked set from the entity's
/// [`AuthPolicy`] and refuses blocked fields with [`AuthError::Denied`]:
///
/// - `Principal::Allow`: no check at all;
/// - `Principal::Deny`: every column is blocked;
/// - `Principal::Identity(i)`: `blocked_read_fields` / `blocked_write_fields`.
///
/// While the policy runs, the object's evaluation flag is raised and accesses
/// made from inside the policy are not checked. This is what lets a policy
/// look at the object it is deciding about. The flag lives in a [`Cell`], so
/// a `Guarded` cannot be shared across threads.
pub struct Guarded<M, I> {
    model: M,
    principal: Principal<I>,
    evaluating: Cell<bool>,
}

impl<M, I> Guarded<M, I> {
    #[must_use]
    pub fn new(model: M, principal: Principal<I>) -> Self {
        Self {
            model,
            principal,
            evaluating: Cell::new(false),
        }
    }

    /// The principal this object was produced for.
    #[must_use]
    pub fn principal(&self) -> &Principal<I> {
        &self.principal
    }

    #[cfg(test)]
    pub(crate) fn is_evaluating(&self) -> bool {
        self.evaluating.get()
    }
}

impl<M, I> Guarded<M, I>
where
    M: ModelTrait,
    I: Identity,
    M::Entity: AuthPolicy<I> + EntityTrait<Model = M>,
{
    /// Read a column as a `Value`.
    ///
    /// # Errors
    /// `AuthError::Denied` if the column is blocked for read.
    pub fn get(&self, column: ColumnOf<M>) -> Result<Value, AuthError> {
        self.check(&column, Access::Read)?;
        Ok(self.model.get(column))
    }

    /// Read a column converted to `T`.
    ///
    /// # Errors
    /// `AuthError::Denied` if the column is blocked for read, `AuthError::Db`
    /// if the stored value is not a `T`.
    pub fn read<T: ValueType>(&self, column: ColumnOf<M>) -> Result<T, AuthError> {
        let value = self.get(column)?;
        <T as ValueType>::try_from(value).map_err(|err| {
            AuthError::Db(DbErr::Type(format!("column `{}`: {err}", column.as_str())))
        })
    }

    /// Assign a column.
    ///
    /// # Errors
    /// `AuthError::Denied` if the column is blocked for write, `AuthError::Db`
    /// if `value` does not fit the column type. The model is left unchanged
    /// on error.
    pub fn set(&mut self, column: ColumnOf<M>, value: impl Into<Value>) -> Result<(), AuthError> {
        self.check(&column, Access::Write)?;
        self.model.try_set(column, value.into())?;
        Ok(())
    }

    /// Columns currently blocked for read. Empty for `Principal::Allow`.
    #[must_use]
    pub fn blocked_read_fields(&self) -> FieldSet {
        self.evaluate(Access::Read)
    }

    /// Columns currently blocked for write. Empty for `Principal::Allow`.
    #[must_use]
    pub fn blocked_write_fields(&self) -> FieldSet {
        self.evaluate(Access::Write)
    }

    /// All columns of the entity minus those blocked for read.
    #[must_use]
    pub fn readable_fields(&self) -> FieldSet {
        FieldSet::all::<M::Entity>().difference(&self.blocked_read_fields())
    }

    /// All columns of the entity minus those blocked for write.
    #[must_use]
    pub fn writable_fields(&self) -> FieldSet {
        FieldSet::all::<M::Entity>().difference(&self.blocked_write_fields())
    }

    fn check(&self, column: &ColumnOf<M>, access: Access) -> Result<(), AuthError> {
        if self.principal.is_allow() || self.evaluating.get() {
            return Ok(());
        }

        let field = column.as_str();
        if !self.evaluate(access).contains(field) {
            return Ok(());
        }

        let entity = M::Entity::default();
        tracing::debug!(
            entity = entity.table_name(),
            field,
            principal = %self.principal,
            access = access.as_str(),
            "attribute access denied"
        );
        let action = match access {
            Access::Read => DeniedAction::Read(field.to_owned()),
            Access::Write => DeniedAction::Write(field.to_owned()),
        };
        Err(AccessDenied::new(&self.principal, action, entity.table_name()).into())
    }

    /// Compute the blocked set with the evaluation flag raised.
    ///
    /// Called from inside a running evaluation it yields an empty set, the
    /// same answer every nested access gets.
    fn evaluate(&self, access: Access) -> FieldSet {
        if self.evaluating.get() {
            return FieldSet::empty();
        }
        let id = match &self.principal {
            Principal::Allow => return FieldSet::empty(),
            Principal::Deny => return FieldSet::all::<M::Entity>(),
            Principal::Identity(id) => id,
        };

        let _flag = ReentrancyFlag::raise(&self.evaluating);
        match access {
            Access::Read => <M::Entity as AuthPolicy<I>>::blocked_read_fields(self, id),
            Access::Write => <M::Entity as AuthPolicy<I>>::blocked_write_fields(self, id),
        }
    }
}

impl<M, I> From<M> for Guarded<M, I> {
    /// Wrap a hand-built model. It carries `Principal::Allow`.
    fn from(model: M) -> Self {
        Self::new(model, Principal::Allow)
    }
}

impl<M: Clone, I: Clone> Clone for Guarded<M, I> {
    fn clone(&self) -> Self {
        Self::new(self.model.clone(), self.principal.clone())
    }
}

impl<M, I: fmt::Debug> fmt::Debug for Guarded<M, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("model", &std::any::type_name::<M>())
            .field("principal", &self.principal)
            .field("evaluating", &self.evaluating.get())
            .finish()
    }
}
