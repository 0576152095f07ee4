use std::collections::BTreeSet;

use sea_orm::{EntityTrait, IdenStatic, Iterable};

/// A set of column names, as returned by the blocked-field policy hooks.
///
/// Names are the database column names (`IdenStatic::as_str`), so a set can be
/// built from typed columns and compared against any column of the entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet {
    names: BTreeSet<String>,
}

impl FieldSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every column of `E`.
    #[must_use]
    pub fn all<E: EntityTrait>() -> Self {
        E::Column::iter().collect()
    }

    /// Builder form of [`FieldSet::insert`].
    #[must_use]
    pub fn with<C: IdenStatic>(mut self, column: C) -> Self {
        self.insert(column);
        self
    }

    pub fn insert<C: IdenStatic>(&mut self, column: C) {
        self.names.insert(column.as_str().to_owned());
    }

    pub fn insert_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names in `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            names: self.names.difference(&other.names).cloned().collect(),
        }
    }
}

impl<C: IdenStatic> FromIterator<C> for FieldSet {
    fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
        let mut set = Self::empty();
        for column in iter {
            set.insert(column);
        }
        set
    }
}
