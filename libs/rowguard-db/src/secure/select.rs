use std::marker::PhantomData;

use rowguard_security::{Identity, Principal, QueryOp};
use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    ColumnAsExpr, ColumnTrait, DbBackend, EntityTrait, IntoIdentity, IntoSimpleExpr, Iterable, Order,
    PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Related, Select,
    SelectTwo, SelectTwoMany, TryGetableMany, Value,
};

use crate::secure::discover::{EntityDescriptor, Intercepted, QueryLike};
use crate::secure::{AuthError, AuthPolicy, DbRunner, DbRunnerInternal, Guarded, SeaOrmRunner};

const ONE_ENTITY: usize = 1;
const TWO_ENTITIES: usize = 2;

fn stamp<M, I: Clone>(model: M, principal: &Principal<I>) -> Guarded<M, I> {
    Guarded::new(model, principal.clone())
}

/// A `SeaORM` `Select` bound to a principal.
///
/// Row filters of the entity's [`AuthPolicy`] are folded in by the terminal
/// operations ([`all`](Self::all), [`one`](Self::one), [`count`](Self::count))
/// right before the engine runs the statement. Builder methods only shape
/// the query.
///
/// # Example
/// ```rust,ignore
/// let docs = session
///     .query::<document::Entity>()
///     .filter(document::Column::Title.contains("draft"))
///     .order_by_asc(document::Column::Id)
///     .all(&session)
///     .await?;
/// ```
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthSelect<E: EntityTrait, I> {
    pub(crate) q: Intercepted<Select<E>, I>,
}

/// Two-entity select from [`AuthSelect::find_also_related`].
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthSelectTwo<E: EntityTrait, R: EntityTrait, I> {
    pub(crate) q: Intercepted<SelectTwo<E, R>, I>,
}

/// One-to-many select from [`AuthSelect::find_with_related`].
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthSelectTwoMany<E: EntityTrait, R: EntityTrait, I> {
    pub(crate) q: Intercepted<SelectTwoMany<E, R>, I>,
}

/// Scalar projection from [`AuthSelect::into_tuple`].
///
/// Rows are filtered like any other select, but results are plain values and
/// carry no principal.
#[must_use]
#[derive(Clone, Debug)]
pub struct AuthProjection<E: EntityTrait, T, I> {
    pub(crate) q: Intercepted<Select<E>, I>,
    tuple: PhantomData<fn() -> T>,
}

impl<E, I> AuthSelect<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    pub(crate) fn new(principal: Principal<I>) -> Self {
        Self {
            q: Intercepted::new(
                E::find(),
                principal,
                vec![EntityDescriptor::of::<E>()],
                ONE_ENTITY,
            ),
        }
    }

    /// Add a caller condition. Row filters are added on top at execution.
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.q = self.q.with_inner(|s| QueryFilter::filter(s, filter));
        self
    }

    pub fn order_by<C: IntoSimpleExpr>(mut self, col: C, order: Order) -> Self {
        self.q = self.q.with_inner(|s| QueryOrder::order_by(s, col, order));
        self
    }

    pub fn order_by_asc<C: IntoSimpleExpr>(self, col: C) -> Self {
        self.order_by(col, Order::Asc)
    }

    pub fn order_by_desc<C: IntoSimpleExpr>(self, col: C) -> Self {
        self.order_by(col, Order::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.q = self.q.with_inner(|s| QuerySelect::limit(s, limit));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.q = self.q.with_inner(|s| QuerySelect::offset(s, offset));
        self
    }

    /// Clear the default column list; pair with [`column`](Self::column) and
    /// [`into_tuple`](Self::into_tuple).
    pub fn select_only(mut self) -> Self {
        self.q = self.q.with_inner(QuerySelect::select_only);
        self
    }

    pub fn column<C: ColumnTrait>(mut self, col: C) -> Self {
        self.q = self.q.with_inner(|s| QuerySelect::column(s, col));
        self
    }

    /// Select an expression under an alias, e.g. an aggregate.
    pub fn column_as<C, A>(mut self, expr: C, alias: A) -> Self
    where
        C: ColumnAsExpr,
        A: IntoIdentity,
    {
        self.q = self.q.with_inner(|s| QuerySelect::column_as(s, expr, alias));
        self
    }

    pub fn group_by<C: IntoSimpleExpr>(mut self, col: C) -> Self {
        self.q = self.q.with_inner(|s| QuerySelect::group_by(s, col));
        self
    }

    /// Narrow the query to a single primary key value.
    ///
    /// # Errors
    /// `AuthError::Invalid` if the entity's primary key is composite.
    pub fn and_id<V: Into<Value>>(self, id: V) -> Result<Self, AuthError> {
        let mut keys = E::PrimaryKey::iter();
        let (Some(key), None) = (keys.next(), keys.next()) else {
            return Err(AuthError::Invalid(
                "and_id() requires a single-column primary key",
            ));
        };
        Ok(self.filter(key.into_column().eq(id)))
    }

    /// Left-join a related entity. Both entities contribute row filters.
    pub fn find_also_related<R>(self, r: R) -> AuthSelectTwo<E, R, I>
    where
        R: AuthPolicy<I>,
        E: Related<R>,
    {
        AuthSelectTwo {
            q: self.q.reshape(
                |s| s.find_also_related(r),
                vec![EntityDescriptor::of::<E>(), EntityDescriptor::of::<R>()],
                TWO_ENTITIES,
            ),
        }
    }

    /// Fetch each row with all of its related rows. Both entities contribute
    /// row filters.
    pub fn find_with_related<R>(self, r: R) -> AuthSelectTwoMany<E, R, I>
    where
        R: AuthPolicy<I>,
        E: Related<R>,
    {
        AuthSelectTwoMany {
            q: self.q.reshape(
                |s| s.find_with_related(r),
                vec![EntityDescriptor::of::<E>(), EntityDescriptor::of::<R>()],
                TWO_ENTITIES,
            ),
        }
    }

    /// Project rows into plain values.
    pub fn into_tuple<T: TryGetableMany>(self) -> AuthProjection<E, T, I> {
        AuthProjection {
            q: self.q,
            tuple: PhantomData,
        }
    }

    /// Run the query and stamp every model with the query's principal.
    ///
    /// # Errors
    /// `AuthError::Denied` for `Principal::Deny` (the engine is not called),
    /// `AuthError::Db` if the engine fails.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn all(self, runner: &impl DbRunner) -> Result<Vec<Guarded<E::Model, I>>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let rows = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.all(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.all(tx).await?,
        };
        Ok(rows.into_iter().map(|m| stamp(m, &q.principal)).collect())
    }

    /// Run the query and return at most one stamped model.
    ///
    /// # Errors
    /// Same as [`all`](Self::all).
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn one(self, runner: &impl DbRunner) -> Result<Option<Guarded<E::Model, I>>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let row = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.one(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.one(tx).await?,
        };
        Ok(row.map(|m| stamp(m, &q.principal)))
    }

    /// Count the rows visible to the principal.
    ///
    /// # Errors
    /// Same as [`all`](Self::all).
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn count(self, runner: &impl DbRunner) -> Result<u64, AuthError>
    where
        E::Model: sea_orm::FromQueryResult + Send + Sync,
    {
        let q = self.q.apply_row_policy(QueryOp::Count)?;
        match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => Ok(q.inner.count(db).await?),
            SeaOrmRunner::Tx(tx) => Ok(q.inner.count(tx).await?),
        }
    }
}

impl<E, R, I> AuthSelectTwo<E, R, I>
where
    E: AuthPolicy<I>,
    R: AuthPolicy<I>,
    I: Identity,
{
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.q = self.q.with_inner(|s| QueryFilter::filter(s, filter));
        self
    }

    pub fn order_by<C: IntoSimpleExpr>(mut self, col: C, order: Order) -> Self {
        self.q = self.q.with_inner(|s| QueryOrder::order_by(s, col, order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.q = self.q.with_inner(|s| QuerySelect::limit(s, limit));
        self
    }

    /// # Errors
    /// Same as [`AuthSelect::all`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn all(
        self,
        runner: &impl DbRunner,
    ) -> Result<Vec<(Guarded<E::Model, I>, Option<Guarded<R::Model, I>>)>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let rows = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.all(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.all(tx).await?,
        };
        let p = &q.principal;
        Ok(rows
            .into_iter()
            .map(|(e, r)| (stamp(e, p), r.map(|r| stamp(r, p))))
            .collect())
    }

    /// # Errors
    /// Same as [`AuthSelect::all`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn one(
        self,
        runner: &impl DbRunner,
    ) -> Result<Option<(Guarded<E::Model, I>, Option<Guarded<R::Model, I>>)>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let row = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.one(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.one(tx).await?,
        };
        let p = &q.principal;
        Ok(row.map(|(e, r)| (stamp(e, p), r.map(|r| stamp(r, p)))))
    }
}

impl<E, R, I> AuthSelectTwoMany<E, R, I>
where
    E: AuthPolicy<I>,
    R: AuthPolicy<I>,
    I: Identity,
{
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.q = self.q.with_inner(|s| QueryFilter::filter(s, filter));
        self
    }

    pub fn order_by<C: IntoSimpleExpr>(mut self, col: C, order: Order) -> Self {
        self.q = self.q.with_inner(|s| QueryOrder::order_by(s, col, order));
        self
    }

    /// # Errors
    /// Same as [`AuthSelect::all`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn all(
        self,
        runner: &impl DbRunner,
    ) -> Result<Vec<(Guarded<E::Model, I>, Vec<Guarded<R::Model, I>>)>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let rows = match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => q.inner.all(db).await?,
            SeaOrmRunner::Tx(tx) => q.inner.all(tx).await?,
        };
        let p = &q.principal;
        Ok(rows
            .into_iter()
            .map(|(e, related)| {
                let related = related.into_iter().map(|r| stamp(r, p)).collect();
                (stamp(e, p), related)
            })
            .collect())
    }
}

impl<E, T, I> AuthProjection<E, T, I>
where
    E: AuthPolicy<I>,
    T: TryGetableMany,
    I: Identity,
{
    /// # Errors
    /// Same as [`AuthSelect::all`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn all(self, runner: &impl DbRunner) -> Result<Vec<T>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let select = q.inner.into_tuple::<T>();
        match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => Ok(select.all(db).await?),
            SeaOrmRunner::Tx(tx) => Ok(select.all(tx).await?),
        }
    }

    /// # Errors
    /// Same as [`AuthSelect::all`].
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = self.q.primary(), principal = %self.q.principal)
    )]
    pub async fn one(self, runner: &impl DbRunner) -> Result<Option<T>, AuthError> {
        let q = self.q.apply_row_policy(QueryOp::Select)?;
        let select = q.inner.into_tuple::<T>();
        match DbRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => Ok(select.one(db).await?),
            SeaOrmRunner::Tx(tx) => Ok(select.one(tx).await?),
        }
    }
}

impl<E, I> QueryLike<I> for AuthSelect<E, I>
where
    E: AuthPolicy<I>,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}

impl<E, R, I> QueryLike<I> for AuthSelectTwo<E, R, I>
where
    E: AuthPolicy<I>,
    R: AuthPolicy<I>,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}

impl<E, R, I> QueryLike<I> for AuthSelectTwoMany<E, R, I>
where
    E: AuthPolicy<I>,
    R: AuthPolicy<I>,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}

impl<E, T, I> QueryLike<I> for AuthProjection<E, T, I>
where
    E: AuthPolicy<I>,
    T: TryGetableMany,
    I: Identity,
{
    fn principal(&self) -> &Principal<I> {
        &self.q.principal
    }

    fn participants(&self) -> Vec<&str> {
        self.q.participants()
    }

    fn apply_row_policy(mut self, op: QueryOp) -> Result<Self, AuthError> {
        self.q = self.q.apply_row_policy(op)?;
        Ok(self)
    }

    fn build(&self, backend: DbBackend) -> Result<String, AuthError> {
        self.q.render(backend)
    }
}
