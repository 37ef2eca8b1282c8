//! Generic CRUD shared by every entity repository.
//!
//! A [`Record`] ties a domain type to its sea-orm entity and knows how to turn
//! caller input into an `ActiveModel`. [`Repository<R>`] then provides the
//! same find/create/update/delete/count contract for all of them.

use std::{fmt, marker::PhantomData};

use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, FromQueryResult, IntoActiveModel, ModelTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QueryResult, QuerySelect, Statement, TransactionTrait, Value,
    prelude::{ColumnTrait, Expr},
    sea_query::{ConditionExpression, SimpleExpr},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{RepositoryError, ResultRepo, error::StorageContext};

pub(crate) type ColumnOf<R> = <<R as Record>::Entity as EntityTrait>::Column;

/// A domain record persisted in one table.
pub trait Record: Sized + Send + Sync + 'static {
    type Entity: EntityTrait<Model = Self::Model>;
    type Model: ModelTrait<Entity = Self::Entity>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModel>
        + Send
        + Sync;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send + 'static;
    /// Creation input.
    type New: Send;
    /// Partial update input.
    type Patch: Send;

    /// Entity name used in logs and error messages.
    const NAME: &'static str;

    fn id_column() -> ColumnOf<Self>;
    fn created_at_column() -> ColumnOf<Self>;
    fn updated_at_column() -> ColumnOf<Self>;

    fn id(&self) -> Uuid;

    fn from_model(model: Self::Model) -> ResultRepo<Self>;

    /// Every column set from the record, for `save`.
    fn to_active_model(&self) -> ResultRepo<Self::ActiveModel>;

    /// Checks a full record before `save` writes it.
    fn validate_record(&self) -> ResultRepo<()>;

    /// Refuses changes to `stored` that only a dedicated operation may make.
    fn check_replace(&self, _stored: &Self) -> ResultRepo<()> {
        Ok(())
    }

    /// Validates creation input. Id and timestamps are stamped by the repository.
    fn new_active_model(input: Self::New) -> ResultRepo<Self::ActiveModel>;

    /// Validates a patch; only the fields it carries are set.
    fn patch_active_model(patch: Self::Patch) -> ResultRepo<Self::ActiveModel>;
}

/// Criteria for `find`-style calls: filter, ordering and slicing.
pub struct FindOptions<R: Record> {
    pub condition: Condition,
    pub order: Vec<(ColumnOf<R>, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl<R: Record> FindOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(condition: Condition) -> Self {
        Self {
            condition,
            ..Self::default()
        }
    }

    pub fn and(mut self, condition: impl Into<ConditionExpression>) -> Self {
        self.condition = self.condition.add(condition);
        self
    }

    pub fn order_by(mut self, column: ColumnOf<R>, order: Order) -> Self {
        self.order.push((column, order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl<R: Record> Default for FindOptions<R> {
    fn default() -> Self {
        Self {
            condition: Condition::all(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

impl<R: Record> Clone for FindOptions<R> {
    fn clone(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<R: Record> fmt::Debug for FindOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindOptions")
            .field("condition", &self.condition)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

/// One page of results. `total` counts every match, not just this page.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

pub struct Repository<R: Record> {
    pub(crate) db: DatabaseConnection,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self::new(self.db.clone())
    }
}

impl<R: Record> fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").field("entity", &R::NAME).finish()
    }
}

fn op(verb: &str, entity: &str) -> String {
    format!("{verb} {entity}")
}

impl<R: Record> Repository<R> {
    pub(crate) fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> ResultRepo<Option<R>> {
        R::Entity::find()
            .filter(R::id_column().eq(id))
            .one(&self.db)
            .await
            .context_id(&op("find", R::NAME), id)?
            .map(R::from_model)
            .transpose()
    }

    pub async fn find_one(&self, condition: Condition) -> ResultRepo<Option<R>> {
        R::Entity::find()
            .filter(condition)
            .one(&self.db)
            .await
            .context(&op("find", R::NAME))?
            .map(R::from_model)
            .transpose()
    }

    /// Every match. Without a limit in `options` this reads the whole table.
    pub async fn find(&self, options: FindOptions<R>) -> ResultRepo<Vec<R>> {
        let mut query = R::Entity::find().filter(options.condition);
        for (column, order) in options.order {
            query = query.order_by(column, order);
        }
        if let Some(limit) = options.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = options.offset {
            query = query.offset(offset);
        }
        let models = query.all(&self.db).await.context(&op("list", R::NAME))?;
        models.into_iter().map(R::from_model).collect()
    }

    /// Slices `options` into pages of `limit` rows, `page` counted from 1.
    ///
    /// The id is appended as a final sort key so pages never overlap.
    pub async fn find_with_pagination(
        &self,
        page: u64,
        limit: u64,
        options: FindOptions<R>,
    ) -> ResultRepo<Page<R>> {
        if page == 0 {
            return Err(RepositoryError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if limit == 0 {
            return Err(RepositoryError::Validation(
                "limit must be greater than 0".to_string(),
            ));
        }

        // Drivers bind LIMIT and OFFSET as signed 64-bit integers.
        let offset = (page - 1)
            .checked_mul(limit)
            .filter(|offset| i64::try_from(*offset).is_ok() && i64::try_from(limit).is_ok())
            .ok_or_else(|| {
                RepositoryError::Validation(format!(
                    "page {page} with limit {limit} is out of range"
                ))
            })?;

        let total = self.count(options.condition.clone()).await?;
        let options = options
            .order_by(R::id_column(), Order::Asc)
            .limit(limit)
            .offset(offset);
        let data = self.find(options).await?;

        Ok(Page {
            data,
            total,
            page,
            limit,
        })
    }

    pub async fn create(&self, input: R::New) -> ResultRepo<R> {
        let active = Self::stamp_new(R::new_active_model(input)?, Uuid::new_v4());
        let model = active
            .insert(&self.db)
            .await
            .context(&op("create", R::NAME))?;
        let record = R::from_model(model)?;
        debug!(entity = R::NAME, operation = "create", id = %record.id(), "record created");
        Ok(record)
    }

    /// Persists a full record: updates the row with the same id, or inserts
    /// it when no such row exists. `created_at` of an existing row is kept.
    ///
    /// The record is validated like creation input, and changes reserved to
    /// dedicated operations (reparenting or archiving a category) are refused.
    pub async fn save(&self, record: &R) -> ResultRepo<R> {
        let id = record.id();
        record.validate_record()?;
        let mut active = record.to_active_model()?;

        let Some(stored) = self.find_by_id(id).await? else {
            let active = Self::stamp_new(active, id);
            let model = active
                .insert(&self.db)
                .await
                .context_id(&op("save", R::NAME), id)?;
            debug!(entity = R::NAME, operation = "save", %id, inserted = true, "record saved");
            return R::from_model(model);
        };
        record.check_replace(&stored)?;

        active.not_set(R::id_column());
        active.not_set(R::created_at_column());
        active.set(R::updated_at_column(), Value::from(Utc::now()));
        R::Entity::update_many()
            .set(active)
            .filter(R::id_column().eq(id))
            .exec(&self.db)
            .await
            .context_id(&op("save", R::NAME), id)?;
        debug!(entity = R::NAME, operation = "save", %id, inserted = false, "record saved");

        self.find_by_id(id).await?.ok_or_else(|| {
            RepositoryError::InvalidState(format!("{} {id} vanished while saving", R::NAME))
        })
    }

    /// Applies `patch` and returns the row as stored afterwards, or `None`
    /// when no row has this id.
    pub async fn update(&self, id: Uuid, patch: R::Patch) -> ResultRepo<Option<R>> {
        let active = R::patch_active_model(patch)?;
        let result = R::Entity::update_many()
            .set(active)
            .col_expr(R::updated_at_column(), Expr::value(Utc::now()))
            .filter(R::id_column().eq(id))
            .exec(&self.db)
            .await
            .context_id(&op("update", R::NAME), id)?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        debug!(entity = R::NAME, operation = "update", %id, "record updated");
        self.find_by_id(id).await
    }

    /// True when exactly one row was removed.
    pub async fn delete(&self, id: Uuid) -> ResultRepo<bool> {
        let result = R::Entity::delete_many()
            .filter(R::id_column().eq(id))
            .exec(&self.db)
            .await
            .context_id(&op("delete", R::NAME), id)?;
        debug!(
            entity = R::NAME,
            operation = "delete",
            %id,
            rows = result.rows_affected,
            "record deleted"
        );
        Ok(result.rows_affected == 1)
    }

    pub async fn delete_by(&self, condition: Condition) -> ResultRepo<u64> {
        let result = R::Entity::delete_many()
            .filter(condition)
            .exec(&self.db)
            .await
            .context(&op("delete", R::NAME))?;
        debug!(
            entity = R::NAME,
            operation = "delete_by",
            count = result.rows_affected,
            "records deleted"
        );
        Ok(result.rows_affected)
    }

    pub async fn count(&self, condition: Condition) -> ResultRepo<u64> {
        R::Entity::find()
            .filter(condition)
            .count(&self.db)
            .await
            .context(&op("count", R::NAME))
    }

    pub async fn exists(&self, condition: Condition) -> ResultRepo<bool> {
        Ok(self.count(condition).await? > 0)
    }

    /// Inserts every input in one transaction; either all rows land or none.
    pub async fn bulk_insert(&self, inputs: Vec<R::New>) -> ResultRepo<Vec<R>> {
        let actives = inputs
            .into_iter()
            .map(|input| R::new_active_model(input).map(|a| Self::stamp_new(a, Uuid::new_v4())))
            .collect::<ResultRepo<Vec<_>>>()?;

        let operation = op("bulk insert", R::NAME);
        let tx = self.db.begin().await.context(&operation)?;
        let mut records = Vec::with_capacity(actives.len());
        for active in actives {
            let model = active.insert(&tx).await.context(&operation)?;
            records.push(R::from_model(model)?);
        }
        tx.commit().await.context(&operation)?;

        debug!(
            entity = R::NAME,
            operation = "bulk_insert",
            count = records.len(),
            "records inserted"
        );
        Ok(records)
    }

    pub async fn bulk_update(&self, condition: Condition, patch: R::Patch) -> ResultRepo<u64> {
        let active = R::patch_active_model(patch)?;
        let result = R::Entity::update_many()
            .set(active)
            .col_expr(R::updated_at_column(), Expr::value(Utc::now()))
            .filter(condition)
            .exec(&self.db)
            .await
            .context(&op("bulk update", R::NAME))?;
        debug!(
            entity = R::NAME,
            operation = "bulk_update",
            count = result.rows_affected,
            "records updated"
        );
        Ok(result.rows_affected)
    }

    /// Runs a raw statement. Values are bound to the backend's placeholders
    /// (`$1` on PostgreSQL, `?` on SQLite); never splice caller input into
    /// `sql`.
    pub async fn query(&self, sql: &str, values: Vec<Value>) -> ResultRepo<Vec<QueryResult>> {
        warn!(
            entity = R::NAME,
            sql,
            params = values.len(),
            "raw query bypasses the typed query layer"
        );
        let backend = self.db.get_database_backend();
        self.db
            .query_all(Statement::from_sql_and_values(backend, sql, values))
            .await
            .context(&op("run raw query on", R::NAME))
    }

    /// Sets raw column expressions on every row matching `filter`, stamping
    /// `updated_at`. Runs on `db`, which may be an open transaction.
    pub(crate) async fn set_columns<C: ConnectionTrait>(
        &self,
        db: &C,
        operation: &str,
        filter: impl Into<ConditionExpression>,
        values: Vec<(ColumnOf<R>, SimpleExpr)>,
    ) -> ResultRepo<u64> {
        let mut update = R::Entity::update_many()
            .col_expr(R::updated_at_column(), Expr::value(Utc::now()))
            .filter(Condition::all().add(filter));
        for (column, value) in values {
            update = update.col_expr(column, value);
        }
        let result = update.exec(db).await.context(operation)?;
        debug!(
            entity = R::NAME,
            operation,
            rows = result.rows_affected,
            "columns updated"
        );
        Ok(result.rows_affected)
    }

    fn stamp_new(mut active: R::ActiveModel, id: Uuid) -> R::ActiveModel {
        let now = Utc::now();
        active.set(R::id_column(), Value::from(id));
        active.set(R::created_at_column(), Value::from(now));
        active.set(R::updated_at_column(), Value::from(now));
        active
    }
}
