/// Diesel-based implementation of EntityStore
///
/// Every call checks a connection out of the r2d2 pool inside
/// `spawn_blocking`; resolution work runs in a single `conn.transaction`.
use crate::modules::catalog::domain::{
    Batch, Entity, EntityKind, EntityQuery, EntityStore, NaturalKey, StoreTx, StoredEntity,
    TxWork, UpsertResult,
};
use crate::modules::catalog::infrastructure::models::{EntityKindDb, EntityRow, NewEntityRow};
use crate::schema::canonical_entities;
use crate::shared::database::DbPool;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::LogContext;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Text};

/// Helper struct for COUNT queries
#[derive(QueryableByName)]
struct CountResult {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

pub struct PostgresEntityStore {
    pool: DbPool,
}

impl PostgresEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            op(&mut conn)
        })
        .await?
    }
}

struct PgStoreTx<'a> {
    conn: &'a mut PgConnection,
}

impl StoreTx for PgStoreTx<'_> {
    fn find_by_external_id(
        &mut self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>> {
        canonical_entities::table
            .filter(canonical_entities::kind.eq(EntityKindDb::from(kind)))
            .filter(canonical_entities::external_id.eq(external_id))
            .select(EntityRow::as_select())
            .first(self.conn)
            .optional()?
            .map(EntityRow::into_stored)
            .transpose()
    }

    fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &NaturalKey,
    ) -> AppResult<Option<StoredEntity>> {
        let mut query = canonical_entities::table
            .filter(canonical_entities::kind.eq(EntityKindDb::from(kind)))
            .filter(canonical_entities::natural_key.eq(key.name.clone()))
            .into_boxed();

        query = match &key.scope {
            Some(scope) => query.filter(canonical_entities::scope_key.eq(scope.clone())),
            None => query.filter(canonical_entities::scope_key.is_null()),
        };

        query
            .order(canonical_entities::id.asc())
            .select(EntityRow::as_select())
            .first(self.conn)
            .optional()?
            .map(EntityRow::into_stored)
            .transpose()
    }

    fn insert(
        &mut self,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity> {
        let row = NewEntityRow::build(external_id, key, entity)?;
        let inserted = diesel::insert_into(canonical_entities::table)
            .values(&row)
            .returning(EntityRow::as_returning())
            .get_result(self.conn)?;

        LogContext::store_operation("insert", &entity.kind().to_string(), &key.to_string());
        inserted.into_stored()
    }

    fn update(
        &mut self,
        id: i64,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity> {
        let updated = diesel::update(canonical_entities::table.find(id))
            .set((
                canonical_entities::external_id.eq(external_id),
                canonical_entities::natural_key.eq(&key.name),
                canonical_entities::scope_key.eq(key.scope.as_deref()),
                canonical_entities::fields.eq(entity.to_fields()?),
                canonical_entities::updated_at.eq(Utc::now()),
            ))
            .returning(EntityRow::as_returning())
            .get_result(self.conn)?;

        LogContext::store_operation("update", &entity.kind().to_string(), &key.to_string());
        updated.into_stored()
    }
}

/// Raw SQL with the query's filters appended; JSONB parents need `->>`.
fn filtered(select: &str, query: &EntityQuery) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    let mut sql = diesel::sql_query(format!("{} FROM canonical_entities WHERE TRUE", select))
        .into_boxed::<Pg>();

    if let Some(kind) = query.kind {
        sql = sql
            .sql(" AND kind = ")
            .bind::<crate::schema::sql_types::EntityKind, _>(EntityKindDb::from(kind));
    }
    if query.with_external_id {
        sql = sql.sql(" AND external_id IS NOT NULL");
    }
    if let Some(team_id) = query.team_id {
        sql = sql
            .sql(" AND (fields->>'team_id')::bigint = ")
            .bind::<BigInt, _>(team_id);
    }
    if let Some(league_id) = query.league_id {
        sql = sql
            .sql(" AND (fields->>'league_id')::bigint = ")
            .bind::<BigInt, _>(league_id);
    }
    if let Some(fragment) = &query.name_contains {
        sql = sql
            .sql(" AND natural_key LIKE ")
            .bind::<Text, _>(contains_pattern(fragment))
            .sql(" ESCAPE '\\'");
    }
    sql
}

/// `LIKE` pattern matching `fragment` literally anywhere in the value.
fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn transaction(&self, work: TxWork) -> AppResult<Vec<UpsertResult>> {
        self.with_conn(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let mut tx = PgStoreTx { conn };
                work(&mut tx)
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> AppResult<Option<StoredEntity>> {
        self.with_conn(move |conn| {
            canonical_entities::table
                .find(id)
                .select(EntityRow::as_select())
                .first(conn)
                .optional()?
                .map(EntityRow::into_stored)
                .transpose()
        })
        .await
    }

    async fn find_by_external_id(
        &self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>> {
        let external_id = external_id.to_string();
        self.with_conn(move |conn| PgStoreTx { conn }.find_by_external_id(kind, &external_id))
            .await
    }

    async fn count(&self, query: &EntityQuery) -> AppResult<usize> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let result: CountResult =
                filtered("SELECT COUNT(*) AS count", &query).get_result(conn)?;
            Ok(result.count.max(0) as usize)
        })
        .await
    }

    async fn list(&self, query: &EntityQuery, batch: Batch) -> AppResult<Vec<StoredEntity>> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let rows: Vec<EntityRow> = filtered("SELECT *", &query)
                .sql(" ORDER BY id ASC OFFSET ")
                .bind::<BigInt, _>(batch.offset as i64)
                .sql(" LIMIT ")
                .bind::<BigInt, _>(batch.size as i64)
                .load(conn)?;

            rows.into_iter()
                .map(EntityRow::into_stored)
                .collect()
        })
        .await
    }
}
