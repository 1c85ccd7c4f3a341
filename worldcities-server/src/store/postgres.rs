//! PostgreSQL store
//!
//! All SQL is assembled with `QueryBuilder`. Identifiers come only from the
//! compiled `Record::FIELDS` tables and the `PgEntity` constants; every value
//! is bound as a parameter.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::{Store, StoreError};
use crate::error::DatabaseOperation;
use crate::models::{City, Country, Entity};
use crate::paging::{
    Condition, Field, FieldKind, FieldRef, FieldValue, PageQuery, Record, SortOrder,
};

/// An entity stored in its own PostgreSQL table
pub trait PgEntity: Entity + for<'r> FromRow<'r, PgRow> + Unpin {
    /// Table holding the entity
    const TABLE: &'static str;

    /// `SELECT` producing the listing projection, one row per entity
    const LISTING_QUERY: &'static str;
}

impl PgEntity for Country {
    const TABLE: &'static str = "countries";
    const LISTING_QUERY: &'static str = "SELECT c.id, c.name, c.iso2, c.iso3, \
         COUNT(ci.id) AS tot_cities \
         FROM countries c LEFT JOIN cities ci ON ci.country_id = c.id \
         GROUP BY c.id, c.name, c.iso2, c.iso3";
}

impl PgEntity for City {
    const TABLE: &'static str = "cities";
    const LISTING_QUERY: &'static str = "SELECT ci.id, ci.name, ci.lat, ci.lon, ci.country_id, \
         co.name AS country_name \
         FROM cities ci JOIN countries co ON co.id = ci.country_id";
}

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: FieldRef<'_>) {
    match value {
        FieldRef::Integer(n) => builder.push_bind(n),
        FieldRef::Float(n) => builder.push_bind(n),
        FieldRef::Text(s) => builder.push_bind(s.to_string()),
    };
}

fn push_operand(builder: &mut QueryBuilder<'_, Postgres>, operand: &FieldValue) {
    match operand {
        FieldValue::Integer(n) => builder.push_bind(*n),
        FieldValue::Float(n) => builder.push_bind(*n),
        FieldValue::Text(s) => builder.push_bind(s.clone()),
    };
}

/// Escape `LIKE` metacharacters so user input matches literally
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Listing filter: case-insensitive containment for text, equality for numbers
fn push_filter<R: Record>(builder: &mut QueryBuilder<'_, Postgres>, filter: &Condition<R>) {
    let column = filter.field.column();
    match &filter.value {
        FieldValue::Text(needle) => {
            builder.push(format_args!("{column} ILIKE "));
            builder.push_bind(like_pattern(needle));
            builder.push(" ESCAPE '\\'");
        }
        operand => {
            builder.push(format_args!("{column} = "));
            push_operand(builder, operand);
        }
    }
}

/// Duplicate test: case-insensitive equality for text, equality for numbers
fn push_equals<R: Record>(builder: &mut QueryBuilder<'_, Postgres>, condition: &Condition<R>) {
    let column = condition.field.column();
    match &condition.value {
        FieldValue::Text(value) => {
            builder.push(format_args!("LOWER({column}) = LOWER("));
            builder.push_bind(value.clone());
            builder.push(")");
        }
        operand => {
            builder.push(format_args!("{column} = "));
            push_operand(builder, operand);
        }
    }
}

fn listing_base(listing_query: &str, select: &str) -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT {select} FROM ({listing_query}) AS listing"))
}

fn count_listing_query<E: PgEntity>(
    filter: Option<&Condition<E::Listing>>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = listing_base(E::LISTING_QUERY, "COUNT(*)");
    if let Some(filter) = filter {
        builder.push(" WHERE ");
        push_filter(&mut builder, filter);
    }
    builder
}

fn fetch_listing_query<E: PgEntity>(
    query: &PageQuery<E::Listing>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = listing_base(E::LISTING_QUERY, "*");
    if let Some(filter) = &query.filter {
        builder.push(" WHERE ");
        push_filter(&mut builder, filter);
    }

    let column = query.sort.field.column();
    let direction = query.sort.order.as_sql();
    builder.push(" ORDER BY ");
    if query.sort.field.kind() == FieldKind::Text {
        builder.push(format_args!("LOWER({column}) {direction}, "));
    }
    builder.push(format_args!("{column} {direction}, id {}", SortOrder::Asc.as_sql()));

    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
    builder
}

/// Columns written on insert and update: every declared field but `id`
fn writable<E: PgEntity>() -> impl Iterator<Item = &'static Field<E>> {
    E::FIELDS.iter().filter(|field| field.name() != "id")
}

fn insert_query<E: PgEntity>(entity: &E) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", E::TABLE));
    let mut columns = builder.separated(", ");
    for field in writable::<E>() {
        columns.push(field.column());
    }
    builder.push(") VALUES (");
    for (i, field) in writable::<E>().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, field.get(entity));
    }
    builder.push(") RETURNING *");
    builder
}

fn update_query<E: PgEntity>(entity: &E) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
    for (i, field) in writable::<E>().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(format_args!("{} = ", field.column()));
        push_value(&mut builder, field.get(entity));
    }
    builder.push(" WHERE id = ");
    builder.push_bind(entity.id());
    builder
}

fn any_match_query<E: PgEntity>(
    conditions: &[Condition<E>],
    exclude_id: i32,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id <> ",
        E::TABLE
    ));
    builder.push_bind(exclude_id);
    for condition in conditions {
        builder.push(" AND ");
        push_equals(&mut builder, condition);
    }
    builder.push(")");
    builder
}

#[async_trait]
impl<E> Store<E> for PgStore
where
    E: PgEntity,
    E::Listing: for<'r> FromRow<'r, PgRow> + Unpin,
{
    async fn find(&self, id: i32) -> Result<Option<E>, StoreError> {
        let record = sqlx::query_as::<_, E>(&format!("SELECT * FROM {} WHERE id = $1", E::TABLE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn exists(&self, id: i32) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            E::TABLE
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let stored = insert_query(&entity)
            .build_query_as::<E>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from(e).during(DatabaseOperation::Insert))?;
        Ok(stored)
    }

    async fn update(&self, entity: E) -> Result<(), StoreError> {
        let id = entity.id();
        let result = update_query(&entity)
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from(e).during(DatabaseOperation::Update))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { kind: E::KIND, id });
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", E::TABLE))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from(e).during(DatabaseOperation::Delete))?;
        Ok(result.rows_affected() > 0)
    }

    async fn any_match(
        &self,
        conditions: &[Condition<E>],
        exclude_id: i32,
    ) -> Result<bool, StoreError> {
        let found = any_match_query(conditions, exclude_id)
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn count_listing(
        &self,
        filter: Option<&Condition<E::Listing>>,
    ) -> Result<u64, StoreError> {
        let count = count_listing_query::<E>(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch_listing(
        &self,
        query: &PageQuery<E::Listing>,
    ) -> Result<Vec<E::Listing>, StoreError> {
        let rows = fetch_listing_query::<E>(query)
            .build_query_as::<E::Listing>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
