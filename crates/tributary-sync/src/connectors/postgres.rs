//! Postgres tabular connector
//!
//! Connects to a source database, introspects the configured schema once per
//! table, then streams rows as entities. Row fetch is offset-paginated at a
//! fixed batch size; entity ids derive from the ordered primary-key values as
//! `schema.table:pk1:pk2:...`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use async_trait::async_trait;

use tributary_common::{Result, SyncError};

use crate::config::PostgresSourceConfig;
use crate::entities::Entity;
use crate::introspect::{source_db_error, LogicalType, SchemaIntrospector, TableDescriptor};

use super::{Connector, EntitySink};

pub struct PostgresConnector {
    pool: PgPool,
    schema: String,
    tables: String,
    batch_size: usize,
}

impl PostgresConnector {
    /// Connect to the source database. Bad credentials surface as an
    /// authentication error, a missing database as a configuration error.
    pub async fn create(config: &PostgresSourceConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await
            .map_err(connect_error)?;
        Ok(Self {
            pool,
            schema: config.schema.clone(),
            tables: config.tables.clone(),
            batch_size: config.batch_size,
        })
    }

    /// Resolve the configured table list against what the schema contains.
    async fn resolve_tables(&self, introspector: &SchemaIntrospector) -> Result<Vec<String>> {
        let available = introspector.list_tables(&self.schema).await?;
        if self.tables.trim() == "*" {
            return Ok(available);
        }

        let requested: Vec<String> = self
            .tables
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let known: HashSet<&str> = available.iter().map(String::as_str).collect();
        let missing: Vec<&String> = requested
            .iter()
            .filter(|t| !known.contains(t.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::Configuration(format!(
                "tables not found in schema '{}': {}",
                self.schema,
                missing
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(requested)
    }

    async fn emit_table(
        &self,
        out: &mut EntitySink,
        descriptor: Arc<TableDescriptor>,
    ) -> Result<()> {
        let query = format!(
            r#"SELECT * FROM "{}"."{}" LIMIT {} OFFSET "#,
            descriptor.schema, descriptor.table, self.batch_size
        );
        let mut offset = 0usize;

        loop {
            let rows = sqlx::query(&format!("{query}{offset}"))
                .fetch_all(&self.pool)
                .await
                .map_err(source_db_error)?;
            if rows.is_empty() {
                break;
            }
            debug!(
                table = %descriptor.qualified_name(),
                offset,
                count = rows.len(),
                "fetched row batch"
            );

            for row in &rows {
                let values = row_values(row, &descriptor);
                match Entity::row(Arc::clone(&descriptor), values) {
                    Ok(entity) => out.emit(entity).await?,
                    Err(err) => warn!(
                        table = %descriptor.qualified_name(),
                        error = %err,
                        "skipping row with unusable identity"
                    ),
                }
            }

            if rows.len() < self.batch_size {
                break;
            }
            offset += self.batch_size;
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn run(&mut self, out: &mut EntitySink) -> Result<()> {
        let mut introspector = SchemaIntrospector::new(self.pool.clone());
        let tables = self.resolve_tables(&introspector).await?;
        debug!(schema = %self.schema, count = tables.len(), "syncing tables");

        // Introspect everything up front: a misconfigured table (for example
        // one without a primary key) must fail the run before any entity is
        // emitted.
        let mut descriptors = Vec::with_capacity(tables.len());
        for table in &tables {
            descriptors.push(introspector.describe(&self.schema, table).await?);
        }

        for descriptor in descriptors {
            self.emit_table(out, descriptor).await?;
        }
        Ok(())
    }
}

/// Decode one row into a column → JSON value map per the descriptor.
///
/// A value that cannot be decoded as its logical type becomes null rather
/// than failing the row; unknown native types already arrive as `Untyped`.
fn row_values(row: &PgRow, descriptor: &TableDescriptor) -> Map<String, Value> {
    let mut values = Map::new();
    for (name, column) in &descriptor.columns {
        values.insert(
            name.clone(),
            decode_column(row, name, column.logical_type),
        );
    }
    values
}

fn decode_column(row: &PgRow, name: &str, logical_type: LogicalType) -> Value {
    match logical_type {
        LogicalType::Integer => decode_integer(row, name),
        LogicalType::Float => decode_float(row, name),
        LogicalType::String => opt_value(row.try_get::<Option<String>, _>(name).ok().flatten()),
        LogicalType::Boolean => opt_value(row.try_get::<Option<bool>, _>(name).ok().flatten()),
        LogicalType::Timestamp => decode_timestamp(row, name),
        LogicalType::Untyped => decode_untyped(row, name),
    }
}

fn opt_value<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

fn decode_integer(row: &PgRow, name: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return opt_value(v);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
        return opt_value(v.map(i64::from));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(name) {
        return opt_value(v.map(i64::from));
    }
    Value::Null
}

fn decode_float(row: &PgRow, name: &str) -> Value {
    let raw = if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        v
    } else if let Ok(v) = row.try_get::<Option<f32>, _>(name) {
        v.map(f64::from)
    } else if let Ok(v) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(name) {
        v.and_then(|d| d.to_string().parse::<f64>().ok())
    } else {
        None
    };
    raw.and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn decode_timestamp(row: &PgRow, name: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return opt_value(v.map(|dt| dt.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return opt_value(v.map(|dt| dt.and_utc().to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return opt_value(v.map(|d| d.to_string()));
    }
    Value::Null
}

fn decode_untyped(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(v)) = row.try_get::<Option<Value>, _>(name) {
        return v;
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(v);
    }
    Value::Null
}

fn connect_error(err: sqlx::Error) -> SyncError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // 28xxx: invalid authorization
            Some(code) if code.starts_with("28") => {
                return SyncError::Authentication(db_err.message().to_string());
            },
            // 3D000: database does not exist
            Some("3D000") => {
                return SyncError::Configuration(db_err.message().to_string());
            },
            _ => {},
        }
    }
    SyncError::Upstream {
        status: None,
        detail: format!("could not connect to source database: {err}"),
    }
}
