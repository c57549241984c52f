//! Schema introspection for tabular sources
//!
//! Tabular connectors discover their entity shape at sync start: one
//! [`TableDescriptor`] per table, built from `information_schema` and cached
//! for the life of the run. Every row entity from that table references the
//! shared descriptor instead of carrying its own copy of the column metadata.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use tracing::debug;

use tributary_common::{Result, SyncError};

/// Closed set of column types the pipeline understands.
///
/// Source-native types outside the mapping fall back to `Untyped`; an unknown
/// type must never fail a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Integer,
    Float,
    String,
    Boolean,
    Timestamp,
    Untyped,
}

/// Map a Postgres native type name to its logical type.
pub fn logical_type_for(native_type: &str) -> LogicalType {
    match native_type.to_lowercase().as_str() {
        "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => {
            LogicalType::Integer
        },
        "decimal" | "numeric" | "real" | "float4" | "double precision" | "float8" => {
            LogicalType::Float
        },
        "character varying" | "varchar" | "character" | "char" | "text" | "uuid" | "name"
        | "citext" => LogicalType::String,
        "boolean" | "bool" => LogicalType::Boolean,
        "timestamp" | "timestamp without time zone" | "timestamp with time zone"
        | "timestamptz" | "date" => LogicalType::Timestamp,
        _ => LogicalType::Untyped,
    }
}

/// Metadata for one column of an introspected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub logical_type: LogicalType,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Row-entity descriptor for one table, built once per sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub table: String,
    pub columns: BTreeMap<String, ColumnDescriptor>,
    /// Primary-key columns in declaration order. Never empty.
    pub primary_keys: Vec<String>,
}

impl TableDescriptor {
    /// Build a descriptor, failing fast when the table declares no primary
    /// key — without one, row identities would not be stable across runs.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: BTreeMap<String, ColumnDescriptor>,
        primary_keys: Vec<String>,
    ) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        if primary_keys.is_empty() {
            return Err(SyncError::Configuration(format!(
                "table {schema}.{table} has no primary key; cannot derive stable entity ids"
            )));
        }
        Ok(Self {
            schema,
            table,
            columns,
            primary_keys,
        })
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Deterministic row entity id: `schema.table:pk1:pk2:...` from the
    /// ordered primary-key values.
    pub fn row_entity_id(&self, values: &Map<String, Value>) -> Result<String> {
        let mut parts = Vec::with_capacity(self.primary_keys.len());
        for pk in &self.primary_keys {
            let value = values.get(pk).filter(|v| !v.is_null()).ok_or_else(|| {
                SyncError::Configuration(format!(
                    "row in {} is missing primary key value for '{pk}'",
                    self.qualified_name()
                ))
            })?;
            parts.push(render_key(value));
        }
        Ok(format!("{}:{}", self.qualified_name(), parts.join(":")))
    }
}

fn render_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Discovers table structure for a tabular source.
///
/// Descriptors are cached per `(schema, table)`: introspection runs once per
/// table per sync run, not once per batch.
pub struct SchemaIntrospector {
    pool: PgPool,
    cache: HashMap<String, Arc<TableDescriptor>>,
}

impl SchemaIntrospector {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    /// List base tables in a schema.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await
        .map_err(source_db_error)?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("table_name"))
            .collect())
    }

    /// Describe one table, reusing the cached descriptor when present.
    pub async fn describe(&mut self, schema: &str, table: &str) -> Result<Arc<TableDescriptor>> {
        let key = format!("{schema}.{table}");
        if let Some(descriptor) = self.cache.get(&key) {
            return Ok(Arc::clone(descriptor));
        }

        let column_rows = sqlx::query(
            r#"
            SELECT column_name, data_type, is_nullable, column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(source_db_error)?;

        if column_rows.is_empty() {
            return Err(SyncError::Configuration(format!(
                "table {key} does not exist or has no columns"
            )));
        }

        let mut columns = BTreeMap::new();
        for row in &column_rows {
            let name: String = row.get("column_name");
            let native: String = row.get("data_type");
            let nullable: String = row.get("is_nullable");
            let default: Option<String> = row.get("column_default");
            columns.insert(
                name,
                ColumnDescriptor {
                    logical_type: logical_type_for(&native),
                    nullable: nullable == "YES",
                    default,
                },
            );
        }

        let pk_rows = sqlx::query(
            r#"
            SELECT a.attname
            FROM pg_index i
            JOIN pg_attribute a
              ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE i.indrelid = ($1 || '.' || $2)::regclass AND i.indisprimary
            ORDER BY array_position(i.indkey, a.attnum)
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(source_db_error)?;

        let primary_keys: Vec<String> =
            pk_rows.iter().map(|row| row.get("attname")).collect();

        let descriptor = Arc::new(TableDescriptor::new(schema, table, columns, primary_keys)?);
        debug!(
            table = %key,
            columns = descriptor.columns.len(),
            primary_keys = descriptor.primary_keys.len(),
            "introspected table"
        );
        self.cache.insert(key, Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

/// Errors from the source database are upstream failures, not local ones.
pub(crate) fn source_db_error(err: sqlx::Error) -> SyncError {
    SyncError::Upstream {
        status: None,
        detail: format!("source database error: {err}"),
    }
}
