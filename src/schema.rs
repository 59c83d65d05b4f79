//! Schema snapshot and introspection
//!
//! A snapshot is fetched once per pipeline run and is immutable for the rest
//! of the run. Columns are ordered by ordinal position — insertion
//! statements supply values positionally, so that order is load-bearing.

use crate::config::MySqlConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{ConnectOptions, Row};
use tracing::debug;

/// One column as declared in the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub ordinal: u32,
}

/// One table with its columns in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, mut columns: Vec<ColumnDescriptor>) -> Self {
        columns.sort_by_key(|c| c.ordinal);
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// Ordered snapshot of every table in the target schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
}

impl SchemaSnapshot {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn empty() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Render the snapshot as the context block used in prompts:
    /// one `table: col (type), ...` line per table.
    pub fn context_block(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", table.name, columns)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const COLUMNS_QUERY: &str = r#"
SELECT TABLE_NAME, COLUMN_NAME, DATA_TYPE, ORDINAL_POSITION
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = ?
ORDER BY TABLE_NAME, ORDINAL_POSITION
"#;

const SCHEMATA_QUERY: &str = r#"
SELECT SCHEMA_NAME
FROM INFORMATION_SCHEMA.SCHEMATA
WHERE SCHEMA_NAME NOT IN ('information_schema', 'performance_schema', 'mysql', 'sys')
ORDER BY SCHEMA_NAME
"#;

/// Fetch the snapshot for a named schema.
///
/// Connects at server level so a nonexistent schema yields an empty
/// snapshot rather than a connection fault. One connection, scoped to this
/// call.
pub async fn introspect_schema(config: &MySqlConfig, database: &str) -> Result<SchemaSnapshot> {
    let mut conn = config.connect_options(None).connect().await?;

    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(database)
        .fetch_all(&mut conn)
        .await?;

    let mut tables: Vec<TableSchema> = Vec::new();
    for row in rows {
        let table: String = row.try_get("TABLE_NAME")?;
        let column: String = row.try_get("COLUMN_NAME")?;
        let data_type: String = row.try_get("DATA_TYPE")?;
        let ordinal: u64 = row.try_get("ORDINAL_POSITION")?;

        let descriptor = ColumnDescriptor {
            name: column,
            data_type,
            ordinal: ordinal as u32,
        };

        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(descriptor),
            _ => tables.push(TableSchema {
                name: table,
                columns: vec![descriptor],
            }),
        }
    }

    debug!("Introspected {} tables from schema '{}'", tables.len(), database);
    Ok(SchemaSnapshot::new(tables))
}

/// List user schemas on the server, excluding the system ones.
pub async fn list_databases(config: &MySqlConfig) -> Result<Vec<String>> {
    let mut conn = config.connect_options(None).connect().await?;

    let rows = sqlx::query(SCHEMATA_QUERY).fetch_all(&mut conn).await?;
    let mut databases = Vec::with_capacity(rows.len());
    for row in rows {
        databases.push(row.try_get("SCHEMA_NAME")?);
    }
    Ok(databases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(vec![
            TableSchema::new(
                "players",
                vec![
                    ColumnDescriptor {
                        name: "runs".to_string(),
                        data_type: "int".to_string(),
                        ordinal: 2,
                    },
                    ColumnDescriptor {
                        name: "name".to_string(),
                        data_type: "varchar".to_string(),
                        ordinal: 1,
                    },
                ],
            ),
            TableSchema::new(
                "matches",
                vec![ColumnDescriptor {
                    name: "match_id".to_string(),
                    data_type: "int".to_string(),
                    ordinal: 1,
                }],
            ),
        ])
    }

    #[test]
    fn test_columns_sorted_by_ordinal() {
        let snapshot = sample_snapshot();
        let names: Vec<&str> = snapshot.tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "runs"]);
    }

    #[test]
    fn test_context_block_layout() {
        let block = sample_snapshot().context_block();
        assert_eq!(
            block,
            "players: name (varchar), runs (int)\nmatches: match_id (int)"
        );
    }

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let snapshot = sample_snapshot();
        assert!(snapshot.table("Players").is_some());
        assert!(snapshot.table("absent").is_none());
    }
}
