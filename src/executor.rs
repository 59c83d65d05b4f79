//! Execution and advisory engine
//!
//! Runs the final statement against MySQL and derives optimization advice.
//! Retrieval statements are executed and their EXPLAIN plan mapped through a
//! fixed rule table; mutating and DDL statements return the affected-row
//! count plus static advice for that operation class. Execution faults
//! carry the engine's native message and are never retried.

use crate::config::MySqlConfig;
use crate::error::{QueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, ConnectOptions, Row};
use std::sync::Arc;
use tracing::{debug, warn};

/// Statement class, decided by the leading operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    CreateIndex,
    AlterTable,
    DropTable,
    DropIndex,
    Truncate,
    CreateDatabase,
    DropDatabase,
    Unknown,
}

impl OperationType {
    /// Classify a statement: proper parse first, keyword heuristic when the
    /// parser cannot handle the text.
    pub fn classify(statement: &str) -> Self {
        let dialect = MySqlDialect {};
        if let Ok(parsed) = Parser::parse_sql(&dialect, statement) {
            if let Some(op) = parsed.first().and_then(classify_parsed) {
                return op;
            }
        }
        Self::classify_heuristic(statement)
    }

    fn classify_heuristic(statement: &str) -> Self {
        let upper = statement.trim().to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            Self::Select
        } else if upper.starts_with("INSERT") {
            Self::Insert
        } else if upper.starts_with("UPDATE") {
            Self::Update
        } else if upper.starts_with("DELETE") {
            Self::Delete
        } else if upper.starts_with("CREATE TABLE") {
            Self::CreateTable
        } else if upper.starts_with("CREATE INDEX") || upper.starts_with("CREATE UNIQUE INDEX") {
            Self::CreateIndex
        } else if upper.starts_with("ALTER TABLE") {
            Self::AlterTable
        } else if upper.starts_with("DROP TABLE") {
            Self::DropTable
        } else if upper.starts_with("DROP INDEX") {
            Self::DropIndex
        } else if upper.starts_with("TRUNCATE") {
            Self::Truncate
        } else if upper.starts_with("CREATE DATABASE") || upper.starts_with("CREATE SCHEMA") {
            Self::CreateDatabase
        } else if upper.starts_with("DROP DATABASE") || upper.starts_with("DROP SCHEMA") {
            Self::DropDatabase
        } else {
            Self::Unknown
        }
    }

    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Select)
    }
}

fn classify_parsed(statement: &Statement) -> Option<OperationType> {
    match statement {
        Statement::Query(_) => Some(OperationType::Select),
        Statement::Insert { .. } => Some(OperationType::Insert),
        Statement::Update { .. } => Some(OperationType::Update),
        Statement::Delete { .. } => Some(OperationType::Delete),
        Statement::CreateTable { .. } => Some(OperationType::CreateTable),
        Statement::CreateIndex { .. } => Some(OperationType::CreateIndex),
        Statement::AlterTable { .. } => Some(OperationType::AlterTable),
        Statement::Truncate { .. } => Some(OperationType::Truncate),
        Statement::CreateDatabase { .. } => Some(OperationType::CreateDatabase),
        Statement::Drop { object_type, .. } => match object_type {
            ObjectType::Table => Some(OperationType::DropTable),
            ObjectType::Index => Some(OperationType::DropIndex),
            // MySQL treats SCHEMA as a synonym for DATABASE.
            ObjectType::Schema => Some(OperationType::DropDatabase),
            _ => None,
        },
        _ => None,
    }
}

/// One EXPLAIN plan row, reduced to the fields the rule table reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRow {
    pub access_type: Option<String>,
    pub key: Option<String>,
    pub possible_keys: Option<String>,
    pub extra: Option<String>,
}

/// One performance finding derived from the plan or the operation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub rule: String,
    pub message: String,
}

impl Advisory {
    fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

/// A result row rendered as a JSON object.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows(Vec<JsonRow>),
    Affected(u64),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub operation: OperationType,
    pub outcome: ExecutionOutcome,
    pub advisories: Vec<Advisory>,
}

/// Relational-engine seam: execute a statement, or fetch its plan.
#[async_trait]
pub trait RelationalExecutor: Send + Sync {
    async fn fetch_rows(&self, statement: &str) -> Result<Vec<JsonRow>>;

    async fn execute(&self, statement: &str) -> Result<u64>;

    async fn explain(&self, statement: &str) -> Result<Vec<PlanRow>>;
}

/// MySQL-backed executor; one connection per call, released on return.
pub struct MySqlExecutor {
    config: MySqlConfig,
    database: String,
}

impl MySqlExecutor {
    pub fn new(config: MySqlConfig, database: String) -> Self {
        Self { config, database }
    }

    async fn connect(&self) -> Result<sqlx::MySqlConnection> {
        self.config
            .connect_options(Some(&self.database))
            .connect()
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))
    }
}

#[async_trait]
impl RelationalExecutor for MySqlExecutor {
    async fn fetch_rows(&self, statement: &str) -> Result<Vec<JsonRow>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(statement)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(statement)
            .execute(&mut conn)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn explain(&self, statement: &str) -> Result<Vec<PlanRow>> {
        let mut conn = self.connect().await?;
        let explain = format!("EXPLAIN {}", statement);
        let rows = sqlx::query(&explain)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| PlanRow {
                access_type: get_string_ci(row, "type"),
                key: get_string_ci(row, "key"),
                possible_keys: get_string_ci(row, "possible_keys"),
                extra: get_string_ci(row, "extra"),
            })
            .collect())
    }
}

/// Render a MySQL row as a JSON object, walking the columns in order.
fn row_to_json(row: &MySqlRow) -> JsonRow {
    let mut map = JsonRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, idx));
    }
    map
}

/// Decode one column value without knowing its declared type up front.
/// MySQL result metadata is loose, so decoding cascades through the common
/// wire types and falls back to a lossy string.
fn column_value(row: &MySqlRow, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    if let Ok(value) = row.try_get::<Option<i64>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<u64>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
        return value.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return value
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return value
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return value
            .map(|v| Value::String(String::from_utf8_lossy(&v).into_owned()))
            .unwrap_or(Value::Null);
    }
    serde_json::Value::Null
}

/// Column lookup that tolerates the mixed casing of EXPLAIN output
/// ("type", "possible_keys", "Extra").
fn get_string_ci(row: &MySqlRow, name: &str) -> Option<String> {
    let idx = row
        .columns()
        .iter()
        .position(|c| c.name().eq_ignore_ascii_case(name))?;
    match column_value(row, idx) {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

pub struct QueryExecutor {
    backend: Arc<dyn RelationalExecutor>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn RelationalExecutor>) -> Self {
        Self { backend }
    }

    pub fn for_mysql(config: MySqlConfig, database: String) -> Self {
        Self::new(Arc::new(MySqlExecutor::new(config, database)))
    }

    /// Execute the statement and derive advisories for it.
    pub async fn run(&self, statement: &str) -> Result<ExecutionReport> {
        let operation = OperationType::classify(statement);
        debug!("Executing {:?} statement", operation);

        match operation {
            OperationType::Select => {
                let rows = self.backend.fetch_rows(statement).await?;
                let advisories = match self.backend.explain(statement).await {
                    Ok(plan) => plan_advisories(&plan),
                    Err(e) => {
                        warn!("Plan analysis unavailable: {}", e);
                        vec![Advisory::new(
                            "plan-unavailable",
                            format!("Could not analyze execution plan: {}", e),
                        )]
                    }
                };
                Ok(ExecutionReport {
                    operation,
                    outcome: ExecutionOutcome::Rows(rows),
                    advisories,
                })
            }
            OperationType::Unknown => Err(QueryError::MalformedStatement(format!(
                "unrecognized statement: {}",
                statement.trim()
            ))),
            _ => {
                let affected = self.backend.execute(statement).await?;
                Ok(ExecutionReport {
                    operation,
                    outcome: ExecutionOutcome::Affected(affected),
                    advisories: static_advisories(operation),
                })
            }
        }
    }
}

/// Fixed rule table over EXPLAIN rows. Findings keep occurrence order and
/// are never merged by content — two full scans are two findings.
pub fn plan_advisories(plan: &[PlanRow]) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    for row in plan {
        if row
            .access_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("ALL"))
            .unwrap_or(false)
        {
            advisories.push(Advisory::new(
                "full-table-scan",
                "Consider adding an index - full table scan detected",
            ));
        }
        if row.key.is_none() && row.possible_keys.as_deref().map_or(false, |k| !k.is_empty()) {
            advisories.push(Advisory::new(
                "possible-keys-unused",
                "Potential index optimization available",
            ));
        }
        if row
            .extra
            .as_deref()
            .map(|e| e.to_lowercase().contains("filesort"))
            .unwrap_or(false)
        {
            advisories.push(Advisory::new(
                "filesort",
                "Consider adding index for ORDER BY clause",
            ));
        }
    }
    advisories
}

/// Static advice per operation class for non-retrieval statements.
pub fn static_advisories(operation: OperationType) -> Vec<Advisory> {
    use OperationType::*;
    let mut advisories = Vec::new();
    match operation {
        Insert | Update | Delete => {
            advisories.push(Advisory::new(
                "where-indexing",
                "Ensure proper indexing on WHERE clause columns for optimal performance",
            ));
            if matches!(operation, Update | Delete) {
                advisories.push(Advisory::new(
                    "mass-operation",
                    "Always use WHERE conditions to avoid unintended mass operations",
                ));
                advisories.push(Advisory::new(
                    "transaction-safety",
                    "Consider using transactions for data safety",
                ));
            }
        }
        CreateTable => {
            advisories.push(Advisory::new(
                "index-planning",
                "Consider adding appropriate indexes on frequently queried columns",
            ));
            advisories.push(Advisory::new(
                "data-integrity",
                "Use proper data types and constraints for data integrity",
            ));
            advisories.push(Advisory::new(
                "partitioning",
                "Consider partitioning for large tables",
            ));
        }
        CreateIndex => {
            advisories.push(Advisory::new(
                "index-upkeep",
                "Monitor index usage and remove unused indexes",
            ));
            advisories.push(Advisory::new(
                "composite-indexes",
                "Consider composite indexes for multi-column queries",
            ));
        }
        DropTable | DropIndex | Truncate | DropDatabase => {
            advisories.push(Advisory::new(
                "irreversible",
                "CAUTION: This operation is irreversible. Ensure you have backups",
            ));
            advisories.push(Advisory::new(
                "test-first",
                "Consider using transactions and testing in development first",
            ));
        }
        _ => {}
    }
    advisories
}
