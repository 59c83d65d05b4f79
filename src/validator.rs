//! Feasibility validator
//!
//! Checks a refined request against the live schema before any statement is
//! generated. For insertion requests the validator also samples row counts
//! of the other tables so the engine can reject inserts that reference
//! parent data which does not exist yet.

use crate::config::MySqlConfig;
use crate::error::Result;
use crate::gateway::LlmGateway;
use crate::interpreter::{self, EngineOutcome, ValidationStatus};
use crate::prompts;
use crate::providers::ChatMessage;
use crate::schema::SchemaSnapshot;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{ConnectOptions, Row};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cap on sampled rows per table probe.
pub const SAMPLE_LIMIT: u32 = 5;

lazy_static! {
    static ref INSERT_TARGET: Regex =
        Regex::new(r"(?is)\binsert\b.*?\binto\s+(?:the\s+)?`?([A-Za-z_][A-Za-z0-9_]*)`?").unwrap();
}

/// Live-data seam: sampled row counts for feasibility checks.
#[async_trait]
pub trait DataProbe: Send + Sync {
    /// Row count for `table`, capped at `limit`.
    async fn sample_count(&self, table: &str, limit: u32) -> Result<u64>;
}

/// Probe backed by MySQL; one connection per call.
pub struct MySqlProbe {
    config: MySqlConfig,
    database: String,
}

impl MySqlProbe {
    pub fn new(config: MySqlConfig, database: String) -> Self {
        Self { config, database }
    }
}

#[async_trait]
impl DataProbe for MySqlProbe {
    async fn sample_count(&self, table: &str, limit: u32) -> Result<u64> {
        let mut conn = self
            .config
            .connect_options(Some(&self.database))
            .connect()
            .await?;

        let sql = format!(
            "SELECT COUNT(*) AS n FROM (SELECT 1 FROM `{}` LIMIT {}) AS sample",
            table, limit
        );
        let row = sqlx::query(&sql).fetch_one(&mut conn).await?;
        let count: i64 = row.try_get("n")?;
        Ok(count as u64)
    }
}

pub struct FeasibilityValidator {
    gateway: Arc<LlmGateway>,
    probe: Option<Arc<dyn DataProbe>>,
}

impl FeasibilityValidator {
    pub fn new(gateway: Arc<LlmGateway>, probe: Option<Arc<dyn DataProbe>>) -> Self {
        Self { gateway, probe }
    }

    /// Validate the refined request against schema and (for inserts) data.
    pub async fn validate(
        &self,
        refined_request: &str,
        database: &str,
        schema: &SchemaSnapshot,
    ) -> Result<EngineOutcome> {
        // Nothing to validate against: reject without an engine round trip,
        // unless the request is itself about creating a schema.
        if schema.is_empty() && !is_schema_creation_request(refined_request) {
            debug!("Empty schema for '{}', short-circuiting validation", database);
            return Ok(EngineOutcome::rejected(
                ValidationStatus::RejectedIrrelevant,
                format!("No schema found for database '{}'.", database),
            ));
        }

        let schema_block = schema.context_block();
        let data_note = self.build_data_note(refined_request, schema).await;

        let messages = vec![
            ChatMessage::system(prompts::VALIDATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::build_validation_prompt(
                refined_request,
                database,
                &schema_block,
                data_note.as_deref(),
            )),
        ];

        let reply = self.gateway.complete(&messages).await?;
        Ok(interpreter::interpret(&reply))
    }

    /// For insertion requests, sample every table other than the insert
    /// target and describe what data exists. Probe faults degrade to a
    /// warning line rather than failing the stage.
    async fn build_data_note(&self, request: &str, schema: &SchemaSnapshot) -> Option<String> {
        if !request.to_lowercase().contains("insert") {
            return None;
        }
        let target = extract_insert_target(request)?;
        let probe = self.probe.as_ref()?;

        let mut populated = Vec::new();
        let mut empty = Vec::new();
        let mut unreachable = Vec::new();

        for table in &schema.tables {
            if table.name.eq_ignore_ascii_case(&target) {
                continue;
            }
            match probe.sample_count(&table.name, SAMPLE_LIMIT).await {
                Ok(0) => empty.push(table.name.clone()),
                Ok(n) => populated.push(format!("{} ({} rows sampled)", table.name, n)),
                Err(e) => {
                    warn!("Data probe failed for table '{}': {}", table.name, e);
                    unreachable.push(table.name.clone());
                }
            }
        }

        if populated.is_empty() && empty.is_empty() && unreachable.is_empty() {
            return None;
        }

        let mut note = String::from("Data availability for this INSERT:\n");
        if !populated.is_empty() {
            note.push_str(&format!("Available data: {}\n", populated.join(", ")));
        }
        if !empty.is_empty() {
            note.push_str(&format!(
                "No data - warnings: these tables have no rows: {}. \
                 Treat references to their contents as insufficient data.\n",
                empty.join(", ")
            ));
        }
        if !unreachable.is_empty() {
            note.push_str(&format!("Could not sample: {}\n", unreachable.join(", ")));
        }
        Some(note)
    }
}

/// Target table of an `insert ... into <identifier>` request, if any.
pub fn extract_insert_target(request: &str) -> Option<String> {
    INSERT_TARGET
        .captures(request)
        .map(|caps| caps[1].to_string())
}

fn is_schema_creation_request(request: &str) -> bool {
    let lower = request.to_lowercase();
    lower.contains("create database") || lower.contains("create schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::providers::TextCompletionProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        reply: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextCompletionProvider for CountingProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn gateway_with(reply: &'static str) -> (Arc<LlmGateway>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            reply,
            calls: Arc::clone(&calls),
        });
        (Arc::new(LlmGateway::new(vec![provider])), calls)
    }

    struct EmptyTablesProbe;

    #[async_trait]
    impl DataProbe for EmptyTablesProbe {
        async fn sample_count(&self, _table: &str, _limit: u32) -> Result<u64> {
            Ok(0)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl DataProbe for FailingProbe {
        async fn sample_count(&self, table: &str, _limit: u32) -> Result<u64> {
            Err(QueryError::Execution(format!("table '{}' unreachable", table)))
        }
    }

    fn sample_schema() -> SchemaSnapshot {
        use crate::schema::{ColumnDescriptor, TableSchema};
        SchemaSnapshot::new(vec![
            TableSchema::new(
                "players",
                vec![ColumnDescriptor {
                    name: "name".to_string(),
                    data_type: "varchar".to_string(),
                    ordinal: 1,
                }],
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
    fn test_extract_insert_target() {
        assert_eq!(
            extract_insert_target("insert a row with name Kohli into the players"),
            Some("players".to_string())
        );
        assert_eq!(
            extract_insert_target("INSERT INTO `matches` (match_id) VALUES (1)"),
            Some("matches".to_string())
        );
        assert_eq!(extract_insert_target("show all players"), None);
    }

    #[tokio::test]
    async fn test_empty_schema_short_circuits_without_engine_call() {
        let (gateway, calls) = gateway_with("Status: VALID");
        let validator = FeasibilityValidator::new(gateway, None);

        let outcome = validator
            .validate("show all players", "missing_db", &SchemaSnapshot::empty())
            .await
            .unwrap();

        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
        assert!(outcome.detail.unwrap().contains("No schema found"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schema_creation_request_bypasses_short_circuit() {
        let (gateway, calls) = gateway_with("Status: VALID");
        let validator = FeasibilityValidator::new(gateway, None);

        let outcome = validator
            .validate(
                "create database cricket_info",
                "cricket_info",
                &SchemaSnapshot::empty(),
            )
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_probe_flags_empty_tables() {
        let (gateway, _) = gateway_with("Status: VALID");
        let validator = FeasibilityValidator::new(gateway, Some(Arc::new(EmptyTablesProbe)));

        let note = validator
            .build_data_note("insert a new score into matches", &sample_schema())
            .await
            .unwrap();

        assert!(note.contains("players"));
        assert!(note.contains("no rows"));
        assert!(!note.contains("matches ("));
    }

    #[tokio::test]
    async fn test_probe_fault_degrades_to_warning_note() {
        let (gateway, _) = gateway_with("Status: VALID");
        let validator = FeasibilityValidator::new(gateway, Some(Arc::new(FailingProbe)));

        let note = validator
            .build_data_note("insert a new score into matches", &sample_schema())
            .await
            .unwrap();

        assert!(note.contains("Could not sample"));
    }

    #[tokio::test]
    async fn test_non_insert_request_skips_probe() {
        let (gateway, _) = gateway_with("Status: VALID");
        let validator = FeasibilityValidator::new(gateway, Some(Arc::new(FailingProbe)));

        let note = validator
            .build_data_note("show every match result", &sample_schema())
            .await;

        assert!(note.is_none());
    }
}
