//! Stage pipeline
//!
//! The orchestrator: REFINE → VALIDATE → GENERATE over one mutable request
//! context, with ERROR reachable from VALIDATE and GENERATE. Stages run
//! strictly sequentially and a run never revisits a state. Transitions are
//! a pure function of (state, stage outcome), so the routing is testable
//! without any engine in the loop.

use crate::extractor;
use crate::gateway::LlmGateway;
use crate::interpreter::ValidationStatus;
use crate::prompts;
use crate::providers::ChatMessage;
use crate::schema::SchemaSnapshot;
use crate::validator::FeasibilityValidator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Mutable context threaded through all stages of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub run_id: Uuid,
    pub original_request: String,
    pub refined_request: Option<String>,
    pub database: String,
    pub schema: SchemaSnapshot,
    pub feasible: bool,
    pub error: Option<String>,
    pub statement: Option<String>,
}

impl RequestContext {
    pub fn new(original_request: impl Into<String>, database: impl Into<String>, schema: SchemaSnapshot) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            original_request: original_request.into(),
            refined_request: None,
            database: database.into(),
            schema,
            feasible: false,
            error: None,
            statement: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Refine,
    Validate,
    Generate,
    Done,
    Error,
}

/// What a stage reports back to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Advance,
    Halt,
}

/// Pure transition function. Terminal states absorb.
pub fn next_state(state: PipelineState, outcome: StageOutcome) -> PipelineState {
    use PipelineState::*;
    match (state, outcome) {
        (Refine, StageOutcome::Advance) => Validate,
        (Validate, StageOutcome::Advance) => Generate,
        (Generate, StageOutcome::Advance) => Done,
        (Refine | Validate | Generate, StageOutcome::Halt) => Error,
        (terminal, _) => terminal,
    }
}

pub struct QueryPipeline {
    gateway: Arc<LlmGateway>,
    validator: FeasibilityValidator,
}

impl QueryPipeline {
    pub fn new(gateway: Arc<LlmGateway>, validator: FeasibilityValidator) -> Self {
        Self { gateway, validator }
    }

    /// Run the pipeline to a terminal state and return the final context.
    ///
    /// Every failure mode is folded into the context (`error` set, no
    /// statement); nothing is thrown past this boundary.
    pub async fn run(
        &self,
        original_request: &str,
        database: &str,
        schema: SchemaSnapshot,
    ) -> RequestContext {
        let mut ctx = RequestContext::new(original_request, database, schema);
        info!(run_id = %ctx.run_id, "Pipeline starting: {}", original_request);

        let mut state = PipelineState::Refine;
        loop {
            state = match state {
                PipelineState::Refine => {
                    next_state(state, self.refine(&mut ctx).await)
                }
                PipelineState::Validate => {
                    next_state(state, self.validate(&mut ctx).await)
                }
                PipelineState::Generate => {
                    next_state(state, self.generate(&mut ctx).await)
                }
                PipelineState::Done | PipelineState::Error => break,
            };
        }

        info!(run_id = %ctx.run_id, "Pipeline finished (feasible: {}, error: {:?})",
            ctx.feasible, ctx.error);
        ctx
    }

    /// REFINE: rewrite the raw request; the engine reply is taken verbatim.
    async fn refine(&self, ctx: &mut RequestContext) -> StageOutcome {
        let messages = vec![
            ChatMessage::system(prompts::REFINEMENT_SYSTEM_PROMPT),
            ChatMessage::user(prompts::build_refinement_prompt(&ctx.original_request)),
        ];

        match self.gateway.complete(&messages).await {
            Ok(text) => {
                let refined = text.trim().to_string();
                info!(run_id = %ctx.run_id, "Refined request: {}", refined);
                ctx.refined_request = Some(refined);
                StageOutcome::Advance
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, "Refinement failed: {}", e);
                ctx.error = Some(format!("Refinement failed: {}", e));
                StageOutcome::Halt
            }
        }
    }

    /// VALIDATE: delegate to the feasibility validator and route on the
    /// structured outcome.
    async fn validate(&self, ctx: &mut RequestContext) -> StageOutcome {
        let refined = ctx
            .refined_request
            .clone()
            .unwrap_or_else(|| ctx.original_request.clone());

        let outcome = match self
            .validator
            .validate(&refined, &ctx.database, &ctx.schema)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run_id = %ctx.run_id, "Validation stage failed: {}", e);
                ctx.error = Some(format!("Validation failed: {}", e));
                return StageOutcome::Halt;
            }
        };

        match outcome.status {
            ValidationStatus::Accepted => {
                ctx.feasible = true;
                StageOutcome::Advance
            }
            ValidationStatus::RejectedIrrelevant => {
                ctx.error = Some(format!(
                    "I cannot answer this. {}",
                    outcome
                        .detail
                        .unwrap_or_else(|| "Query is unrelated to the database.".to_string())
                ));
                StageOutcome::Halt
            }
            ValidationStatus::RejectedInvalidEntity => {
                ctx.error = Some(format!(
                    "I cannot generate SQL. {}",
                    outcome.detail.unwrap_or_else(|| {
                        "The requested specific data is missing from the schema.".to_string()
                    })
                ));
                StageOutcome::Halt
            }
        }
    }

    /// GENERATE: build the generation instruction, extract one statement
    /// from the reply, and gate it behind the syntax sanity check.
    async fn generate(&self, ctx: &mut RequestContext) -> StageOutcome {
        let refined = ctx
            .refined_request
            .clone()
            .unwrap_or_else(|| ctx.original_request.clone());
        let schema_block = ctx.schema.context_block();

        let messages = vec![
            ChatMessage::system(prompts::GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::build_generation_prompt(
                &refined,
                &ctx.database,
                &schema_block,
            )),
        ];

        let raw = match self.gateway.complete(&messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(run_id = %ctx.run_id, "Generation failed: {}", e);
                ctx.error = Some(format!("Generation failed: {}", e));
                return StageOutcome::Halt;
            }
        };

        let statement = extractor::extract(&raw);
        match extractor::check_statement(&statement) {
            Ok(()) => {
                info!(run_id = %ctx.run_id, "Generated statement: {}", statement);
                ctx.statement = Some(statement);
                StageOutcome::Advance
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, "Generated statement rejected: {}", e);
                ctx.error = Some(format!("Generated statement failed validation: {}", e));
                StageOutcome::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_follow_the_stage_graph() {
        use PipelineState::*;
        assert_eq!(next_state(Refine, StageOutcome::Advance), Validate);
        assert_eq!(next_state(Validate, StageOutcome::Advance), Generate);
        assert_eq!(next_state(Generate, StageOutcome::Advance), Done);
        assert_eq!(next_state(Validate, StageOutcome::Halt), Error);
        assert_eq!(next_state(Generate, StageOutcome::Halt), Error);
    }

    #[test]
    fn test_terminal_states_absorb() {
        use PipelineState::*;
        assert_eq!(next_state(Done, StageOutcome::Advance), Done);
        assert_eq!(next_state(Error, StageOutcome::Halt), Error);
    }
}
