//! The turn pipeline: one request end to end.
//!
//! Order of stages: optional query rewrite → agent loop (when tools are
//! configured) or retrieve-then-generate → context emission → sentence-
//! buffered answer chunks → session persistence → `END`. A consumed
//! stop signal short-circuits to `END` (never `ERROR`); internal
//! failures terminate the stream with `ERROR` while the connection
//! itself stays usable.

use ragline_chains::{ChainInput, ChainRegistry};
use ragline_core::chat_config::{ChatbotConfig, TaskType};
use ragline_core::error::{AgentError, Error};
use ragline_core::invocation::{InvocationRequest, Invoker};
use ragline_core::retrieval::RetrievalCandidate;
use ragline_core::session::{SessionStore, SessionTurn};
use ragline_core::signal::StopSignalStore;
use ragline_core::turn::{ChatTurn, TurnState};
use ragline_retrieval::units::COMPOSE_UNIT;
use ragline_stream::sentence::default_terminators;
use ragline_stream::{Emitter, SentenceBuffer};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::loop_runner::{AgentLoop, LoopEnd};

/// One inbound conversational request.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub query: String,
    pub session_id: String,
    pub connection_id: String,
    pub config: ChatbotConfig,
}

/// Pipeline-level knobs sourced from application config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Run the query-rewrite chain before retrieval/decision.
    pub rewrite_query: bool,
    /// Sentence terminators for chunk buffering.
    pub terminators: HashSet<char>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            rewrite_query: true,
            terminators: default_terminators(),
        }
    }
}

pub struct TurnPipeline {
    invoker: Arc<dyn Invoker>,
    chains: Arc<ChainRegistry>,
    stop: Arc<dyn StopSignalStore>,
    sessions: Arc<dyn SessionStore>,
    agent: AgentLoop,
    options: PipelineOptions,
}

impl TurnPipeline {
    pub fn new(
        invoker: Arc<dyn Invoker>,
        chains: Arc<ChainRegistry>,
        stop: Arc<dyn StopSignalStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let agent = AgentLoop::new(invoker.clone(), chains.clone(), stop.clone());
        Self {
            invoker,
            chains,
            stop,
            sessions,
            agent,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default_max_iterations(mut self, max_iterations: u32) -> Self {
        self.agent = self.agent.with_max_iterations(max_iterations);
        self
    }

    /// Run one turn, emitting the full message sequence on `emitter`.
    /// The stream always terminates: `END` on success or cancellation,
    /// `ERROR` on internal failure.
    pub async fn run(&self, request: TurnRequest, emitter: &mut Emitter) {
        emitter.start().await;
        if let Err(e) = self.execute(&request, emitter).await {
            error!(
                session_id = %request.session_id,
                error = %e,
                "Turn failed"
            );
            emitter.error(e.to_string()).await;
        }
    }

    async fn execute(&self, request: &TurnRequest, emitter: &mut Emitter) -> Result<(), Error> {
        if request.query.trim().is_empty() {
            return Err(AgentError::InvalidRequest("query must not be empty".into()).into());
        }

        let history: Vec<ChatTurn> = self
            .sessions
            .get_history(&request.session_id)
            .await
            .map_err(Error::Session)?
            .iter()
            .flat_map(|turn| turn.as_chat_turns())
            .collect();

        let mut state = TurnState::new(&request.query, history);

        if self.consume_stop(&request.connection_id).await {
            emitter.end().await;
            return Ok(());
        }

        if self.options.rewrite_query {
            state = self.rewrite(state, &request.config).await;
        }

        let (answer, state, intent) = if !request.config.tools.is_empty() {
            let outcome = self
                .agent
                .run(state, &request.config, &request.connection_id, emitter)
                .await
                .map_err(Error::Agent)?;
            if outcome.end == LoopEnd::Cancelled {
                emitter.end().await;
                return Ok(());
            }
            (outcome.answer, outcome.state, outcome.end.as_str())
        } else {
            if !request.config.retrievers.is_empty() {
                state = self.retrieve(state, &request.config).await;
            }

            if self.consume_stop(&request.connection_id).await {
                emitter.end().await;
                return Ok(());
            }

            let answer = self.generate(&state, &request.config).await?;
            (answer, state, TaskType::Generation.as_str())
        };

        if !state.context_docs.is_empty() {
            emitter.context(state.context_docs.clone()).await;
        }

        let mut buffer = SentenceBuffer::new(self.options.terminators.clone());
        for unit in buffer.push(&answer) {
            emitter.chunk(unit).await;
        }
        if let Some(remainder) = buffer.flush() {
            emitter.chunk(remainder).await;
        }

        // The session records the question as asked, not as rewritten.
        self.sessions
            .append_turn(
                &request.session_id,
                SessionTurn::new(&request.query, &answer).with_intent(intent),
            )
            .await
            .map_err(Error::Session)?;

        emitter.end().await;
        Ok(())
    }

    /// Rewrite the query into a standalone form. Any failure falls back
    /// to the original query; rewriting is an optimization, not a gate.
    async fn rewrite(&self, state: TurnState, config: &ChatbotConfig) -> TurnState {
        let chain = match self
            .chains
            .get_chain(&config.model_id, TaskType::QueryRewrite)
        {
            Ok(chain) => chain,
            Err(_) => return state,
        };

        let mut input = ChainInput::for_query(&state.query);
        input.chat_history = state.history_for_model().to_vec();
        input.sampling = config.sampling_for(TaskType::QueryRewrite);
        input.system_prompt = config.system_prompt.clone();

        match chain.run(self.invoker.as_ref(), input).await {
            Ok(output) if !output.text.trim().is_empty() => {
                let rewritten = output.text.trim().to_string();
                info!(rewritten = %rewritten, "Query rewritten");
                state.with_query(rewritten)
            }
            Ok(_) => state,
            Err(e) => {
                warn!(error = %e, "Query rewrite failed, keeping original query");
                state
            }
        }
    }

    /// Composed retrieval for the no-tools path. Failures degrade to an
    /// empty context rather than aborting the turn.
    async fn retrieve(&self, state: TurnState, config: &ChatbotConfig) -> TurnState {
        let payload = serde_json::json!({
            "query": state.query,
            "retrievers": config.retrievers,
            "rerankers": [config.reranker],
            "options": config.retrieval,
        });
        let result = self
            .invoker
            .invoke(InvocationRequest::local(COMPOSE_UNIT, payload))
            .await;

        if !result.is_success() {
            warn!(reason = %result.error_message(), "Retrieval failed, continuing without context");
            return state;
        }
        match serde_json::from_value::<Vec<RetrievalCandidate>>(result.payload["docs"].clone()) {
            Ok(docs) => state.with_context_docs(docs),
            Err(e) => {
                warn!(error = %e, "Malformed retrieval output, continuing without context");
                state
            }
        }
    }

    async fn generate(&self, state: &TurnState, config: &ChatbotConfig) -> Result<String, Error> {
        let chain = self
            .chains
            .get_chain(&config.model_id, TaskType::Generation)
            .map_err(|e| AgentError::GenerationFailed(e.to_string()))?;

        let mut input =
            ChainInput::for_query(&state.query).with_var("context", render_context(state));
        input.chat_history = state.history_for_model().to_vec();
        input.sampling = config.sampling_for(TaskType::Generation);
        input.system_prompt = config.system_prompt.clone();

        let output = chain
            .run(self.invoker.as_ref(), input)
            .await
            .map_err(|e| AgentError::GenerationFailed(e.to_string()))?;
        Ok(output.text)
    }

    async fn consume_stop(&self, connection_id: &str) -> bool {
        if self.stop.check(connection_id).await {
            info!(connection_id = %connection_id, "Stop signal consumed, cancelling turn");
            self.stop.clear(connection_id).await;
            true
        } else {
            false
        }
    }
}

fn render_context(state: &TurnState) -> String {
    if state.context_docs.is_empty() {
        return "(no context)".into();
    }
    state
        .context_docs
        .iter()
        .map(|d| format!("[{}] {}", d.source_id, d.page_content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
