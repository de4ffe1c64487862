//! The bounded tool-calling loop.
//!
//! Each iteration runs the tool-decision chain and either executes the
//! selected tool (appending the observation to the turn state) or stops
//! with the model's final answer. The loop terminates in one of three
//! ways: `FinalAnswer`, `BudgetExhausted` after `max_iterations`
//! decide steps, or `Cancelled` when the connection's stop signal is
//! observed. The stop signal is polled before every model invocation
//! and before/after every tool invocation, and is cleared once consumed.

use ragline_chains::{ChainInput, ChainRegistry};
use ragline_core::chat_config::{ChatbotConfig, TaskType};
use ragline_core::error::AgentError;
use ragline_core::invocation::{InvocationRequest, Invoker};
use ragline_core::retrieval::RetrievalCandidate;
use ragline_core::signal::StopSignalStore;
use ragline_core::tool::ToolSet;
use ragline_core::turn::{ToolTrace, TurnState};
use ragline_stream::Emitter;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::decision::AgentDecision;

/// Fallback iteration budget when the turn config does not override it.
pub const DEFAULT_MAX_ITERATIONS: u32 = 6;

/// How the loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    FinalAnswer,
    BudgetExhausted,
    Cancelled,
}

impl LoopEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinalAnswer => "final_answer",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The loop's result: terminal state, answer text, and the accumulated
/// turn state (tool trace + context docs). `answer` is empty when
/// cancelled.
#[derive(Debug)]
pub struct LoopOutcome {
    pub end: LoopEnd,
    pub answer: String,
    pub state: TurnState,
}

pub struct AgentLoop {
    invoker: Arc<dyn Invoker>,
    chains: Arc<ChainRegistry>,
    stop: Arc<dyn StopSignalStore>,
    default_max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        invoker: Arc<dyn Invoker>,
        chains: Arc<ChainRegistry>,
        stop: Arc<dyn StopSignalStore>,
    ) -> Self {
        Self {
            invoker,
            chains,
            stop,
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.default_max_iterations = max_iterations;
        self
    }

    /// Run the loop for one turn. Monitor events for each tool call are
    /// emitted on the stream; content messages are the caller's concern.
    pub async fn run(
        &self,
        mut state: TurnState,
        config: &ChatbotConfig,
        connection_id: &str,
        emitter: &mut Emitter,
    ) -> Result<LoopOutcome, AgentError> {
        let tools = ToolSet::new(config.tools.clone());
        let budget = config
            .max_iterations
            .unwrap_or(self.default_max_iterations)
            .max(1);

        for iteration in 1..=budget {
            if self.consume_stop(connection_id).await {
                return Ok(cancelled(state));
            }

            let decision = self.decide(&state, config, &tools).await?;
            match decision {
                AgentDecision::FinalAnswer(answer) => {
                    debug!(iteration, "Loop reached final answer");
                    return Ok(LoopOutcome {
                        end: LoopEnd::FinalAnswer,
                        answer,
                        state,
                    });
                }
                AgentDecision::Malformed { reason } => {
                    warn!(iteration, %reason, "Unparseable tool selection, feeding back");
                    state = state.with_trace(ToolTrace {
                        tool_name: "<unparsed>".into(),
                        arguments: serde_json::json!({}),
                        success: false,
                        output: reason,
                    });
                }
                AgentDecision::ToolCall { name, arguments } => {
                    emitter
                        .monitor(serde_json::json!({
                            "event": "tool_call",
                            "iteration": iteration,
                            "tool": &name,
                        }))
                        .await;

                    if self.consume_stop(connection_id).await {
                        return Ok(cancelled(state));
                    }

                    state = self.call_tool(state, &tools, &name, arguments).await;

                    if self.consume_stop(connection_id).await {
                        return Ok(cancelled(state));
                    }
                }
            }
        }

        info!(budget, "Iteration budget exhausted");
        let answer = last_tool_output(&state).unwrap_or_else(|| {
            "I was unable to complete the request within the allotted steps.".to_string()
        });
        Ok(LoopOutcome {
            end: LoopEnd::BudgetExhausted,
            answer,
            state,
        })
    }

    async fn decide(
        &self,
        state: &TurnState,
        config: &ChatbotConfig,
        tools: &ToolSet,
    ) -> Result<AgentDecision, AgentError> {
        let chain = self
            .chains
            .get_chain(&config.model_id, TaskType::ToolDecision)
            .map_err(|e| AgentError::DecisionFailed(e.to_string()))?;

        let mut input = ChainInput::for_query(&state.query)
            .with_var("tools", render_tools(tools))
            .with_var("observations", render_observations(state));
        input.chat_history = state.history_for_model().to_vec();
        input.sampling = config.sampling_for(TaskType::ToolDecision);
        input.system_prompt = config.system_prompt.clone();

        let output = chain
            .run(self.invoker.as_ref(), input)
            .await
            .map_err(|e| AgentError::DecisionFailed(e.to_string()))?;
        Ok(AgentDecision::parse(&output.text))
    }

    /// Execute one selected tool and fold the observation into the state.
    /// Every failure path becomes a trace entry the next decide step sees;
    /// nothing here aborts the loop.
    async fn call_tool(
        &self,
        state: TurnState,
        tools: &ToolSet,
        name: &str,
        arguments: serde_json::Value,
    ) -> TurnState {
        let Some(descriptor) = tools.get(name) else {
            warn!(tool = %name, "Model selected a tool that is not registered");
            return state.with_trace(ToolTrace {
                tool_name: name.to_string(),
                arguments,
                success: false,
                output: format!("unknown tool '{name}'"),
            });
        };

        let request = InvocationRequest::new(
            &descriptor.invocation_target,
            arguments.clone(),
            descriptor.mode,
        );
        let result = self.invoker.invoke(request).await;

        if !result.is_success() {
            warn!(tool = %name, reason = %result.error_message(), "Tool invocation failed");
            let output = result.error_message().to_string();
            return state.with_trace(ToolTrace {
                tool_name: name.to_string(),
                arguments,
                success: false,
                output,
            });
        }

        // Retrieval-shaped outputs contribute context documents as well
        // as an observation.
        let docs = parse_docs(&result.payload);
        let output = match &docs {
            Some(docs) => docs
                .iter()
                .map(|d| d.page_content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            None => result.payload.to_string(),
        };

        let state = state.with_trace(ToolTrace {
            tool_name: name.to_string(),
            arguments,
            success: true,
            output,
        });
        match docs {
            Some(docs) => state.with_context_docs(docs),
            None => state,
        }
    }

    /// Check the connection's stop signal, clearing it if set.
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

fn cancelled(state: TurnState) -> LoopOutcome {
    LoopOutcome {
        end: LoopEnd::Cancelled,
        answer: String::new(),
        state,
    }
}

fn parse_docs(payload: &serde_json::Value) -> Option<Vec<RetrievalCandidate>> {
    let docs = payload.get("docs")?;
    serde_json::from_value(docs.clone()).ok()
}

fn last_tool_output(state: &TurnState) -> Option<String> {
    state
        .tool_trace
        .iter()
        .rev()
        .find(|t| t.success && !t.output.is_empty())
        .map(|t| t.output.clone())
}

fn render_tools(tools: &ToolSet) -> String {
    if tools.is_empty() {
        return "(none)".into();
    }
    tools
        .descriptors()
        .iter()
        .map(|d| format!("- {}: {} | parameters: {}", d.name, d.description, d.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_observations(state: &TurnState) -> String {
    if state.tool_trace.is_empty() {
        return "(none)".into();
    }
    state
        .tool_trace
        .iter()
        .enumerate()
        .map(|(i, t)| {
            if t.success {
                format!("{}. [{}] {}", i + 1, t.tool_name, t.output)
            } else {
                format!("{}. [{}] error: {}", i + 1, t.tool_name, t.output)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{model_text, ScriptedInvoker};
    use ragline_chains::register_defaults;
    use ragline_core::invocation::{FailureKind, InvocationMode, InvocationResult};
    use ragline_core::tool::ToolDescriptor;
    use ragline_stream::InMemoryStopStore;

    const MODEL: &str = "gpt-4o";

    fn chains() -> Arc<ChainRegistry> {
        let mut registry = ChainRegistry::new();
        register_defaults(&mut registry, MODEL, InvocationMode::Local);
        Arc::new(registry)
    }

    fn search_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "search".into(),
            description: "Search the knowledge base".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "q": { "type": "string" } },
                "required": ["q"]
            }),
            invocation_target: "unit.search".into(),
            mode: InvocationMode::Local,
        }
    }

    fn config_with_tools() -> ChatbotConfig {
        let mut config = ChatbotConfig::new(MODEL);
        config.tools = vec![search_tool()];
        config
    }

    fn agent(invoker: Arc<ScriptedInvoker>, stop: Arc<InMemoryStopStore>) -> AgentLoop {
        AgentLoop::new(invoker, chains(), stop)
    }

    #[tokio::test]
    async fn direct_answer_terminates_first_iteration() {
        let invoker = Arc::new(
            ScriptedInvoker::new().enqueue(MODEL, model_text("Rust is a systems language.")),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker, stop)
            .run(
                TurnState::new("what is rust?", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::FinalAnswer);
        assert_eq!(outcome.answer, "Rust is a systems language.");
        assert!(outcome.state.tool_trace.is_empty());
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .enqueue(
                    MODEL,
                    model_text(r#"<tool>{"name": "search", "arguments": {"q": "rust"}}</tool>"#),
                )
                .enqueue(MODEL, model_text("Rust is memory safe."))
                .fixed(
                    "unit.search",
                    InvocationResult::success(serde_json::json!({"result": "borrow checker"})),
                ),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker.clone(), stop)
            .run(
                TurnState::new("is rust safe?", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::FinalAnswer);
        assert_eq!(outcome.state.tool_trace.len(), 1);
        assert!(outcome.state.tool_trace[0].success);
        assert!(outcome.state.tool_trace[0].output.contains("borrow checker"));
        assert_eq!(invoker.calls_to("unit.search"), 1);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .enqueue(
                    MODEL,
                    model_text(r#"<tool>{"name": "nonexistent", "arguments": {}}</tool>"#),
                )
                .enqueue(MODEL, model_text("Answering without that tool.")),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker, stop)
            .run(
                TurnState::new("q", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::FinalAnswer);
        assert_eq!(outcome.state.tool_trace.len(), 1);
        assert!(!outcome.state.tool_trace[0].success);
        assert!(outcome.state.tool_trace[0].output.contains("nonexistent"));
    }

    #[tokio::test]
    async fn malformed_tool_block_fed_back() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .enqueue(MODEL, model_text("<tool>not json</tool>"))
                .enqueue(MODEL, model_text("Recovered answer.")),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker, stop)
            .run(
                TurnState::new("q", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::FinalAnswer);
        assert_eq!(outcome.answer, "Recovered answer.");
        assert!(!outcome.state.tool_trace[0].success);
    }

    /// Budget exhaustion with a model that keeps calling tools still
    /// yields non-empty answer content (the last tool output).
    #[tokio::test]
    async fn budget_exhaustion_returns_last_tool_output() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fixed(
                    MODEL,
                    model_text(r#"<tool>{"name": "search", "arguments": {"q": "more"}}</tool>"#),
                )
                .fixed(
                    "unit.search",
                    InvocationResult::success(serde_json::json!({"result": "partial data"})),
                ),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let mut config = config_with_tools();
        config.max_iterations = Some(2);

        let outcome = agent(invoker, stop)
            .run(TurnState::new("q", vec![]), &config, "conn-1", &mut emitter)
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::BudgetExhausted);
        assert!(!outcome.answer.is_empty());
        assert!(outcome.answer.contains("partial data"));
        assert_eq!(outcome.state.tool_trace.len(), 2);
    }

    #[tokio::test]
    async fn budget_exhaustion_without_tool_output_has_fallback_text() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .fixed(
                    MODEL,
                    model_text(r#"<tool>{"name": "search", "arguments": {}}</tool>"#),
                )
                .fixed(
                    "unit.search",
                    InvocationResult::failure(FailureKind::ToolExecutionError, "index offline"),
                ),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let mut config = config_with_tools();
        config.max_iterations = Some(2);

        let outcome = agent(invoker, stop)
            .run(TurnState::new("q", vec![]), &config, "conn-1", &mut emitter)
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::BudgetExhausted);
        assert!(!outcome.answer.is_empty());
    }

    #[tokio::test]
    async fn retrieval_shaped_output_captured_as_context() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .enqueue(
                    MODEL,
                    model_text(r#"<tool>{"name": "search", "arguments": {"q": "rust"}}</tool>"#),
                )
                .enqueue(MODEL, model_text("Done."))
                .fixed(
                    "unit.search",
                    InvocationResult::success(serde_json::json!({
                        "docs": [{
                            "page_content": "Rust ships without a garbage collector",
                            "retrieval_score": 0.8,
                            "source_id": "doc-1#0"
                        }]
                    })),
                ),
        );
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker, stop)
            .run(
                TurnState::new("q", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.state.context_docs.len(), 1);
        assert_eq!(outcome.state.context_docs[0].source_id, "doc-1#0");
        assert!(outcome.state.tool_trace[0]
            .output
            .contains("garbage collector"));
    }

    #[tokio::test]
    async fn pre_set_stop_signal_cancels_before_any_model_call() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let stop = Arc::new(InMemoryStopStore::default());
        stop.set("conn-1").await;
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let outcome = agent(invoker.clone(), stop.clone())
            .run(
                TurnState::new("q", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.end, LoopEnd::Cancelled);
        assert_eq!(invoker.calls_to(MODEL), 0);
        // Consumed, not left behind for the next request.
        assert!(!stop.check("conn-1").await);
    }

    #[tokio::test]
    async fn decision_failure_is_hard_error() {
        let invoker = Arc::new(ScriptedInvoker::new().fixed(
            MODEL,
            InvocationResult::failure(FailureKind::TransientFailure, "worker down"),
        ));
        let stop = Arc::new(InMemoryStopStore::default());
        let (mut emitter, _rx) = Emitter::channel(16);
        emitter.start().await;

        let err = agent(invoker, stop)
            .run(
                TurnState::new("q", vec![]),
                &config_with_tools(),
                "conn-1",
                &mut emitter,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DecisionFailed(_)));
    }
}
