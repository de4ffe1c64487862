//! The chain registry and chain execution.
//!
//! A chain associates a (model_id, task_type) key with exactly one prompt
//! template and one postprocessor. Registration is idempotent per key:
//! re-registering the same key overwrites the previous entry — last write
//! wins. That is the resolution rule for duplicate registrations.

use ragline_core::chat_config::{SamplingParams, TaskType};
use ragline_core::error::ChainError;
use ragline_core::invocation::{InvocationMode, InvocationRequest, Invoker};
use ragline_core::turn::ChatTurn;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::postprocess::Postprocessor;
use crate::template::PromptTemplate;

/// The template + postprocessor pair registered under one key.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub template: PromptTemplate,
    pub postprocessor: Postprocessor,
    /// Where the model backend unit runs.
    pub mode: InvocationMode,
}

/// Input to one chain invocation.
#[derive(Debug, Clone, Default)]
pub struct ChainInput {
    /// The current user query.
    pub query: String,

    /// Prior turns exposed to the model (current query excluded).
    pub chat_history: Vec<ChatTurn>,

    /// Extra template variables beyond `query`.
    pub vars: HashMap<String, String>,

    /// Sampling parameters for this call.
    pub sampling: SamplingParams,

    /// System prompt override.
    pub system_prompt: Option<String>,
}

impl ChainInput {
    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

/// Output of one chain invocation.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Postprocessed model text.
    pub text: String,

    /// The raw model result payload, for callers that need more than text.
    pub raw: serde_json::Value,
}

/// A chain bound to its key, ready to run.
#[derive(Debug, Clone)]
pub struct Chain {
    model_id: String,
    task: TaskType,
    spec: ChainSpec,
}

impl Chain {
    /// Render the template, invoke the model backend (a unit named by
    /// `model_id`), and postprocess the raw output.
    pub async fn run(
        &self,
        invoker: &dyn Invoker,
        input: ChainInput,
    ) -> Result<ChainOutput, ChainError> {
        let mut vars = input.vars.clone();
        vars.insert("query".into(), input.query.clone());
        let prompt = self.spec.template.render(&vars);

        let payload = serde_json::json!({
            "llm_config": {
                "model_id": self.model_id,
                "model_kwargs": {
                    "temperature": input.sampling.temperature,
                    "max_tokens": input.sampling.max_tokens,
                    "stop": input.sampling.stop,
                },
                "system_prompt": input.system_prompt,
                "intent_type": self.task.as_str(),
            },
            "llm_input": {
                "query": prompt,
                "chat_history": input.chat_history,
            },
        });

        debug!(model = %self.model_id, task = %self.task.as_str(), "Running chain");

        let request = InvocationRequest::new(&self.model_id, payload, self.spec.mode);
        let result = invoker.invoke(request).await;

        if !result.is_success() {
            return Err(ChainError::InvocationFailed {
                model_id: self.model_id.clone(),
                task: self.task.as_str().into(),
                reason: result.error_message().to_string(),
            });
        }

        let raw_text = result.payload["text"].as_str().ok_or_else(|| {
            ChainError::InvocationFailed {
                model_id: self.model_id.clone(),
                task: self.task.as_str().into(),
                reason: "model result payload missing 'text'".into(),
            }
        })?;

        let text = self.spec.postprocessor.apply(raw_text)?;
        Ok(ChainOutput {
            text,
            raw: result.payload,
        })
    }
}

/// Registry of chains keyed by (model_id, task_type).
pub struct ChainRegistry {
    chains: HashMap<(String, TaskType), ChainSpec>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }

    /// Register a chain. Last write wins for duplicate keys.
    pub fn register(&mut self, model_id: impl Into<String>, task: TaskType, spec: ChainSpec) {
        let model_id = model_id.into();
        if self
            .chains
            .insert((model_id.clone(), task), spec)
            .is_some()
        {
            debug!(model = %model_id, task = %task.as_str(), "Replaced existing chain registration");
        }
    }

    /// Look up the chain for a key. Unknown keys are a typed error.
    pub fn get_chain(&self, model_id: &str, task: TaskType) -> Result<Chain, ChainError> {
        let spec = self
            .chains
            .get(&(model_id.to_string(), task))
            .cloned()
            .ok_or_else(|| ChainError::UnknownChain {
                model_id: model_id.to_string(),
                task: task.as_str().into(),
            })?;
        Ok(Chain {
            model_id: model_id.to_string(),
            task,
            spec,
        })
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the default chain set for a model: query rewrite, tool
/// decision, generation, and rerank scoring.
pub fn register_defaults(registry: &mut ChainRegistry, model_id: &str, mode: InvocationMode) {
    registry.register(
        model_id,
        TaskType::QueryRewrite,
        ChainSpec {
            template: PromptTemplate::new(
                "Rewrite the following user question as a standalone search query, \
                 resolving pronouns from the conversation. Reply with only the query \
                 inside <rewritten> tags.\n\nQuestion: {{query}}",
            ),
            postprocessor: Postprocessor::extract_tag("rewritten"),
            mode,
        },
    );
    registry.register(
        model_id,
        TaskType::ToolDecision,
        ChainSpec {
            template: PromptTemplate::new(
                "You may call one of the available tools or answer directly.\n\
                 Tools:\n{{tools}}\n\nObservations so far:\n{{observations}}\n\n\
                 To call a tool, reply with <tool>{\"name\": ..., \"arguments\": {...}}</tool>. \
                 Otherwise reply with the final answer.\n\nQuestion: {{query}}",
            ),
            postprocessor: Postprocessor::Passthrough,
            mode,
        },
    );
    registry.register(
        model_id,
        TaskType::Generation,
        ChainSpec {
            template: PromptTemplate::new(
                "Answer the question using the context.\n\nContext:\n{{context}}\n\n\
                 Question: {{query}}",
            ),
            postprocessor: Postprocessor::Passthrough,
            mode,
        },
    );
    registry.register(
        model_id,
        TaskType::Rerank,
        ChainSpec {
            template: PromptTemplate::new(
                "Score the relevance of the passage to the query from 0 to 1. \
                 Reply with only the number.\n\nQuery: {{query}}\nPassage: {{passage}}",
            ),
            postprocessor: Postprocessor::ParseScore,
            mode,
        },
    );
}
