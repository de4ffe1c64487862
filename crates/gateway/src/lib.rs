//! # Ragline Gateway
//!
//! HTTP/WebSocket surface of the backend: a REST chat endpoint, a
//! WebSocket stream carrying the typed message protocol, and the
//! out-of-band stop endpoints for cancellation.
//!
//! Built on Axum. All collaborators (dispatcher, chains, stop store,
//! session store) are constructed once at startup and shared via `Arc`.

pub mod api;

use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use ragline_agent::{PipelineOptions, TurnPipeline};
use ragline_chains::{register_defaults, ChainRegistry};
use ragline_config::AppConfig;
use ragline_core::error::Error;
use ragline_core::invocation::{
    FailureKind, InvocationMode, InvocationRequest, InvocationResult, Invoker,
};
use ragline_invoke::{Dispatcher, RemoteDispatcher, UnitRegistry};
use ragline_retrieval::{Composer, ComposerUnit};
use ragline_session::InMemorySessionStore;
use ragline_stream::InMemoryStopStore;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<TurnPipeline>,
    pub stop: Arc<InMemoryStopStore>,
    pub sessions: Arc<InMemorySessionStore>,
    pub config: AppConfig,
}

pub type SharedState = Arc<AppState>;

/// An invoker bound after construction.
///
/// The composer is registered as a unit inside the dispatcher while also
/// invoking retriever/reranker units *through* that dispatcher, so the
/// two cannot be constructed in a single pass. The composer gets this
/// cell up front; the finished dispatcher is bound into it afterwards.
#[derive(Default)]
struct BoundInvoker {
    inner: OnceLock<Arc<dyn Invoker>>,
}

impl BoundInvoker {
    fn bind(&self, invoker: Arc<dyn Invoker>) {
        let _ = self.inner.set(invoker);
    }
}

#[async_trait]
impl Invoker for BoundInvoker {
    async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        match self.inner.get() {
            Some(invoker) => invoker.invoke(request).await,
            None => InvocationResult::failure(
                FailureKind::ToolExecutionError,
                "dispatcher not yet bound",
            ),
        }
    }
}

/// Wire up the full collaborator graph from application config.
pub fn build_state(config: AppConfig) -> Result<SharedState, Error> {
    let client = reqwest::Client::new();
    let remote = RemoteDispatcher::new(
        client,
        config.invocation.remote_endpoints.clone(),
        Duration::from_secs(config.invocation.timeout_secs),
    );

    let bound = Arc::new(BoundInvoker::default());
    let late: Arc<dyn Invoker> = bound.clone();
    let composer = Arc::new(Composer::new(late));

    let mut registry = UnitRegistry::new();
    registry
        .register(Arc::new(ComposerUnit::new(composer)))
        .map_err(Error::Invoke)?;

    let dispatcher: Arc<dyn Invoker> = Arc::new(Dispatcher::new(Arc::new(registry), remote));
    bound.bind(dispatcher.clone());

    // Model backends are separately-deployed workers; the default chains
    // invoke them in remote mode.
    let mut chains = ChainRegistry::new();
    register_defaults(&mut chains, &config.defaults.model_id, InvocationMode::Remote);

    let stop = Arc::new(InMemoryStopStore::new(config.stream.stop_ttl_secs));
    let sessions = Arc::new(InMemorySessionStore::new());

    let pipeline = TurnPipeline::new(
        dispatcher,
        Arc::new(chains),
        stop.clone(),
        sessions.clone(),
    )
    .with_options(PipelineOptions {
        rewrite_query: config.defaults.rewrite_query,
        terminators: config.stream.terminators.iter().copied().collect(),
    })
    .with_default_max_iterations(config.agent.max_iterations);

    Ok(Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        stop,
        sessions,
        config,
    }))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/v1/chat", post(api::chat_handler))
        .route("/v1/stream", get(api::stream_handler))
        .route("/v1/stop/{connection_id}", post(api::set_stop_handler))
        .route("/v1/stop/{connection_id}", delete(api::clear_stop_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config)?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}
