//! HTTP surface over the domain services.

pub mod actions;
pub mod auth;
pub mod context;
pub mod error;
pub mod messages;
pub mod projects;
pub mod rate_limit;
pub mod routing;
pub mod tasks;
pub mod waves;

use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::models::config::Config;
use crate::domain::ports::MetricsRepository;
use crate::services::{
    ActionService, BlockingService, CleanupScheduler, ContextService, MessageService,
    ProjectService, RegistryService, RequestService, RoutingEngine, SessionService,
    SubscriptionService, SubtaskService, TaskListService, TokenService, WaveController,
};

use rate_limit::{source_ip, too_many_requests, RateLimits};

/// Operation deadline applied to every request.
const REQUEST_DEADLINE: Duration = Duration::from_secs(5);

/// Everything the handlers need, wired once at startup.
pub struct AppState {
    pub pool: PgPool,
    pub projects: Arc<ProjectService>,
    pub requests: Arc<RequestService>,
    pub task_lists: Arc<TaskListService>,
    pub subtasks: Arc<SubtaskService>,
    pub actions: Arc<ActionService>,
    pub sessions: Arc<SessionService>,
    pub messages: Arc<MessageService>,
    pub blockings: Arc<BlockingService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub contexts: Arc<ContextService>,
    pub registry: Arc<RegistryService>,
    pub routing: Arc<RoutingEngine>,
    pub waves: Arc<WaveController>,
    pub cleanup: Arc<CleanupScheduler>,
    pub metrics: Arc<dyn MetricsRepository>,
    pub tokens: Arc<TokenService>,
    pub rate_limits: Arc<RateLimits>,
}

/// Assemble the full router.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = build_cors(config);

    Router::new()
        // Projects, requests, hierarchy
        .route("/projects", post(projects::post_project).get(projects::list_projects))
        .route("/projects/by-path", get(projects::get_by_path))
        .route(
            "/projects/:id",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route("/projects/:id/requests", get(projects::list_project_requests))
        .route("/hierarchy/:id", get(projects::hierarchy))
        .route("/requests", post(projects::post_request))
        .route(
            "/requests/:id",
            get(projects::get_request).patch(projects::patch_request),
        )
        // Task lists and subtasks
        .route("/tasks", post(tasks::post_task_list))
        .route(
            "/tasks/:id",
            get(tasks::get_task_list)
                .patch(tasks::patch_task_list)
                .delete(tasks::delete_task_list),
        )
        .route("/requests/:id/tasks", get(tasks::list_request_task_lists))
        .route("/subtasks", post(tasks::post_subtask).get(tasks::list_subtasks))
        .route(
            "/subtasks/:id",
            get(tasks::get_subtask)
                .patch(tasks::patch_subtask)
                .delete(tasks::delete_subtask),
        )
        .route("/subtasks/close-session", post(tasks::close_session))
        .route("/subtasks/:id/actions", get(actions::list_subtask_actions))
        // Actions, sessions, capacity
        .route("/actions", post(actions::post_action))
        .route("/actions/hourly", get(actions::hourly))
        .route("/actions/:id", get(actions::get_action))
        .route("/sessions", get(actions::list_sessions))
        .route("/sessions/stats", get(actions::session_stats))
        .route("/sessions/:id", get(actions::get_session))
        .route("/sessions/:id/end", post(actions::end_session))
        .route("/sessions/:id/requests", get(projects::list_session_requests))
        .route("/agents/active", get(actions::active_agents))
        .route("/capacity", get(actions::list_capacity))
        .route("/capacity/:agent_id", get(actions::get_capacity))
        // Messages, blockings, subscriptions
        .route("/messages", post(messages::post_message))
        .route("/messages/:id", get(messages::get_messages))
        .route("/messages/:id/read", post(messages::mark_read))
        .route("/blockings", post(messages::block).delete(messages::unblock))
        .route("/blockings/:agent_id", get(messages::list_blockings))
        .route("/blockings/:agent_id/status", get(messages::blocking_status))
        .route(
            "/subscriptions",
            post(messages::subscribe).delete(messages::unsubscribe),
        )
        .route("/subscriptions/:agent_id", get(messages::list_subscriptions))
        // Routing
        .route("/routing/suggest", get(routing::suggest))
        .route("/routing/feedback", post(routing::feedback))
        .route("/routing/stats", get(routing::stats))
        // Context and compact snapshots
        .route("/context/generate", post(context::generate))
        .route("/context/:agent_id", get(context::brief))
        .route("/compact/save", post(context::save_snapshot))
        .route("/compact/restore", post(context::restore_snapshot))
        .route("/compact/status/:session_id", get(context::snapshot_status))
        .route("/compact/snapshot/:session_id", get(context::get_snapshot))
        // Waves
        .route("/waves/:session_id/create", post(waves::create))
        .route("/waves/:session_id/start", post(waves::start))
        .route("/waves/:session_id/transition", post(waves::transition))
        .route("/waves/:session_id/current", get(waves::current))
        .route("/waves/:session_id/history", get(waves::history))
        .route("/waves/:session_id/batches", get(waves::batches))
        // Auth, registry, cleanup, dashboard
        .route("/auth/token", post(auth::issue_token))
        .route("/registry", post(auth::post_registry_entry).get(auth::list_registry))
        .route(
            "/registry/:agent_type",
            get(auth::get_registry_entry).delete(auth::delete_registry_entry),
        )
        .route("/cleanup/stats", get(auth::cleanup_stats))
        .route("/cleanup/run", post(auth::run_cleanup))
        .route("/dashboard", get(auth::dashboard))
        .route("/health", get(auth::health))
        .layer(middleware::from_fn_with_state(state.clone(), write_rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_err: tower::BoxError| async {
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        Json(serde_json::json!({
                            "error": "timeout",
                            "message": "operation exceeded deadline",
                        })),
                    )
                }))
                .layer(TimeoutLayer::new(REQUEST_DEADLINE)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the HTTP surface until the shutdown signal flips.
pub async fn serve(
    state: Arc<AppState>,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    let router = build_router(state, config);

    tracing::info!("HTTP API listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    let mut shutdown_rx = shutdown;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

fn build_cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

/// Optional token-bucket limiting on mutating endpoints. The auth token
/// endpoint has its own, stricter preset applied in its handler.
async fn write_rate_limit(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let is_write = matches!(
        *request.method(),
        Method::POST | Method::PATCH | Method::DELETE
    );
    if is_write && request.uri().path() != "/auth/token" {
        let source = source_ip(request.headers());
        if let Err(retry_after) = state.rate_limits.check_write(&source) {
            return too_many_requests(retry_after);
        }
    }
    next.run(request).await
}

/// Shared helper: source identity for handlers that need it.
pub(crate) fn request_source(headers: &HeaderMap) -> String {
    source_ip(headers)
}
