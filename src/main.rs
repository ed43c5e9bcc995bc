//! DCM server entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;

use dcm::adapters::postgres::{
    create_pool, Migrator, PgActionRepository, PgBlockingRepository, PgCapacityRepository,
    PgContextRepository, PgMessageRepository, PgMetricsRepository, PgProjectRepository,
    PgRegistryRepository, PgRequestRepository, PgRoutingRepository, PgSessionRepository,
    PgSubscriptionRepository, PgSubtaskRepository, PgTaskListRepository, PgWaveRepository,
};
use dcm::api::{self, rate_limit::RateLimits, AppState};
use dcm::domain::models::config::Config;
use dcm::gateway::Gateway;
use dcm::infrastructure::{config::ConfigLoader, logging};
use dcm::services::{
    ActionService, BlockingService, CleanupScheduler, ContextService, EventBus, MessageService,
    PlainBriefFormatter, ProjectService, RegistryService, RequestService, RoutingEngine,
    SessionService, SubscriptionService, SubtaskService, TaskListService, TokenService,
    WaveController,
};

/// Placeholder signing key tolerated outside production.
const DEV_SECRET_PLACEHOLDER: &str = "dcm-development-secret";

#[derive(Parser)]
#[command(name = "dcm", about = "Distributed context manager", version)]
struct Cli {
    /// Path to a config file (defaults to dcm.yaml + dcm.local.yaml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordination plane (default).
    Serve,
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Run one cleanup tick and exit.
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            // Startup misconfiguration: one line, non-zero exit.
            eprintln!("dcm: {err}");
            std::process::exit(1);
        }
    };

    logging::init(&config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::Cleanup => cleanup_once(config).await,
    }
}

async fn migrate(config: Config) -> Result<()> {
    let pool = create_pool(&config.database, None)
        .await
        .context("Failed to connect to database")?;
    let applied = Migrator::new(pool.clone())
        .run()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("applied {applied} migrations");
    Ok(())
}

async fn cleanup_once(config: Config) -> Result<()> {
    let pool = create_pool(&config.database, None)
        .await
        .context("Failed to connect to database")?;
    let scheduler = CleanupScheduler::new(
        Arc::new(PgMessageRepository::new(pool.clone())),
        Arc::new(PgSessionRepository::new(pool.clone())),
        Arc::new(PgContextRepository::new(pool.clone())),
        Arc::new(PgSubtaskRepository::new(pool.clone())),
        config.cleanup.clone(),
    );
    let stats = scheduler.run_once().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let pool = create_pool(&config.database, None)
        .await
        .context("Failed to connect to database")?;

    Migrator::new(pool.clone())
        .run()
        .await
        .context("Failed to run database migrations")?;

    // Repositories
    let projects = Arc::new(PgProjectRepository::new(pool.clone()));
    let requests = Arc::new(PgRequestRepository::new(pool.clone()));
    let task_lists = Arc::new(PgTaskListRepository::new(pool.clone()));
    let subtasks = Arc::new(PgSubtaskRepository::new(pool.clone()));
    let actions = Arc::new(PgActionRepository::new(pool.clone()));
    let messages = Arc::new(PgMessageRepository::new(pool.clone()));
    let sessions = Arc::new(PgSessionRepository::new(pool.clone()));
    let contexts = Arc::new(PgContextRepository::new(pool.clone()));
    let waves = Arc::new(PgWaveRepository::new(pool.clone()));
    let routing_scores = Arc::new(PgRoutingRepository::new(pool.clone()));
    let blockings = Arc::new(PgBlockingRepository::new(pool.clone()));
    let subscriptions = Arc::new(PgSubscriptionRepository::new(pool.clone()));
    let capacity = Arc::new(PgCapacityRepository::new(pool.clone()));
    let registry = Arc::new(PgRegistryRepository::new(pool.clone()));
    let metrics = Arc::new(PgMetricsRepository::new(pool.clone()));

    // Auth tokens
    let secret = match &config.auth.secret {
        Some(secret) if !secret.trim().is_empty() => secret.clone(),
        _ => {
            tracing::warn!("no auth secret configured; using development placeholder");
            DEV_SECRET_PLACEHOLDER.to_string()
        }
    };
    let tokens = Arc::new(TokenService::new(secret, config.token_ttl_secs()));

    // Services
    let wave_controller = Arc::new(WaveController::new(waves.clone(), task_lists.clone()));
    let project_service = Arc::new(ProjectService::new(projects.clone()));
    let request_service = Arc::new(RequestService::new(
        requests.clone(),
        projects.clone(),
        sessions.clone(),
    ));
    let task_list_service = Arc::new(TaskListService::new(
        task_lists.clone(),
        requests.clone(),
        waves.clone(),
    ));
    let subtask_service = Arc::new(SubtaskService::new(
        subtasks.clone(),
        task_lists.clone(),
        requests.clone(),
        wave_controller.clone(),
    ));
    let action_service = Arc::new(ActionService::new(
        actions.clone(),
        subtasks.clone(),
        capacity.clone(),
    ));
    let session_service = Arc::new(SessionService::new(sessions.clone()));
    let message_service = Arc::new(MessageService::new(
        messages.clone(),
        config.messages.default_ttl_seconds,
    ));
    let blocking_service = Arc::new(BlockingService::new(blockings.clone()));
    let subscription_service = Arc::new(SubscriptionService::new(subscriptions.clone()));
    let context_service = Arc::new(ContextService::new(
        contexts.clone(),
        projects.clone(),
        Arc::new(PlainBriefFormatter),
    ));
    let registry_service = Arc::new(RegistryService::new(registry.clone()));
    let routing_engine = Arc::new(RoutingEngine::new(routing_scores.clone()));

    let cleanup = Arc::new(CleanupScheduler::new(
        messages.clone(),
        sessions.clone(),
        contexts.clone(),
        subtasks.clone(),
        config.cleanup.clone(),
    ));

    // Gateway and event bus
    let gateway = Arc::new(Gateway::new(
        tokens.clone(),
        subscriptions.clone(),
        config.gateway.clone(),
        config.mode,
    ));
    let event_bus = Arc::new(EventBus::new(pool.clone(), gateway.clone(), metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    cleanup.clone().start(shutdown_rx.clone());
    event_bus.start(shutdown_rx.clone());

    let state = Arc::new(AppState {
        pool: pool.clone(),
        projects: project_service,
        requests: request_service,
        task_lists: task_list_service,
        subtasks: subtask_service,
        actions: action_service,
        sessions: session_service,
        messages: message_service,
        blockings: blocking_service,
        subscriptions: subscription_service,
        contexts: context_service,
        registry: registry_service,
        routing: routing_engine,
        waves: wave_controller,
        cleanup: cleanup.clone(),
        metrics,
        tokens,
        rate_limits: Arc::new(RateLimits::new(&config.rate_limit)),
    });

    let gateway_task = tokio::spawn(gateway.clone().serve(shutdown_rx.clone()));
    let api_config = config.clone();
    let api_task = tokio::spawn(async move { api::serve(state, &api_config, shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested, draining");

    // Drain order: intervals and listener first, then the servers close
    // their connections, then the pool.
    shutdown_tx.send(true).ok();
    cleanup.stop();

    let (gateway_result, api_result) = tokio::join!(gateway_task, api_task);
    if let Ok(Err(err)) = gateway_result {
        tracing::error!("gateway exited with error: {err}");
    }
    if let Ok(Err(err)) = api_result {
        tracing::error!("api exited with error: {err}");
    }

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
