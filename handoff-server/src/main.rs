//! # Task Inactivity Orchestrator Server
//!
//! The production deployment target: wires environment configuration, the
//! Postgres-backed store, the live messaging-provider client, the
//! reconciliation dispatcher, and the two HTTP surfaces into a runnable
//! process. Grounded in the parent stack's `tasker-server` binary — same
//! bootstrap → serve → graceful-shutdown shape, scaled down to this
//! system's much smaller surface.

use std::sync::Arc;
use std::time::Duration;

use handoff_api::AppState;
use handoff_orchestrator::{
    ActivitySink, Dispatcher, FlexPipeline, InactivityScheduler, InternalPipeline, Metrics, Orchestrator,
    WorkspaceResolution,
};
use handoff_persistence::{PersistencePort, PostgresPersistence};
use handoff_provider::{MessagingProviderPort, ProviderCredentials, RestMessagingProvider};
use handoff_shared::clock::SystemClock;
use handoff_shared::config::OrchestratorConfig;
use handoff_shared::resilience::{CircuitBreaker, CircuitBreakerConfig};
use handoff_shared::Clock;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    handoff_shared::logging::init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "starting task inactivity orchestrator");

    let config = OrchestratorConfig::from_env();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/handoff".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    let persistence: Arc<dyn PersistencePort> = Arc::new(PostgresPersistence::new(pool));

    let credentials = ProviderCredentials {
        account_sid: std::env::var("TASKS_PROVIDER_ACCOUNT_SID").unwrap_or_default(),
        auth_token: std::env::var("TASKS_PROVIDER_AUTH_TOKEN").unwrap_or_default(),
        from_number: std::env::var("TASKS_PROVIDER_FROM_NUMBER").unwrap_or_default(),
    };
    let breaker = Arc::new(CircuitBreaker::new("messaging-provider", CircuitBreakerConfig::default()));
    let provider: Arc<dyn MessagingProviderPort> =
        Arc::new(RestMessagingProvider::new(credentials).with_circuit_breaker(breaker));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = InactivityScheduler::new();
    let metrics = Metrics::new();

    let workspace = match std::env::var("TASKS_FLEX_WORKSPACE_SID") {
        Ok(sid) if !sid.is_empty() => WorkspaceResolution::Configured(sid),
        _ => WorkspaceResolution::AutoDetect,
    };

    let internal = InternalPipeline::new(
        persistence.clone(),
        provider.clone(),
        scheduler.clone(),
        clock.clone(),
        metrics.clone(),
    );
    let flex = FlexPipeline::new(
        persistence.clone(),
        provider.clone(),
        scheduler.clone(),
        clock.clone(),
        workspace,
        config.flex_poll_limit,
        config.flex_close_conversation,
        config.flex_complete_task,
        metrics.clone(),
        config.automation_author.clone(),
    );
    let dispatcher = Dispatcher::new(internal.clone(), flex, config.source_mode, config.batch_size, metrics.clone());

    let orchestrator = Orchestrator::start(dispatcher, scheduler.clone(), config.poll_interval, config.auto_enabled);

    let state = AppState {
        internal: Arc::new(internal),
        activity: Arc::new(ActivitySink::new(persistence, scheduler, clock, config.automation_author)),
    };
    let app = handoff_api::router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let bind_addr = std::env::var("TASKS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received, stopping orchestrator");
    match tokio::time::timeout(Duration::from_secs(30), orchestrator.stop()).await {
        Ok(()) => info!("orchestrator stopped cleanly"),
        Err(_) => error!("orchestrator stop timed out after 30s"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
