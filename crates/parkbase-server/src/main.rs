mod api;
mod middleware;
mod pipeline;
mod scheduler;
mod webhook;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use parkbase_db::PgStore;
use tracing_subscriber::EnvFilter;

use crate::{
    api::AppState,
    middleware::RateLimitState,
    pipeline::{build_app, PipelineConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = parkbase_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = parkbase_db::connect_pool_from_config(&config).await?;
    let applied = parkbase_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let rate_limit = RateLimitState::from_config(&config);
    let _scheduler = scheduler::build_scheduler(rate_limit.clone()).await?;

    let state = AppState::from_store(Arc::new(PgStore::new(pool)), config.webhook_secret.clone());
    let app = build_app(state, PipelineConfig::from_app_config(&config, rate_limit));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "parkbase-server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
