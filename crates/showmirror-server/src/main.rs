mod api;
mod middleware;
mod runner;
mod scheduler;

use std::sync::Arc;

use showmirror_sync::{
    CatalogSource, MirrorStore, Orchestrator, OrchestratorSettings, PgMirrorStore,
};
use showmirror_tvmaze::TvMazeClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    runner::{recorded_launcher, RunController},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(showmirror_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = showmirror_db::PoolConfig::from_app_config(&config);
    let pool = showmirror_db::connect_pool(&config.database_url, pool_config).await?;
    showmirror_db::run_migrations(&pool).await?;

    match showmirror_sync::abandon_stale_runs(&pool).await? {
        Some(0) => {}
        Some(abandoned) => {
            tracing::warn!(abandoned, "marked ingest runs left over from a previous process as failed");
        }
        None => tracing::info!("another process holds the run lock; leaving its ingest runs alone"),
    }

    let catalog: Arc<dyn CatalogSource> = Arc::new(TvMazeClient::from_config(&config)?);
    let store: Arc<dyn MirrorStore> = Arc::new(PgMirrorStore::new(pool.clone()));
    let orchestrator = Orchestrator::new(
        catalog,
        store,
        OrchestratorSettings::from_app_config(&config),
    );
    let runs = RunController::new(recorded_launcher(pool.clone(), orchestrator));

    let _scheduler = scheduler::build_scheduler(runs.clone(), &config.update_schedule).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        showmirror_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            runs: runs.clone(),
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "showmirror server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runs.shutdown().await;
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

    tracing::info!("received shutdown signal, cancelling any active run");
}
