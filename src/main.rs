use std::net::SocketAddr;
use std::sync::Arc;

use ignite_backend::config::Config;
use ignite_backend::db::{default_sqlite_db_path, LearningStore, SqliteStore};
use ignite_backend::logging::init_tracing;
use ignite_backend::services::notifier::{DispatchService, GuardianNotifier};
use ignite_backend::state::AppState;
use ignite_backend::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _file_log_guard = init_tracing(&config);

    let opened = match config.database_url.as_deref() {
        Some(url) => SqliteStore::connect(url).await,
        None => SqliteStore::open_file(&default_sqlite_db_path()).await,
    };
    let store: Arc<dyn LearningStore> = match opened {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open learning store");
            std::process::exit(1);
        }
    };
    let notifier: Arc<dyn GuardianNotifier> = Arc::new(DispatchService::from_env());

    let worker_manager = match WorkerManager::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        config.inactivity.clone(),
    )
    .await
    {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let addr = config.bind_addr();
    let state = AppState::new(config, store, notifier);
    let app = ignite_backend::create_app(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "ignite-backend listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
