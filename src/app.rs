use crate::config::Config;
use crate::prediction::{GeminiPredictor, HbPredictor};
use crate::server::HttpServer;
use crate::session::SessionStore;

use std::sync::Arc;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let predictor: Arc<dyn HbPredictor> = match GeminiPredictor::new(&config.gemini) {
        Ok(predictor) => Arc::new(predictor),
        Err(e) => {
            tracing::error!("Failed to initialize prediction service: {:?}", e);
            return Err(e.into());
        }
    };
    tracing::info!(model = %config.gemini.model, "Prediction service ready");

    let sessions = Arc::new(SessionStore::new(
        predictor,
        config.sessions.max_sessions,
    ));
    let server = HttpServer::new(sessions.clone(), &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);

    let sweeper_handle = tokio::spawn(sessions.run_sweeper(
        config.sessions.idle_ttl(),
        config.sessions.sweep_interval(),
        shutdown_tx.subscribe(),
    ));
    tracing::info!(
        idle_ttl_secs = config.sessions.idle_ttl_secs,
        max_sessions = config.sessions.max_sessions,
        "Session sweeper started"
    );

    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;
    sweeper_handle.await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
