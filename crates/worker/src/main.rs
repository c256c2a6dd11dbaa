use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use autotube_core::action::Stage;
use autotube_core::storage::{ArtifactStore, LocalArtifactStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autotube_worker::config::WorkerConfig;
use autotube_worker::executor::StageExecutor;
use autotube_worker::executors::{
    ScriptExecutor, UploadExecutor, VideoExecutor, VoiceoverExecutor,
};
use autotube_worker::llm::LlmClient;
use autotube_worker::runner::StageRunner;
use autotube_worker::youtube::YoutubeClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autotube_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        worker = %config.worker_name,
        stages = ?config.stages,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = autotube_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    autotube_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection pool created");

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.temp_dir.display()))?;
    let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(
        config.storage_root.clone(),
        config.public_base_url.clone(),
    ));

    // --- Runners ---
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for &stage in &config.stages {
        let Some(executor) = build_executor(stage, &config, &pool, &store) else {
            continue;
        };
        let runner = StageRunner::new(
            pool.clone(),
            executor,
            config.runner_name(stage),
            Duration::from_secs(config.poll_interval_secs),
            config.heartbeat_ttl_secs,
        );
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { runner.run(token).await }));
    }
    anyhow::ensure!(!handles.is_empty(), "No stage runners could be started");

    shutdown_signal().await;
    cancel.cancel();

    tracing::info!("Waiting for stage runners to finish their current job");
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Stage runner task panicked");
        }
    }

    pool.close().await;
    tracing::info!("Worker shutdown complete");
    Ok(())
}

/// The executor for `stage`, or `None` if its external service is not
/// configured.
fn build_executor(
    stage: Stage,
    config: &WorkerConfig,
    pool: &sqlx::PgPool,
    store: &Arc<dyn ArtifactStore>,
) -> Option<Arc<dyn StageExecutor>> {
    match stage {
        Stage::Script => match &config.llm {
            Some(provider) => Some(Arc::new(ScriptExecutor::new(
                LlmClient::new(provider.clone()),
                Arc::clone(store),
            ))),
            None => {
                tracing::warn!("No LLM API key configured, script stage disabled");
                None
            }
        },
        Stage::Voiceover => Some(Arc::new(VoiceoverExecutor::new(
            Arc::clone(store),
            config.tts_voice.clone(),
            config.temp_dir.clone(),
        ))),
        Stage::Video => Some(Arc::new(VideoExecutor::new(
            Arc::clone(store),
            config.background_video_dir.clone(),
            config.temp_dir.clone(),
        ))),
        Stage::Upload => match &config.youtube {
            Some(credentials) => Some(Arc::new(UploadExecutor::new(
                pool.clone(),
                YoutubeClient::new(credentials.clone()),
                Arc::clone(store),
                config.temp_dir.clone(),
            ))),
            None => {
                tracing::warn!("YouTube credentials not configured, upload stage disabled");
                None
            }
        },
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
