use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::connect_to_db;
use crate::infrastructure::media::ffmpeg::FfmpegTranscoder;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::S3Storage;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::stream::service::StreamService;
use crate::modules::video::repository::PgVideoRepository;
use crate::modules::video::service::VideoService;
use crate::state::AppState;
use crate::workers::transcoder::TranscodeWorker;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::new()?;
    info!(mode = ?config.mode, "Starting reelcast...");

    let pool = connect_to_db(&config.database_url).await?;
    let storage: Arc<dyn ObjectStore> = Arc::new(S3Storage::new(&config.storage));
    let rabbit = Arc::new(RabbitMqService::new(config.queue.clone()).await?);

    let videos = VideoService::new(
        Arc::new(PgVideoRepository::new(pool)),
        storage.clone(),
        rabbit.clone(),
        config.storage.source_bucket.clone(),
        config.storage.presign_ttl,
    );

    videos.prepare_source_bucket().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let worker = config.mode.runs_worker().then(|| {
        let worker = TranscodeWorker::new(
            storage.clone(),
            videos.clone(),
            Arc::new(FfmpegTranscoder::new(config.transcoder.clone())),
            &config.storage,
            &config.worker,
        );
        let queue = rabbit.clone();
        let token = shutdown.clone();

        tokio::spawn(async move {
            let result = worker.run(queue.as_ref(), token.clone()).await;
            if let Err(e) = &result {
                error!("Transcoder worker stopped: {:#}", e);
            }
            // A dead worker takes the API down with it.
            token.cancel();
            result
        })
    });

    if config.mode.runs_api() {
        let stream = StreamService::new(
            videos.clone(),
            storage,
            config.storage.output_bucket.clone(),
            config.stream.proxy_base.clone(),
        );
        let app = app::create_app(AppState::new(videos, stream));

        let addr = format!("0.0.0.0:{}", config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Server running on http://{}", addr);

        let token = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;
    }

    let result = match worker {
        Some(handle) => handle.await?,
        None => Ok(()),
    };

    rabbit.close().await;
    info!("Shutdown complete");
    result
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => return,
    }

    info!("Shutdown signal received, finishing in-flight work");
    token.cancel();
}
