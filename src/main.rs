//! cbi-worker: reads inbound messages as JSON lines on stdin, runs each
//! through the pipeline, and writes replies as JSON lines on stdout.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use cbi_lib::config::{self, Settings};
use cbi_lib::db::SqliteStore;
use cbi_lib::messaging::GatewayRegistry;
use cbi_lib::pipeline::notify::LogSink;
use cbi_lib::pipeline::oracle::OllamaOracle;
use cbi_lib::pipeline::{InboundMessage, MetricsSnapshot, Pipeline, PipelineDeps, Worker};
use cbi_lib::pipeline_config::SurveillanceConfig;

const QUEUE_DEPTH: usize = 64;

fn main() {
    cbi_lib::init_tracing();
    tracing::info!("{} worker starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(e) = run() {
        tracing::error!(error = %e, "Worker failed");
        std::process::exit(1);
    }
}

/// Builds the pipeline outside any runtime. The Ollama clients are blocking
/// and must be created and dropped off the async threads, so `main` keeps a
/// handle to the pipeline until the runtime is gone.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env();
    let surveillance = match &settings.surveillance_config {
        Some(path) => SurveillanceConfig::load(path)?,
        None => SurveillanceConfig::default(),
    };
    if settings.reporter_salt.is_empty() {
        tracing::warn!("CBI_REPORTER_SALT is unset; reporter hashes are unsalted");
    }

    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&settings.database_path)?);
    tracing::info!(path = %settings.database_path.display(), "Database ready");

    let deps = PipelineDeps {
        dialogue_oracle: Arc::new(OllamaOracle::new(&settings.ollama_url, &settings.dialogue_model)?),
        classification_oracle: Arc::new(OllamaOracle::new(
            &settings.ollama_url,
            &settings.classification_model,
        )?),
        conversations: store.clone(),
        reports: store,
        gateways: Arc::new(GatewayRegistry::console()),
        sink: Arc::new(LogSink),
    };
    let pipeline = Arc::new(Pipeline::new(deps, surveillance, &settings.reporter_salt));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(serve(Arc::clone(&pipeline), settings.worker_ceiling));
    drop(runtime);
    drop(pipeline);

    let metrics = served?;
    tracing::info!(
        processed = metrics.processed,
        failed = metrics.failed,
        timed_out = metrics.timed_out,
        "Input closed, worker done"
    );
    Ok(())
}

async fn serve(
    pipeline: Arc<Pipeline>,
    ceiling: Duration,
) -> Result<MetricsSnapshot, Box<dyn std::error::Error>> {
    let worker = Worker::new(pipeline, ceiling);
    let (tx, rx) = mpsc::channel::<InboundMessage>(QUEUE_DEPTH);
    let consumer = tokio::spawn(worker.run(rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    tracing::error!("Worker queue closed");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Skipping malformed inbound line"),
        }
    }
    drop(tx);

    Ok(consumer.await?)
}
