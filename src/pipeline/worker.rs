//! Async consumer. Messages are taken from a queue in arrival order and
//! each one runs on a blocking thread under an overall ceiling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::pipeline::error::PipelineError;
use crate::pipeline::orchestrator::{InboundMessage, Pipeline, ProcessOutcome};

/// Messages between expired-state purges.
const PURGE_EVERY: u64 = 100;

#[derive(Debug, Default)]
pub struct WorkerMetrics {
    processed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    total_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Mean duration of successfully processed messages.
    pub average_ms: f64,
}

impl WorkerMetrics {
    fn record_success(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            processed,
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            average_ms: if processed == 0 {
                0.0
            } else {
                total_ms as f64 / processed as f64
            },
        }
    }
}

pub struct Worker {
    pipeline: Arc<Pipeline>,
    ceiling: Duration,
    metrics: Arc<WorkerMetrics>,
}

impl Worker {
    pub fn new(pipeline: Arc<Pipeline>, ceiling: Duration) -> Self {
        Self {
            pipeline,
            ceiling,
            metrics: Arc::new(WorkerMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one message. A message past the ceiling is counted as timed
    /// out; its blocking thread finishes on its own and the worker moves on.
    pub async fn handle(&self, message: InboundMessage) -> Result<ProcessOutcome, PipelineError> {
        let started = Instant::now();
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || pipeline.process(&message));

        match tokio::time::timeout(self.ceiling, task).await {
            Ok(Ok(Ok(outcome))) => {
                self.metrics.record_success(started.elapsed());
                Ok(outcome)
            }
            Ok(Ok(Err(e))) => {
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "Message processing failed");
                Err(e)
            }
            Ok(Err(join)) => {
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %join, "Message processing task panicked or was cancelled");
                Err(PipelineError::Worker(join.to_string()))
            }
            Err(_) => {
                self.metrics.timed_out.fetch_add(1, Ordering::Relaxed);
                tracing::error!(ceiling_secs = self.ceiling.as_secs(), "Message processing timed out");
                Err(PipelineError::Timeout(self.ceiling.as_secs()))
            }
        }
    }

    /// Retry pending handoffs and purge expired conversations.
    async fn sweep(&self) {
        let pipeline = Arc::clone(&self.pipeline);
        match tokio::task::spawn_blocking(move || pipeline.purge_expired(Utc::now())).await {
            Ok(Err(e)) => tracing::warn!(error = %e, "Conversation purge failed"),
            Err(e) => tracing::warn!(error = %e, "Conversation purge task failed"),
            Ok(Ok(_)) => {}
        }
    }

    /// Drain the queue until every sender is dropped.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) -> MetricsSnapshot {
        tracing::info!(ceiling_secs = self.ceiling.as_secs(), "Worker started");
        // Pick up handoffs a previous run left pending.
        self.sweep().await;
        let mut seen: u64 = 0;

        while let Some(message) = inbound.recv().await {
            // Errors are already counted and logged.
            let _ = self.handle(message).await;
            seen += 1;

            if seen % PURGE_EVERY == 0 {
                self.sweep().await;
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            processed = snapshot.processed,
            failed = snapshot.failed,
            timed_out = snapshot.timed_out,
            average_ms = snapshot.average_ms,
            "Worker stopped"
        );

        // Oracles may own blocking HTTP clients, which panic when dropped on
        // a runtime thread. Release the pipeline on the blocking pool.
        let pipeline = self.pipeline;
        if let Err(e) = tokio::task::spawn_blocking(move || drop(pipeline)).await {
            tracing::warn!(error = %e, "Pipeline release task failed");
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Platform;
    use crate::db::SqliteStore;
    use crate::messaging::{GatewayRegistry, MessagingGateway, RecordingGateway};
    use crate::pipeline::notify::RecordingSink;
    use crate::pipeline::oracle::{MockOracle, OllamaOracle, Oracle, OracleError, OracleRequest};
    use crate::pipeline::orchestrator::PipelineDeps;
    use crate::pipeline::scenario_tests::Harness;
    use crate::pipeline_config::SurveillanceConfig;

    const PLAIN_REPLY: &str = r#"{"response": "Hello, how can I help?", "health_signal_detected": false}"#;

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            platform: Platform::Telegram,
            reporter_id: "1001".into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    struct SlowOracle(Duration);

    impl Oracle for SlowOracle {
        fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            std::thread::sleep(self.0);
            Ok(PLAIN_REPLY.to_string())
        }
    }

    #[tokio::test]
    async fn processes_queue_in_order_and_counts() {
        let harness = Harness::new(MockOracle::new(PLAIN_REPLY), MockOracle::new("{}"));
        let worker = Worker::new(harness.pipeline.clone(), Duration::from_secs(5));
        let (tx, rx) = mpsc::channel(8);

        for text in ["hi", "are you there?", "thanks"] {
            tx.send(inbound(text)).await.unwrap();
        }
        drop(tx);

        let snapshot = worker.run(rx).await;
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.timed_out, 0);

        let sent = harness.gateway.sent();
        assert_eq!(sent.len(), 3);
        let requests = harness.dialogue.requests();
        assert_eq!(requests[0].messages.last().unwrap().content, "hi");
        assert_eq!(requests[2].messages.last().unwrap().content, "thanks");
    }

    #[tokio::test]
    async fn slow_message_times_out_and_worker_continues() {
        let harness = Harness::with_dialogue(
            Arc::new(SlowOracle(Duration::from_millis(400))),
            MockOracle::new("{}"),
        );
        let worker = Worker::new(harness.pipeline.clone(), Duration::from_millis(50));

        let err = worker.handle(inbound("hello")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(_)));
        assert_eq!(worker.metrics().snapshot().timed_out, 1);
    }

    #[tokio::test]
    async fn average_duration_reflects_successes() {
        let harness = Harness::new(MockOracle::new(PLAIN_REPLY), MockOracle::new("{}"));
        let worker = Worker::new(harness.pipeline.clone(), Duration::from_secs(5));
        worker.handle(inbound("hi")).await.unwrap();

        let snapshot = worker.metrics().snapshot();
        assert_eq!(snapshot.processed, 1);
        assert!(snapshot.average_ms >= 0.0);
    }

    /// Pipeline whose oracles are real blocking HTTP clients pointed at a
    /// closed port. Built on the blocking pool, as `main` builds it off the
    /// runtime.
    async fn ollama_pipeline(gateway: Arc<RecordingGateway>) -> Arc<Pipeline> {
        tokio::task::spawn_blocking(move || {
            let oracle = Arc::new(OllamaOracle::new("http://127.0.0.1:9", "m").unwrap());
            let store = Arc::new(SqliteStore::in_memory().unwrap());
            let mut gateways = GatewayRegistry::new();
            gateways.register(Platform::Telegram, move |_| {
                Ok(gateway.clone() as Arc<dyn MessagingGateway>)
            });
            let deps = PipelineDeps {
                dialogue_oracle: oracle.clone(),
                classification_oracle: oracle,
                conversations: store.clone(),
                reports: store,
                gateways: Arc::new(gateways),
                sink: Arc::new(RecordingSink::new()),
            };
            Arc::new(Pipeline::new(deps, SurveillanceConfig::default(), "salt"))
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_releases_blocking_http_oracle_off_runtime() {
        let gateway = Arc::new(RecordingGateway::new(Platform::Telegram));
        let pipeline = ollama_pipeline(gateway.clone()).await;
        let worker = Worker::new(pipeline, Duration::from_secs(30));
        let (tx, rx) = mpsc::channel(1);
        tx.send(inbound("hello")).await.unwrap();
        drop(tx);

        // The worker holds the only pipeline handle, so its oracles are
        // dropped when run finishes.
        let snapshot = worker.run(rx).await;
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.failed, 0);

        // Unreachable oracle yields the apology, still delivered.
        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, crate::pipeline::dialogue::APOLOGY_EN);
    }

    #[test]
    fn empty_metrics_average_zero() {
        let snapshot = WorkerMetrics::default().snapshot();
        assert_eq!(snapshot.average_ms, 0.0);
        assert_eq!(snapshot.processed, 0);
    }
}
