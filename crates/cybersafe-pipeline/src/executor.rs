//! Serialized inference worker
//!
//! One dedicated thread owns the classifier port and drains a FIFO queue of
//! event ids. Per event the stages run strictly in order:
//!
//! `Queued → Claimed → Encoded → Scored → Disposed → Reported`
//!
//! with `Dropped` reachable from any stage. The raw text is dropped as soon
//! as it has been encoded, and the feature vector as soon as it has been
//! scored, so both are gone before anything is handed to the reporter.

use crate::store::EphemeralStore;
use cybersafe_classifiers::{ClassifierPort, FeatureEncoder};
use cybersafe_core::{Error, EventTicket, Result, ScoreResult};
use cybersafe_telemetry::{DropReason, PipelineMetrics, ScoreReporter};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Processing stage of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Claimed,
    Encoded,
    Scored,
    Disposed,
    Reported,
    Dropped,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Claimed => "claimed",
            Self::Encoded => "encoded",
            Self::Scored => "scored",
            Self::Disposed => "disposed",
            Self::Reported => "reported",
            Self::Dropped => "dropped",
        }
    }

    /// Whether no further transition can follow
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reported | Self::Dropped)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands sent to the worker thread
enum Command {
    /// Process the event buffered under this id
    Infer(String),

    /// Finish queued work, release the models and exit
    Shutdown,
}

/// Everything the worker needs, moved onto its thread
pub(crate) struct WorkerContext {
    pub port: ClassifierPort,
    pub encoder: Arc<dyn FeatureEncoder>,
    pub reporter: Arc<dyn ScoreReporter>,
    pub store: Arc<EphemeralStore>,
    pub metrics: PipelineMetrics,
    pub report_timeout: Duration,
    /// Runtime that drives reporter futures
    pub runtime: Handle,
}

/// Handle to the inference worker thread
pub struct InferenceExecutor {
    sender: mpsc::UnboundedSender<Command>,
    stopped: Option<oneshot::Receiver<()>>,
}

impl InferenceExecutor {
    /// Start the worker thread
    pub(crate) fn spawn(context: WorkerContext) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("cybersafe-inference".to_string())
            .spawn(move || {
                run_worker(context, receiver);
                let _ = stopped_tx.send(());
            })?;

        info!("Inference worker started");

        Ok(Self {
            sender,
            stopped: Some(stopped_rx),
        })
    }

    /// Queue the event buffered under `id` for inference
    pub fn submit(&self, id: String) -> Result<()> {
        self.sender
            .send(Command::Infer(id))
            .map_err(|_| Error::internal("inference worker has stopped"))
    }

    /// Drain the queue, release the classifier port and wait for the worker
    /// to exit
    pub async fn shutdown(mut self) {
        let _ = self.sender.send(Command::Shutdown);

        if let Some(stopped) = self.stopped.take() {
            if stopped.await.is_err() {
                error!("Inference worker exited abnormally");
            }
        }
    }
}

impl Drop for InferenceExecutor {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn run_worker(mut context: WorkerContext, mut receiver: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::Infer(id) => {
                let stage = process(&context, &id);
                debug_assert!(stage.is_terminal());
            }
            Command::Shutdown => {
                debug!("Inference worker shutting down");
                break;
            }
        }
    }

    context.port.release();
    info!("Inference worker stopped");
}

/// Run one event to a terminal stage
fn process(context: &WorkerContext, id: &str) -> Stage {
    // The ticket comes from the store, so it always matches the text.
    let Some((EventTicket { source, .. }, text)) = context.store.take_and_remove(id) else {
        return dropped(context, id, Stage::Queued, DropReason::NotFound);
    };
    debug!(id = %id, bytes = text.len(), stage = %Stage::Claimed);

    if !context.port.is_ready() {
        drop(text);
        return dropped(context, id, Stage::Claimed, DropReason::NotReady);
    }

    let started = Instant::now();
    let features = context.encoder.encode(text.expose());
    drop(text);
    debug!(id = %id, dim = features.len(), stage = %Stage::Encoded);

    let scores = context.port.score(&features);
    drop(features);

    let scores = match scores {
        Ok(scores) => scores,
        Err(e) => {
            warn!(id = %id, error = %e, "Scoring failed");
            return dropped(context, id, Stage::Encoded, DropReason::Scoring);
        }
    };
    let latency_us = started.elapsed().as_micros() as u64;
    context.metrics.record_inference_latency(latency_us);
    debug!(id = %id, latency_us, stage = %Stage::Scored);

    let result = ScoreResult::new(source, scores);
    debug!(id = %id, stage = %Stage::Disposed);

    let severity = result.severity();
    // The timer must be created inside the runtime, not on this thread.
    let outcome = context.runtime.block_on(async {
        tokio::time::timeout(context.report_timeout, context.reporter.report(&result)).await
    });

    match outcome {
        Ok(Ok(())) => {
            context.metrics.record_reported(severity);
            debug!(id = %id, reporter = context.reporter.name(), %severity, stage = %Stage::Reported);
            Stage::Reported
        }
        Ok(Err(e)) => {
            warn!(id = %id, reporter = context.reporter.name(), error = %e, "Report failed");
            dropped(context, id, Stage::Disposed, DropReason::Report)
        }
        Err(_) => {
            warn!(
                id = %id,
                reporter = context.reporter.name(),
                timeout_ms = context.report_timeout.as_millis() as u64,
                "Report timed out"
            );
            dropped(context, id, Stage::Disposed, DropReason::Report)
        }
    }
}

fn dropped(context: &WorkerContext, id: &str, from: Stage, reason: DropReason) -> Stage {
    context.metrics.record_dropped(reason);
    debug!(id = %id, from = %from, %reason, stage = %Stage::Dropped);
    Stage::Dropped
}
