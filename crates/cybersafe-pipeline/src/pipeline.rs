//! Pipeline lifecycle
//!
//! The host sees three calls: [`Pipeline::initialize`] once at startup,
//! [`Pipeline::ingest`] per captured notification, and
//! [`Pipeline::shutdown`] at exit. Nothing is buffered unless the pipeline
//! is active, and it only becomes active once every model has loaded.

use crate::executor::{InferenceExecutor, WorkerContext};
use crate::store::EphemeralStore;
use cybersafe_classifiers::{ClassifierPort, FeatureEncoder, ModelLoader, ModelSpec};
use cybersafe_core::{Error, Event, PipelineConfig, Result};
use cybersafe_telemetry::{PipelineMetrics, ScoreReporter};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Outcome of handing one event to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// Buffered and queued for inference
    Queued,
    /// Empty or whitespace-only text; nothing buffered
    Empty,
    /// Pipeline not active; text dropped
    Inactive,
}

enum PipelineState {
    Inactive,
    Starting,
    Active(InferenceExecutor),
    Failed,
    Stopped,
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Starting => "starting",
            Self::Active(_) => "active",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

/// Privacy-bounded inference pipeline
pub struct Pipeline {
    config: PipelineConfig,
    encoder: Arc<dyn FeatureEncoder>,
    reporter: Arc<dyn ScoreReporter>,
    store: Arc<EphemeralStore>,
    metrics: PipelineMetrics,
    runtime: Handle,
    state: RwLock<PipelineState>,
}

impl Pipeline {
    /// Create an inactive pipeline bound to the current Tokio runtime
    pub fn new(
        config: PipelineConfig,
        encoder: Arc<dyn FeatureEncoder>,
        reporter: Arc<dyn ScoreReporter>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::internal(format!("pipeline needs a Tokio runtime: {}", e)))?;
        let metrics = PipelineMetrics::new();
        let store = EphemeralStore::with_handle(config.ttl(), runtime.clone(), metrics.clone());

        Ok(Self {
            config,
            encoder,
            reporter,
            store: Arc::new(store),
            metrics,
            runtime,
            state: RwLock::new(PipelineState::Inactive),
        })
    }

    /// Load every model and start the inference worker.
    ///
    /// Loading blocks the calling thread. On any failure the pipeline is
    /// left failed: it never becomes active and drops everything ingested.
    /// A [`shutdown`](Self::shutdown) that lands while models are loading
    /// wins: the freshly started worker is stopped and an error returned.
    pub fn initialize(&self, loader: &dyn ModelLoader, specs: &[ModelSpec]) -> Result<()> {
        {
            let mut state = self.state.write();
            if !matches!(*state, PipelineState::Inactive) {
                return Err(Error::internal(format!(
                    "pipeline cannot initialize while {}",
                    state.name()
                )));
            }
            *state = PipelineState::Starting;
        }

        match self.start(loader, specs) {
            Ok(executor) => {
                let mut state = self.state.write();
                if !matches!(*state, PipelineState::Starting) {
                    let current = state.name();
                    drop(state);
                    // Dropping the handle tells the worker to release the models.
                    drop(executor);
                    warn!(state = current, "Pipeline stopped while initializing");
                    return Err(Error::internal(format!(
                        "pipeline was {} during initialization",
                        current
                    )));
                }
                *state = PipelineState::Active(executor);
                drop(state);

                info!(
                    categories = self.config.categories.len(),
                    ttl_secs = self.config.ttl_secs,
                    reporter = self.reporter.name(),
                    "Pipeline active"
                );
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.write();
                if matches!(*state, PipelineState::Starting) {
                    *state = PipelineState::Failed;
                }
                error!(error = %e, "Pipeline failed to initialize; no events will be scored");
                Err(e)
            }
        }
    }

    fn start(&self, loader: &dyn ModelLoader, specs: &[ModelSpec]) -> Result<InferenceExecutor> {
        self.config.validate()?;

        if self.encoder.dimension() != self.config.feature_dim {
            return Err(Error::encode(format!(
                "encoder produces {} features, models expect {}",
                self.encoder.dimension(),
                self.config.feature_dim
            )));
        }

        let mut port = ClassifierPort::new();
        port.load_all(loader, specs, &self.config)?;

        InferenceExecutor::spawn(WorkerContext {
            port,
            encoder: Arc::clone(&self.encoder),
            reporter: Arc::clone(&self.reporter),
            store: Arc::clone(&self.store),
            metrics: self.metrics.clone(),
            report_timeout: self.config.report_timeout(),
            runtime: self.runtime.clone(),
        })
    }

    /// Hand over one captured notification
    pub fn ingest(
        &self,
        id: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> IngestStatus {
        self.ingest_event(Event::new(id, source, text))
    }

    /// Hand over one captured event.
    ///
    /// A duplicate id within the TTL replaces the buffered ticket and text;
    /// the first of the two queued ids claims the newer entry and the second
    /// is dropped.
    pub fn ingest_event(&self, event: Event) -> IngestStatus {
        self.metrics.record_ingested();

        if event.text.is_blank() {
            self.metrics.record_skipped_empty();
            debug!(id = %event.id, source = %event.source, "Skipping empty text");
            return IngestStatus::Empty;
        }

        // Held across put + submit so shutdown cannot slip in between.
        let state = self.state.read();
        let PipelineState::Active(executor) = &*state else {
            self.metrics.record_skipped_inactive();
            debug!(id = %event.id, state = state.name(), "Pipeline not active, dropping event");
            return IngestStatus::Inactive;
        };

        let (ticket, text) = event.into_parts();
        let id = ticket.id.clone();
        self.store.put(ticket, text);

        if let Err(e) = executor.submit(id.clone()) {
            drop(self.store.take_and_remove(&id));
            self.metrics.record_skipped_inactive();
            error!(id = %id, error = %e, "Failed to queue event");
            return IngestStatus::Inactive;
        }

        self.metrics.record_queued();
        debug!(id = %id, stage = "queued");
        IngestStatus::Queued
    }

    /// Stop admission, drain queued events, release the models and clear
    /// the store. Safe to call more than once.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), PipelineState::Stopped);

        if let PipelineState::Active(executor) = previous {
            executor.shutdown().await;
        }

        let cleared = self.store.clear();
        if cleared > 0 {
            debug!(cleared, "Discarded buffered entries");
        }
        info!("Pipeline stopped");
    }

    /// Whether events are currently being accepted
    pub fn is_active(&self) -> bool {
        matches!(*self.state.read(), PipelineState::Active(_))
    }

    /// Number of entries currently buffered
    pub fn buffered(&self) -> usize {
        self.store.len()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
