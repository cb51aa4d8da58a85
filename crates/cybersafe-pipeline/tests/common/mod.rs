//! Shared mocks for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use cybersafe_classifiers::{
    FeatureEncoder, FeatureVector, HashingEncoder, ModelLoader, ModelSpec, RiskModel,
};
use cybersafe_core::{Error, PipelineConfig, Result, RiskCategory, ScoreResult, SensitiveText};
use cybersafe_pipeline::Pipeline;
use cybersafe_telemetry::{CollectorPayload, ScoreReporter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observations shared by every model a loader produces
#[derive(Default)]
pub struct ModelStats {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    /// `SensitiveText::live_count()` seen at each score call
    pub live_texts: Mutex<Vec<usize>>,
    /// Per-call delays, consumed in call order
    pub delays: Mutex<VecDeque<Duration>>,
}

/// A risk model returning a fixed score and recording how it was called
pub struct MockModel {
    category: RiskCategory,
    dim: usize,
    score: f32,
    stats: Arc<ModelStats>,
}

impl RiskModel for MockModel {
    fn category(&self) -> &RiskCategory {
        &self.category
    }

    fn input_dim(&self) -> usize {
        self.dim
    }

    fn score(&self, _features: &FeatureVector) -> Result<f32> {
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        self.stats.live_texts.lock().push(SensitiveText::live_count());

        let delay = self.stats.delays.lock().pop_front();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.score)
    }
}

/// Loader producing `MockModel`s, failing for configured categories
#[derive(Default)]
pub struct MockLoader {
    scores: HashMap<String, f32>,
    failing: Vec<String>,
    load_delay: Option<Duration>,
    pub stats: Arc<ModelStats>,
}

impl MockLoader {
    /// Loader for the default categories scoring (0.8, 0.1, 0.05)
    pub fn scenario() -> Self {
        Self::default()
            .with_score("insult", 0.8)
            .with_score("threat", 0.1)
            .with_score("bullying", 0.05)
    }

    pub fn with_score(mut self, category: &str, score: f32) -> Self {
        self.scores.insert(category.to_string(), score);
        self
    }

    pub fn failing(mut self, category: &str) -> Self {
        self.failing.push(category.to_string());
        self
    }

    /// Block for `delay` in every load call
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Delay the next score calls, in order
    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.stats.delays.lock().extend(delays);
        self
    }
}

impl ModelLoader for MockLoader {
    fn load(&self, spec: &ModelSpec, feature_dim: usize) -> Result<Box<dyn RiskModel>> {
        if let Some(delay) = self.load_delay {
            std::thread::sleep(delay);
        }

        let name = spec.category.as_str();
        if self.failing.iter().any(|f| f == name) {
            return Err(Error::load(name, "simulated load failure"));
        }

        Ok(Box::new(MockModel {
            category: spec.category.clone(),
            dim: feature_dim,
            score: self.scores.get(name).copied().unwrap_or(0.0),
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Encoder wrapper counting how often it is invoked
pub struct CountingEncoder {
    inner: HashingEncoder,
    pub calls: AtomicUsize,
}

impl CountingEncoder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            inner: HashingEncoder::from_config(config).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FeatureEncoder for CountingEncoder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn encode(&self, text: &str) -> FeatureVector {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(text)
    }
}

/// Reporter recording every result and its serialized payload
#[derive(Default)]
pub struct RecordingReporter {
    pub results: Mutex<Vec<ScoreResult>>,
    pub payloads: Mutex<Vec<String>>,
    /// Calls (1-based) that fail
    pub fail_on: Vec<usize>,
    /// Calls (1-based) that hang past any sane timeout
    pub hang_on: Vec<usize>,
    pub calls: AtomicUsize,
}

impl RecordingReporter {
    pub fn sources(&self) -> Vec<String> {
        self.results
            .lock()
            .iter()
            .map(|r| r.source().to_string())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

#[async_trait]
impl ScoreReporter for RecordingReporter {
    async fn report(&self, result: &ScoreResult) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.hang_on.contains(&call) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.fail_on.contains(&call) {
            return Err(Error::report("collector unavailable"));
        }

        let payload = serde_json::to_string(&CollectorPayload::from(result))?;
        self.payloads.lock().push(payload);
        self.results.lock().push(result.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Specs for the default categories
pub fn default_specs() -> Vec<ModelSpec> {
    RiskCategory::defaults()
        .into_iter()
        .map(|c| {
            let path = format!("/models/{}.safetensors", c);
            ModelSpec::local(c, path)
        })
        .collect()
}

pub fn small_config() -> PipelineConfig {
    PipelineConfig {
        feature_dim: 16,
        ..Default::default()
    }
}

/// Pipeline with a counting encoder and recording reporter, not yet
/// initialized
pub fn pipeline_with(
    config: PipelineConfig,
    reporter: Arc<RecordingReporter>,
) -> (Pipeline, Arc<CountingEncoder>) {
    let encoder = Arc::new(CountingEncoder::new(&config));
    let pipeline = Pipeline::new(config, encoder.clone(), reporter).unwrap();
    (pipeline, encoder)
}
