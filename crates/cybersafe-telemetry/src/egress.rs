//! Score-only egress to the remote collector
//!
//! Reporters receive a [`ScoreResult`] and nothing else. The wire payload
//! can only be built from a `ScoreResult`, which holds no text, so there is
//! no way to attach raw text to a report.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cybersafe_core::{Error, Result, ScoreResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Destination for score results
#[async_trait]
pub trait ScoreReporter: Send + Sync {
    /// Deliver one result. Failures are reported, never retried here.
    async fn report(&self, result: &ScoreResult) -> Result<()>;

    /// Reporter name, for logs
    fn name(&self) -> &str;
}

/// JSON body sent to the collector.
///
/// Fields are private and the only constructor is `From<&ScoreResult>`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorPayload {
    app_name: String,

    /// One `<category>_score` entry per registered model
    #[serde(flatten)]
    scores: BTreeMap<String, f32>,

    produced_at: DateTime<Utc>,
}

impl CollectorPayload {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn scores(&self) -> &BTreeMap<String, f32> {
        &self.scores
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }
}

impl From<&ScoreResult> for CollectorPayload {
    fn from(result: &ScoreResult) -> Self {
        let scores = result
            .scores()
            .iter()
            .map(|s| (format!("{}_score", s.category), s.score))
            .collect();

        Self {
            app_name: result.source().to_string(),
            scores,
            produced_at: DateTime::<Utc>::from(result.produced_at()),
        }
    }
}

/// Collector acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorResponse {
    pub severity: String,

    #[serde(default)]
    pub action: Option<String>,
}

/// Reporter that POSTs payloads to an HTTP collector
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReporter {
    /// Create a reporter for `endpoint`, bounding every request by `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::config(format!(
                "collector endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ScoreReporter for HttpReporter {
    async fn report(&self, result: &ScoreResult) -> Result<()> {
        let payload = CollectorPayload::from(result);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::report(format!("collector request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::report(format!("collector returned {}", status)));
        }

        match response.json::<CollectorResponse>().await {
            Ok(ack) => debug!(
                source = %payload.app_name,
                severity = %ack.severity,
                action = ?ack.action,
                "collector accepted report"
            ),
            Err(e) => debug!(error = %e, "collector acknowledgement not understood"),
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Reporter that only logs, used when no collector is configured
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

#[async_trait]
impl ScoreReporter for LogReporter {
    async fn report(&self, result: &ScoreResult) -> Result<()> {
        let severity = result.severity();
        let scores: Vec<String> = result
            .scores()
            .iter()
            .map(|s| format!("{}={:.3}", s.category, s.score))
            .collect();

        if severity == Severity::High {
            info!(source = %result.source(), %severity, scores = %scores.join(" "), "high risk score");
        } else {
            debug!(source = %result.source(), %severity, scores = %scores.join(" "), "score");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybersafe_core::{CategoryScore, RiskCategory};
    use std::time::UNIX_EPOCH;

    fn sample() -> ScoreResult {
        ScoreResult::at(
            "com.example.chat",
            vec![
                CategoryScore::new(RiskCategory::insult(), 0.8),
                CategoryScore::new(RiskCategory::threat(), 0.1),
                CategoryScore::new(RiskCategory::bullying(), 0.05),
            ],
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = CollectorPayload::from(&sample());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["app_name"], "com.example.chat");
        assert!((json["insult_score"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert!((json["threat_score"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!((json["bullying_score"].as_f64().unwrap() - 0.05).abs() < 1e-6);
        assert_eq!(json["produced_at"], "2023-11-14T22:13:20Z");
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(HttpReporter::new("ftp://collector", Duration::from_secs(1)).is_err());
        assert!(HttpReporter::new("http://127.0.0.1:8000/api/analyze", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_log_reporter_never_fails() {
        let reporter = LogReporter;
        let result = ScoreResult::new("pkg", vec![]);
        assert!(reporter.report(&result).await.is_ok());
        assert!(reporter.report(&sample()).await.is_ok());
    }
}
