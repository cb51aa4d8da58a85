//! Core types for CyberSafe

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use zeroize::Zeroize;

/// Number of `SensitiveText` values currently alive in the process
static LIVE_TEXTS: AtomicUsize = AtomicUsize::new(0);

/// Owned raw text captured from a notification.
///
/// Not `Clone`, not `Serialize`. Formatting prints only the length.
/// The backing buffer is overwritten with zeros when the value is dropped.
pub struct SensitiveText {
    inner: String,
}

impl SensitiveText {
    /// Take ownership of captured text
    pub fn new(text: impl Into<String>) -> Self {
        LIVE_TEXTS.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!("cybersafe_buffered_texts").increment(1.0);
        Self { inner: text.into() }
    }

    /// Borrow the raw text.
    ///
    /// Only the feature encoder should ever call this.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the text is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Check if the text is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Number of `SensitiveText` values alive in this process
    pub fn live_count() -> usize {
        LIVE_TEXTS.load(Ordering::SeqCst)
    }
}

impl Drop for SensitiveText {
    fn drop(&mut self) {
        self.inner.zeroize();
        LIVE_TEXTS.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!("cybersafe_buffered_texts").decrement(1.0);
    }
}

impl fmt::Debug for SensitiveText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveText({} bytes)", self.inner.len())
    }
}

impl fmt::Display for SensitiveText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted {} bytes>", self.inner.len())
    }
}

/// A captured notification, as handed over by the host
#[derive(Debug)]
pub struct Event {
    /// Opaque notification identifier
    pub id: String,

    /// Originating package or app identifier
    pub source: String,

    /// Raw notification text
    pub text: SensitiveText,

    /// When the event was captured
    pub received_at: SystemTime,
}

impl Event {
    /// Create a new event received now
    pub fn new(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: SensitiveText::new(text),
            received_at: SystemTime::now(),
        }
    }

    /// Split into the queueable metadata and the text to buffer
    pub fn into_parts(self) -> (EventTicket, SensitiveText) {
        let ticket = EventTicket {
            id: self.id,
            source: self.source,
            received_at: self.received_at,
        };
        (ticket, self.text)
    }
}

/// Non-sensitive event metadata that travels through the inference queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTicket {
    pub id: String,
    pub source: String,
    pub received_at: SystemTime,
}

/// Named risk category, one per registered model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RiskCategory(String);

impl From<String> for RiskCategory {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<RiskCategory> for String {
    fn from(category: RiskCategory) -> Self {
        category.0
    }
}

impl RiskCategory {
    pub const INSULT: &'static str = "insult";
    pub const THREAT: &'static str = "threat";
    pub const BULLYING: &'static str = "bullying";

    /// Create a category from its name (normalized to lowercase)
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn insult() -> Self {
        Self::new(Self::INSULT)
    }

    pub fn threat() -> Self {
        Self::new(Self::THREAT)
    }

    pub fn bullying() -> Self {
        Self::new(Self::BULLYING)
    }

    /// The three categories shipped by default, in reporting order
    pub fn defaults() -> Vec<Self> {
        vec![Self::insult(), Self::threat(), Self::bullying()]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Score produced by one model
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub category: RiskCategory,

    /// Probability in [0, 1]
    pub score: f32,
}

impl CategoryScore {
    /// Create a score, clamped to [0, 1]. NaN maps to 0.
    pub fn new(category: RiskCategory, score: f32) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { category, score }
    }
}

/// Result of scoring one event.
///
/// Holds only numeric scores and the source identifier. This is the only
/// artifact allowed to cross the egress boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    source: String,
    scores: Vec<CategoryScore>,
    produced_at: SystemTime,
}

impl ScoreResult {
    /// Create a result produced now
    pub fn new(source: impl Into<String>, scores: Vec<CategoryScore>) -> Self {
        Self::at(source, scores, SystemTime::now())
    }

    /// Create a result with an explicit production time
    pub fn at(source: impl Into<String>, scores: Vec<CategoryScore>, produced_at: SystemTime) -> Self {
        Self {
            source: source.into(),
            scores,
            produced_at,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Scores in registration order
    pub fn scores(&self) -> &[CategoryScore] {
        &self.scores
    }

    pub fn produced_at(&self) -> SystemTime {
        self.produced_at
    }

    /// Score for a category, if a model for it is registered
    pub fn score(&self, category: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|s| s.category.as_str() == category)
            .map(|s| s.score)
    }

    pub fn insult_score(&self) -> Option<f32> {
        self.score(RiskCategory::INSULT)
    }

    pub fn threat_score(&self) -> Option<f32> {
        self.score(RiskCategory::THREAT)
    }

    pub fn bullying_score(&self) -> Option<f32> {
        self.score(RiskCategory::BULLYING)
    }

    /// Severity derived from the scores
    pub fn severity(&self) -> Severity {
        Severity::from_probabilities(
            self.insult_score().unwrap_or(0.0),
            self.threat_score().unwrap_or(0.0),
            self.bullying_score().unwrap_or(0.0),
        )
    }
}

/// Coarse risk level derived from model probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const HIGH_THRESHOLD: f32 = 0.7;
    pub const MEDIUM_THRESHOLD: f32 = 0.4;

    /// Threats are weighted higher than the other categories
    pub const THREAT_WEIGHT: f32 = 1.2;

    pub fn from_probabilities(insult: f32, threat: f32, bullying: f32) -> Self {
        let max = insult.max(threat * Self::THREAT_WEIGHT).max(bullying);

        if max >= Self::HIGH_THRESHOLD {
            Self::High
        } else if max >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_text_never_formats_content() {
        let text = SensitiveText::new("you are terrible");
        assert_eq!(format!("{:?}", text), "SensitiveText(16 bytes)");
        assert!(!format!("{}", text).contains("terrible"));
        assert_eq!(text.expose(), "you are terrible");
    }

    #[test]
    fn test_sensitive_text_blank() {
        assert!(SensitiveText::new("").is_blank());
        assert!(SensitiveText::new("  \n\t").is_blank());
        assert!(!SensitiveText::new(" hi ").is_blank());
    }

    #[test]
    fn test_event_into_parts() {
        let event = Event::new("e1", "com.example.chat", "hello");
        let received_at = event.received_at;
        let (ticket, text) = event.into_parts();

        assert_eq!(ticket.id, "e1");
        assert_eq!(ticket.source, "com.example.chat");
        assert_eq!(ticket.received_at, received_at);
        assert_eq!(text.expose(), "hello");
    }

    #[test]
    fn test_risk_category_normalized() {
        assert_eq!(RiskCategory::new(" Threat "), RiskCategory::threat());
        assert_eq!(RiskCategory::defaults().len(), 3);
    }

    #[test]
    fn test_category_score_clamped() {
        assert_eq!(CategoryScore::new(RiskCategory::insult(), 1.7).score, 1.0);
        assert_eq!(CategoryScore::new(RiskCategory::insult(), -0.2).score, 0.0);
        assert_eq!(CategoryScore::new(RiskCategory::insult(), f32::NAN).score, 0.0);
    }

    #[test]
    fn test_score_result_accessors() {
        let result = ScoreResult::new(
            "pkgA",
            vec![
                CategoryScore::new(RiskCategory::insult(), 0.8),
                CategoryScore::new(RiskCategory::threat(), 0.1),
                CategoryScore::new(RiskCategory::bullying(), 0.05),
            ],
        );

        assert_eq!(result.source(), "pkgA");
        assert_eq!(result.insult_score(), Some(0.8));
        assert_eq!(result.threat_score(), Some(0.1));
        assert_eq!(result.bullying_score(), Some(0.05));
        assert_eq!(result.score("spam"), None);
        assert_eq!(result.severity(), Severity::High);
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_probabilities(0.1, 0.1, 0.1), Severity::Low);
        assert_eq!(Severity::from_probabilities(0.45, 0.0, 0.0), Severity::Medium);
        assert_eq!(Severity::from_probabilities(0.0, 0.0, 0.7), Severity::High);
        // 0.6 * 1.2 = 0.72
        assert_eq!(Severity::from_probabilities(0.0, 0.6, 0.0), Severity::High);
    }
}
