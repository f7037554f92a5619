//! Structured anomaly findings. Text rendering is left to the consumer.

use serde::{Deserialize, Serialize};

/// The analysis that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    MissingSamples,
    LongTasks,
    RunnableRatio,
    CorePlacement,
    ShortRunBursts,
    CpuHotSpots,
}

impl std::fmt::Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detector::MissingSamples => write!(f, "missing_samples"),
            Detector::LongTasks => write!(f, "long_tasks"),
            Detector::RunnableRatio => write!(f, "runnable_ratio"),
            Detector::CorePlacement => write!(f, "core_placement"),
            Detector::CpuHotSpots => write!(f, "cpu_hot_spots"),
            Detector::ShortRunBursts => write!(f, "short_run_bursts"),
        }
    }
}

/// Outcome class of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// An anomaly was detected.
    Flagged,
    /// Data was present and nothing crossed a threshold.
    Clear,
    /// Informational summary with no pass/fail judgement.
    Summary,
    /// Input table was empty or the looked-up key was absent.
    NoData,
    /// Required columns were missing, so the result cannot be computed.
    Indeterminate,
}

/// Fixed hypothesis / impact / next-step text attached to a flagged finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub hypothesis: String,
    pub impact: String,
    pub next_step: String,
}

impl Narrative {
    pub fn new(hypothesis: &str, impact: &str, next_step: &str) -> Self {
        Self {
            hypothesis: hypothesis.to_string(),
            impact: impact.to_string(),
            next_step: next_step.to_string(),
        }
    }
}

/// One per-item line of a finding, e.g. a thread and its metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Thread, process, or core the line is about.
    pub subject: Option<String>,
    pub text: String,
    /// Metric name → value, in insertion order.
    pub metrics: Vec<(String, f64)>,
}

impl Observation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            subject: None,
            text: text.into(),
            metrics: Vec::new(),
        }
    }

    pub fn about(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            text: text.into(),
            metrics: Vec::new(),
        }
    }

    pub fn metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.push((name.to_string(), value));
        self
    }
}

/// One structured anomaly-report entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub detector: Detector,
    pub status: FindingStatus,
    /// Section title.
    pub title: String,
    /// Headline sentence.
    pub summary: String,
    pub observations: Vec<Observation>,
    pub narrative: Option<Narrative>,
    /// Assumptions and limits the reader must know about.
    pub caveats: Vec<String>,
    /// Headline metrics, in insertion order.
    pub metrics: Vec<(String, f64)>,
}

impl Finding {
    pub fn new(
        detector: Detector,
        status: FindingStatus,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            detector,
            status,
            title: title.into(),
            summary: summary.into(),
            observations: Vec::new(),
            narrative: None,
            caveats: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn with_observation(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    pub fn with_observations(mut self, observations: impl IntoIterator<Item = Observation>) -> Self {
        self.observations.extend(observations);
        self
    }

    pub fn with_narrative(mut self, narrative: Narrative) -> Self {
        self.narrative = Some(narrative);
        self
    }

    pub fn with_caveat(mut self, caveat: impl Into<String>) -> Self {
        self.caveats.push(caveat.into());
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.push((name.to_string(), value));
        self
    }

    pub fn is_flagged(&self) -> bool {
        self.status == FindingStatus::Flagged
    }

    /// Headline metric by name.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    /// Every text fragment of the finding joined by newlines.
    pub fn full_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.summary.as_str()];
        parts.extend(self.observations.iter().map(|o| o.text.as_str()));
        if let Some(n) = &self.narrative {
            parts.extend([n.hypothesis.as_str(), n.impact.as_str(), n.next_step.as_str()]);
        }
        parts.extend(self.caveats.iter().map(String::as_str));
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_parts_in_order() {
        let finding = Finding::new(Detector::LongTasks, FindingStatus::Flagged, "Title", "Summary")
            .with_observation(Observation::new("first"))
            .with_observation(Observation::about("RenderThread", "second").metric("ms", 2.5))
            .with_caveat("caveat")
            .with_metric("count", 3.0);

        assert!(finding.is_flagged());
        assert_eq!(finding.observations.len(), 2);
        assert_eq!(finding.observations[1].subject.as_deref(), Some("RenderThread"));
        assert_eq!(finding.metric("count"), Some(3.0));
        assert_eq!(finding.metric("missing"), None);
        assert_eq!(finding.full_text(), "Title\nSummary\nfirst\nsecond\ncaveat");
    }

    #[test]
    fn serializes_with_snake_case_tags() {
        let finding = Finding::new(Detector::CpuHotSpots, FindingStatus::NoData, "t", "s");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["detector"], "cpu_hot_spots");
        assert_eq!(json["status"], "no_data");
        assert!(json["narrative"].is_null());
    }

    #[test]
    fn detector_display_matches_serde_name() {
        let json = serde_json::to_value(Detector::ShortRunBursts).unwrap();
        assert_eq!(json, Detector::ShortRunBursts.to_string());
    }
}
