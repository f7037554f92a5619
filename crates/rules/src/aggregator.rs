//! Runs every detector in report order and wraps the findings in a report.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use tracelens_core::{AnalysisConfig, ConfigError, Finding, TableSet};

use crate::detectors::{Rule, RULES};

pub const REPORT_TITLE: &str = "Performance Anomalies Report";

pub const REPORT_PREAMBLE: &str =
    "This report highlights potential performance anomalies identified from the trace data.";

/// Ordered findings of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub title: String,
    pub preamble: String,
    pub findings: Vec<Finding>,
}

impl AnomalyReport {
    fn new(findings: Vec<Finding>) -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            preamble: REPORT_PREAMBLE.to_string(),
            findings,
        }
    }

    pub fn flagged(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_flagged())
    }
}

/// Holds a validated config. Construction is the only place a run can fail.
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: AnalysisConfig,
}

impl Aggregator {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        config.log_summary();
        Ok(Self { config })
    }

    /// Evaluate the detectors one after another.
    pub fn run(&self, tables: &TableSet) -> AnomalyReport {
        let start = Instant::now();
        let findings: Vec<Finding> = RULES
            .iter()
            .flat_map(|rule| self.evaluate_rule(*rule, tables))
            .collect();
        self.finish(findings, start)
    }

    /// Evaluate the detectors on the rayon pool. Output order matches [`Self::run`].
    pub fn run_parallel(&self, tables: &TableSet) -> AnomalyReport {
        let start = Instant::now();
        let per_rule: Vec<Vec<Finding>> = RULES
            .par_iter()
            .map(|rule| self.evaluate_rule(*rule, tables))
            .collect();
        self.finish(per_rule.into_iter().flatten().collect(), start)
    }

    fn evaluate_rule(&self, rule: &dyn Rule, tables: &TableSet) -> Vec<Finding> {
        let start = Instant::now();
        let findings = rule.evaluate(tables, &self.config);
        debug!(
            detector = %rule.detector(),
            findings = findings.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "detector finished"
        );
        findings
    }

    fn finish(&self, findings: Vec<Finding>, start: Instant) -> AnomalyReport {
        let report = AnomalyReport::new(findings);
        info!(
            findings = report.findings.len(),
            flagged = report.flagged().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "anomaly detection complete"
        );
        report
    }
}

/// One-shot convenience: validate `config`, then run every detector.
pub fn detect_anomalies(
    tables: &TableSet,
    config: &AnalysisConfig,
) -> Result<AnomalyReport, ConfigError> {
    Ok(Aggregator::new(config.clone())?.run(tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::{Detector, FindingStatus};

    #[test]
    fn empty_tables_yield_one_finding_per_detector() {
        let report = detect_anomalies(&TableSet::default(), &AnalysisConfig::default()).unwrap();
        assert_eq!(report.title, REPORT_TITLE);
        let detectors: Vec<Detector> = report.findings.iter().map(|f| f.detector).collect();
        assert_eq!(
            detectors,
            vec![
                Detector::MissingSamples,
                Detector::LongTasks,
                Detector::RunnableRatio,
                Detector::CorePlacement,
                Detector::ShortRunBursts,
                Detector::CpuHotSpots,
            ]
        );
        assert!(report
            .findings
            .iter()
            .all(|f| f.status == FindingStatus::NoData));
    }

    #[test]
    fn invalid_config_rejected_before_running() {
        let config = AnalysisConfig {
            little_cores: vec![0, 1],
            big_cores: vec![1, 2],
            ..AnalysisConfig::default()
        };
        let err = Aggregator::new(config).unwrap_err();
        assert_eq!(err, ConfigError::OverlappingCores { cores: vec![1] });
    }

    #[test]
    fn oversized_spike_threshold_rejected_before_running() {
        let config = AnalysisConfig {
            cpu_spike_process_threshold_ms: 9_300_000_000_000,
            ..AnalysisConfig::default()
        };
        let err = detect_anomalies(&TableSet::default(), &config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidThreshold { name: "cpu_spike_process_threshold_ms", .. }
        ));
    }

    #[test]
    fn parallel_matches_sequential_on_empty_input() {
        let aggregator = Aggregator::new(AnalysisConfig::default()).unwrap();
        let tables = TableSet::default();
        assert_eq!(aggregator.run(&tables), aggregator.run_parallel(&tables));
    }
}
