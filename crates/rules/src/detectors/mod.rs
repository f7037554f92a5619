//! Rule evaluators.
//!
//! Each detector is a stateless function from one or more metric tables and
//! the analysis config to a list of findings. Detectors never read each
//! other's output, so they can run in any order or in parallel.
//!
//! Sub-modules:
//! - [`missing_samples`] — dropped profiling sample counter
//! - [`long_tasks`] — slices longer than the frame budget on the main thread
//! - [`runnable_ratio`] — threads waiting on CPU for a large share of active time
//! - [`core_placement`] — critical threads scheduled on LITTLE cores
//! - [`short_runs`] — bursts of very short scheduling slices
//! - [`hot_spots`] — per-process CPU totals, trace duration, windowed spikes

pub mod core_placement;
pub mod hot_spots;
pub mod long_tasks;
pub mod missing_samples;
pub mod runnable_ratio;
pub mod short_runs;

use tracelens_core::{AnalysisConfig, Detector, Finding, FindingStatus, TableSet};

/// A single analysis over the run's tables.
pub trait Rule: Send + Sync {
    fn detector(&self) -> Detector;

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding>;
}

pub struct MissingSamples;
pub struct LongTasks;
pub struct RunnableRatio;
pub struct CorePlacement;
pub struct CpuHotSpots;
pub struct ShortRunBursts;

impl Rule for MissingSamples {
    fn detector(&self) -> Detector {
        Detector::MissingSamples
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        missing_samples::evaluate(&tables.system_info, config)
    }
}

impl Rule for LongTasks {
    fn detector(&self) -> Detector {
        Detector::LongTasks
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        long_tasks::evaluate(&tables.long_tasks, config)
    }
}

impl Rule for RunnableRatio {
    fn detector(&self) -> Detector {
        Detector::RunnableRatio
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        runnable_ratio::evaluate(&tables.thread_cpu_states, config)
    }
}

impl Rule for CorePlacement {
    fn detector(&self) -> Detector {
        Detector::CorePlacement
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        core_placement::evaluate(&tables.sched, &tables.system_info, config)
    }
}

impl Rule for CpuHotSpots {
    fn detector(&self) -> Detector {
        Detector::CpuHotSpots
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        hot_spots::evaluate(&tables.sched, config)
    }
}

impl Rule for ShortRunBursts {
    fn detector(&self) -> Detector {
        Detector::ShortRunBursts
    }

    fn evaluate(&self, tables: &TableSet, config: &AnalysisConfig) -> Vec<Finding> {
        short_runs::evaluate(&tables.sched, &tables.thread_states, config)
    }
}

/// Every rule in report order.
pub const RULES: [&dyn Rule; 6] = [
    &MissingSamples,
    &LongTasks,
    &RunnableRatio,
    &CorePlacement,
    &ShortRunBursts,
    &CpuHotSpots,
];

// ── Shared helpers ──────────────────────────────────────────────────

/// Finding for a table that lacks columns a computation needs.
pub(crate) fn indeterminate(
    detector: Detector,
    title: &str,
    table: &str,
    missing: &[&str],
) -> Finding {
    tracing::warn!(%detector, table, ?missing, "table lacks required columns");
    Finding::new(
        detector,
        FindingStatus::Indeterminate,
        title,
        format!(
            "Could not evaluate: table '{}' is missing required column(s) {}.",
            table,
            missing.join(", ")
        ),
    )
}

/// Threshold-style millisecond rendering: `5` for whole values, `2.50` otherwise.
pub(crate) fn format_ms_threshold(ns: i64) -> String {
    if ns % 1_000_000 == 0 {
        format!("{}", ns / 1_000_000)
    } else {
        format!("{:.2}", tracelens_core::ns_to_ms(ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_run_in_report_order() {
        let order: Vec<Detector> = RULES.iter().map(|r| r.detector()).collect();
        assert_eq!(
            order,
            vec![
                Detector::MissingSamples,
                Detector::LongTasks,
                Detector::RunnableRatio,
                Detector::CorePlacement,
                Detector::ShortRunBursts,
                Detector::CpuHotSpots,
            ]
        );
    }

    #[test]
    fn threshold_formatting() {
        assert_eq!(format_ms_threshold(5_000_000), "5");
        assert_eq!(format_ms_threshold(2_500_000), "2.50");
    }

    #[test]
    fn indeterminate_names_missing_columns() {
        let finding = indeterminate(Detector::CpuHotSpots, "T", "sched_slice", &["ts", "dur"]);
        assert_eq!(finding.status, FindingStatus::Indeterminate);
        assert!(finding.summary.contains("ts, dur"));
    }
}
