//! Dropped profiling sample counter.

use tracelens_core::{
    AnalysisConfig, Detector, Finding, FindingStatus, Narrative, SystemMetadataTable,
};

use super::indeterminate;

const TITLE: &str = "Perf Samples Skipped Analysis";

/// Report the skipped-sample counter from system metadata.
///
/// An absent key is a normal case: the finding notes the absence without
/// claiming that nothing was skipped.
pub fn evaluate(metadata: &SystemMetadataTable, config: &AnalysisConfig) -> Vec<Finding> {
    let key = config.skipped_samples_key.as_str();

    let missing = metadata.missing_columns(&["name"]);
    if !metadata.is_empty() && !missing.is_empty() {
        return vec![indeterminate(Detector::MissingSamples, TITLE, metadata.name(), &missing)];
    }

    let finding = match metadata.lookup(key) {
        None => Finding::new(
            Detector::MissingSamples,
            FindingStatus::NoData,
            TITLE,
            format!(
                "No explicit \"{}\" metadata found. This doesn't guarantee no samples were skipped, but the specific counter is absent.",
                key
            ),
        ),
        Some(_) => match metadata.int_value(key) {
            Some(skipped) if skipped > 0 => Finding::new(
                Detector::MissingSamples,
                FindingStatus::Flagged,
                TITLE,
                format!("The trace reported {} skipped perf samples.", skipped),
            )
            .with_metric("skipped_samples", skipped as f64)
            .with_narrative(Narrative::new(
                "Some CPU profiling data is missing from the capture.",
                "CPU-bound analysis may be incomplete; sampled hot paths can be under-represented.",
                "Re-capture with a lower sampling frequency or larger buffers if CPU attribution matters.",
            )),
            Some(skipped) => Finding::new(
                Detector::MissingSamples,
                FindingStatus::Clear,
                TITLE,
                format!("The \"{}\" counter is present and reports {} skipped perf samples.", key, skipped),
            )
            .with_metric("skipped_samples", skipped as f64),
            None => Finding::new(
                Detector::MissingSamples,
                FindingStatus::Indeterminate,
                TITLE,
                format!("The \"{}\" key is present but carries no numeric value.", key),
            ),
        },
    };

    vec![finding]
}
