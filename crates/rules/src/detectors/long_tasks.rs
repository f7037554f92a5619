//! Long main-thread tasks.

use tracelens_core::{
    ns_to_ms, AnalysisConfig, Detector, Finding, FindingStatus, LongTaskTable, Narrative,
    Observation,
};

use super::indeterminate;

/// Summarise slices that exceeded the extractor's long-task threshold.
///
/// The table is expected to be pre-filtered to the main thread of the target
/// process; the threshold is only echoed back, never re-applied.
pub fn evaluate(long_tasks: &LongTaskTable, config: &AnalysisConfig) -> Vec<Finding> {
    let title = format!(
        "Long Tasks on {} - {} Analysis",
        config.target_process, config.main_thread
    );
    let threshold_ms = config.long_task_threshold_ms;

    if long_tasks.is_empty() {
        return vec![Finding::new(
            Detector::LongTasks,
            FindingStatus::NoData,
            title,
            format!(
                "No long tasks (>{}ms) recorded for {}.",
                threshold_ms, config.main_thread
            ),
        )];
    }

    let missing = long_tasks.missing_columns(&["dur"]);
    if !missing.is_empty() {
        return vec![indeterminate(Detector::LongTasks, &title, long_tasks.name(), &missing)];
    }

    let count = long_tasks.len();
    let total_ns: i128 = long_tasks.iter().map(|t| t.dur as i128).sum();
    let mean_ms = total_ns as f64 / count as f64 / 1_000_000.0;

    // First of equally long slices wins, matching extraction order.
    let longest = long_tasks
        .iter()
        .reduce(|best, t| if t.dur > best.dur { t } else { best });
    let max_ms = longest.map(|t| ns_to_ms(t.dur)).unwrap_or(0.0);

    let mut max_line = Observation::new(format!("Maximum duration observed: {:.2} ms.", max_ms))
        .metric("max_ms", max_ms);
    if let Some(t) = longest.filter(|t| !t.slice_name.is_empty()) {
        max_line.subject = Some(t.slice_name.clone());
    }

    vec![Finding::new(
        Detector::LongTasks,
        FindingStatus::Flagged,
        title,
        format!(
            "Found {} tasks longer than {}ms on {}.",
            count, threshold_ms, config.main_thread
        ),
    )
    .with_metric("count", count as f64)
    .with_metric("max_ms", max_ms)
    .with_metric("mean_ms", mean_ms)
    .with_observation(max_line)
    .with_observation(
        Observation::new(format!(
            "Average duration of these long tasks: {:.2} ms.",
            mean_ms
        ))
        .metric("mean_ms", mean_ms),
    )
    .with_narrative(Narrative::new(
        "These tasks are prime suspects for causing UI unresponsiveness or jank.",
        "Main-thread work longer than a frame budget delays input handling and frame production.",
        "Inspect the longest slices and move blocking or heavy work off the main thread.",
    ))]
}
