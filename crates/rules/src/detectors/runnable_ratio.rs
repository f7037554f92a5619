//! CPU contention via runnable ratio.
//!
//! ratio = runnable / (runnable + running). A thread with no active time has
//! no ratio at all and is never flagged.

use tracelens_core::{
    ns_to_ms, AnalysisConfig, Detector, Finding, FindingStatus, Narrative, Observation,
    ThreadCpuState, ThreadCpuStateTable,
};

use super::indeterminate;

const TITLE: &str = "High Runnable Time Analysis";

const REQUIRED: &[&str] = &["thread_name", "total_running_ns", "total_runnable_ns"];

/// Fraction of active time spent runnable, or `None` when the thread was never active.
pub fn runnable_ratio(row: &ThreadCpuState) -> Option<f64> {
    let active = row.active_ns();
    if active <= 0 {
        return None;
    }
    Some(row.total_runnable_ns as f64 / active as f64)
}

/// One finding per thread whose ratio is strictly above the threshold, in input order.
pub fn evaluate(states: &ThreadCpuStateTable, config: &AnalysisConfig) -> Vec<Finding> {
    let threshold = config.high_runnable_ratio_threshold;

    if states.is_empty() {
        return vec![Finding::new(
            Detector::RunnableRatio,
            FindingStatus::NoData,
            TITLE,
            format!(
                "{} thread CPU/state data is empty. Cannot analyze runnable times.",
                config.target_process
            ),
        )];
    }

    let missing = states.missing_columns(REQUIRED);
    if !missing.is_empty() {
        return vec![indeterminate(Detector::RunnableRatio, TITLE, states.name(), &missing)];
    }

    let mut unrated = 0usize;
    let mut findings = Vec::new();

    for row in states.iter() {
        let ratio = match runnable_ratio(row) {
            Some(r) => r,
            None => {
                unrated += 1;
                continue;
            }
        };
        if ratio <= threshold {
            continue;
        }

        let running_ms = ns_to_ms(row.total_running_ns);
        let runnable_ms = ns_to_ms(row.total_runnable_ns);
        let percent = ratio * 100.0;

        findings.push(
            Finding::new(
                Detector::RunnableRatio,
                FindingStatus::Flagged,
                TITLE,
                format!(
                    "Thread {} spent {:.2}% of its active (runnable + running) time waiting for a CPU, above the {:.2}% threshold.",
                    row.thread_name,
                    percent,
                    threshold * 100.0
                ),
            )
            .with_metric("running_ms", running_ms)
            .with_metric("runnable_ms", runnable_ms)
            .with_metric("runnable_ratio", ratio)
            .with_observations([
                Observation::about(
                    row.thread_name.as_str(),
                    format!("Total Running Time: {:.2} ms", running_ms),
                )
                .metric("running_ms", running_ms),
                Observation::about(
                    row.thread_name.as_str(),
                    format!("Total Runnable Time: {:.2} ms", runnable_ms),
                )
                .metric("runnable_ms", runnable_ms),
                Observation::about(
                    row.thread_name.as_str(),
                    format!(
                        "Runnable Ratio (Runnable / (Runnable+Running)): {:.2}%",
                        percent
                    ),
                )
                .metric("runnable_percent", percent),
            ])
            .with_narrative(Narrative::new(
                "High runnable time suggests CPU contention.",
                "Threads that wait for a CPU fall behind their deadlines, which shows up as performance bottlenecks and jank.",
                "Check which processes occupied the CPUs during these waits and whether thread priorities or affinities are appropriate.",
            )),
        );
    }

    tracing::debug!(
        threads = states.len(),
        flagged = findings.len(),
        unrated,
        "runnable ratio evaluated"
    );

    if findings.is_empty() {
        let mut clear = Finding::new(
            Detector::RunnableRatio,
            FindingStatus::Clear,
            TITLE,
            format!(
                "No {} threads found with a runnable time ratio greater than {:.2}% of their active (runnable + running) time.",
                config.target_process,
                threshold * 100.0
            ),
        )
        .with_metric("threshold", threshold);
        if unrated > 0 {
            clear = clear.with_observation(Observation::new(format!(
                "{} thread(s) had no runnable or running time and were not rated.",
                unrated
            )));
        }
        findings.push(clear);
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::ColumnSet;

    fn make_row(name: &str, running: i64, runnable: i64) -> ThreadCpuState {
        ThreadCpuState {
            thread_name: name.to_string(),
            total_running_ns: running,
            total_runnable_ns: runnable,
            ..ThreadCpuState::default()
        }
    }

    #[test]
    fn ratio_undefined_for_idle_thread() {
        assert_eq!(runnable_ratio(&make_row("idle", 0, 0)), None);
        assert_eq!(runnable_ratio(&make_row("busy", 3, 1)), Some(0.25));
    }

    #[test]
    fn table_without_runnable_column_is_indeterminate() {
        let table = ThreadCpuStateTable::with_columns(
            ColumnSet::new(["thread_name", "total_running_ns"]),
            vec![make_row("ExoPlayer:Playb", 8_000_000, 4_000_000)],
        );
        let findings = evaluate(&table, &AnalysisConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].status, FindingStatus::Indeterminate);
        assert_eq!(findings[0].title, TITLE);
        assert!(findings[0].summary.contains("'thread_cpu_states'"));
        assert!(findings[0].summary.contains("column(s) total_runnable_ns."));
    }

    #[test]
    fn contended_thread_flagged_with_percentage() {
        let table = ThreadCpuStateTable::from_rows(vec![make_row("ExoPlayer:Playb", 8_000_000, 4_000_000)]);
        let findings = evaluate(&table, &AnalysisConfig::default());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_flagged());
        assert!(findings[0].full_text().contains("33.33%"));
        assert!(findings[0].full_text().contains("Total Running Time: 8.00 ms"));
        assert!(findings[0].full_text().contains("Total Runnable Time: 4.00 ms"));
    }

    #[test]
    fn ratio_equal_to_threshold_not_flagged() {
        // 1 / (1 + 4) = 0.20 exactly
        let table = ThreadCpuStateTable::from_rows(vec![make_row("edge", 4_000_000, 1_000_000)]);
        let findings = evaluate(&table, &AnalysisConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].status, FindingStatus::Clear);
        assert!(findings[0].summary.contains("20.00%"));
    }

    #[test]
    fn idle_threads_excluded_not_cleared() {
        let table = ThreadCpuStateTable::from_rows(vec![
            make_row("idle", 0, 0),
            make_row("busy", 1_000_000, 0),
        ]);
        let findings = evaluate(&table, &AnalysisConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].status, FindingStatus::Clear);
        assert!(findings[0].full_text().contains("1 thread(s) had no runnable or running time"));
    }

    #[test]
    fn flagged_threads_keep_input_order() {
        let table = ThreadCpuStateTable::from_rows(vec![
            make_row("b-thread", 1, 9),
            make_row("ok", 9, 1),
            make_row("a-thread", 1, 1),
        ]);
        let findings = evaluate(&table, &AnalysisConfig::default());
        let subjects: Vec<_> = findings
            .iter()
            .map(|f| f.observations[0].subject.clone().unwrap())
            .collect();
        assert_eq!(subjects, vec!["b-thread", "a-thread"]);
    }

    #[test]
    fn empty_table_is_no_data() {
        let findings = evaluate(&ThreadCpuStateTable::empty(), &AnalysisConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].status, FindingStatus::NoData);
    }
}
