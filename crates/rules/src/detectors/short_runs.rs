//! Bursts of short scheduling slices.
//!
//! Many very short runs on one thread hint at I/O waits or lock contention.
//! When thread-state data is available each flagged group also reports how
//! many of its short runs were immediately followed by a sleep.

use std::collections::{BTreeMap, HashMap};

use tracelens_core::{
    AnalysisConfig, Detector, Finding, FindingStatus, Narrative, Observation, SchedSlice,
    SchedSliceTable, ThreadState, ThreadStateTable,
};

use super::{format_ms_threshold, indeterminate};

const TITLE: &str = "Frequent Short Runs Followed by Sleep Analysis (Potential I/O or Lock Contention)";

const REQUIRED: &[&str] = &["process_name", "thread_name", "dur"];

const CORRELATION_COLUMNS: &[&str] = &["utid", "ts", "dur", "state"];

const CAVEAT: &str = "This pattern only suggests I/O or lock contention; confirming it requires correlating the short runs with sleep-state data.";

/// Per-thread timeline of states, sorted by start time.
struct StateIndex<'a> {
    by_utid: HashMap<i64, Vec<&'a ThreadState>>,
}

impl<'a> StateIndex<'a> {
    fn build(states: &'a ThreadStateTable) -> Self {
        let mut by_utid: HashMap<i64, Vec<&'a ThreadState>> = HashMap::new();
        for state in states.iter() {
            by_utid.entry(state.utid).or_default().push(state);
        }
        for timeline in by_utid.values_mut() {
            timeline.sort_by_key(|s| s.ts);
        }
        Self { by_utid }
    }

    /// First state of the slice's thread starting at or after the slice end.
    fn next_after(&self, slice: &SchedSlice) -> Option<&'a ThreadState> {
        let timeline = self.by_utid.get(&slice.utid)?;
        let end = slice.end();
        let idx = timeline.partition_point(|s| s.ts < end);
        timeline.get(idx).copied()
    }
}

/// Sleep follow-up statistics for one group of short runs.
#[derive(Debug, Default, PartialEq)]
struct SleepFollowUp {
    followed_by_sleep: usize,
    top_blocked_function: Option<(String, usize)>,
}

fn sleep_follow_up(runs: &[&SchedSlice], index: &StateIndex<'_>) -> SleepFollowUp {
    let mut followed_by_sleep = 0usize;
    let mut blocked: BTreeMap<&str, usize> = BTreeMap::new();

    for run in runs {
        let Some(next) = index.next_after(run) else {
            continue;
        };
        if !next.kind().is_sleeping() {
            continue;
        }
        followed_by_sleep += 1;
        if let Some(func) = next.blocked_function.as_deref().filter(|f| !f.is_empty()) {
            *blocked.entry(func).or_default() += 1;
        }
    }

    // Highest count wins; ties go to the alphabetically first function.
    let top_blocked_function = blocked
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (func, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((func, n)),
        })
        .map(|(func, n)| (func.to_string(), n));

    SleepFollowUp {
        followed_by_sleep,
        top_blocked_function,
    }
}

pub fn evaluate(
    sched: &SchedSliceTable,
    thread_states: &ThreadStateTable,
    config: &AnalysisConfig,
) -> Vec<Finding> {
    let short_ns = config.short_run_threshold_ns;
    let count_threshold = config.frequent_short_run_count_threshold;
    let short_ms = format_ms_threshold(short_ns);

    if sched.is_empty() {
        return vec![Finding::new(
            Detector::ShortRunBursts,
            FindingStatus::NoData,
            TITLE,
            format!(
                "CPU scheduling data is empty. Cannot look for threads with more than {} short CPU runs (less than {}ms each).",
                count_threshold, short_ms
            ),
        )];
    }

    let missing = sched.missing_columns(REQUIRED);
    if !missing.is_empty() {
        return vec![indeterminate(Detector::ShortRunBursts, TITLE, sched.name(), &missing)];
    }

    let mut groups: BTreeMap<(&str, &str), Vec<&SchedSlice>> = BTreeMap::new();
    for slice in sched.iter().filter(|s| s.dur < short_ns) {
        groups
            .entry((slice.process_name.as_str(), slice.thread_name.as_str()))
            .or_default()
            .push(slice);
    }

    let correlate = !thread_states.is_empty()
        && thread_states.has_columns(CORRELATION_COLUMNS)
        && sched.has_columns(&["utid", "ts"]);
    let index = correlate.then(|| StateIndex::build(thread_states));

    let mut findings = Vec::new();
    for ((process, thread), runs) in groups
        .iter()
        .filter(|(_, runs)| runs.len() > count_threshold)
    {
        let count = runs.len();
        let subject = format!("{}/{}", process, thread);

        let mut finding = Finding::new(
            Detector::ShortRunBursts,
            FindingStatus::Flagged,
            TITLE,
            format!(
                "Process: {}, Thread: {} - Short Run Count: {} (>{} instances, each <{}ms).",
                process, thread, count, count_threshold, short_ms
            ),
        )
        .with_metric("short_run_count", count as f64);

        match &index {
            Some(index) => {
                let follow_up = sleep_follow_up(runs, index);
                let share = follow_up.followed_by_sleep as f64 / count as f64 * 100.0;
                finding = finding
                    .with_metric("followed_by_sleep", follow_up.followed_by_sleep as f64)
                    .with_observation(
                        Observation::about(
                            subject.as_str(),
                            format!(
                                "{} of {} short runs ({:.2}%) were immediately followed by a sleeping state.",
                                follow_up.followed_by_sleep, count, share
                            ),
                        )
                        .metric("followed_by_sleep", follow_up.followed_by_sleep as f64)
                        .metric("followed_by_sleep_percent", share),
                    );
                if let Some((func, n)) = follow_up.top_blocked_function {
                    finding = finding.with_observation(
                        Observation::about(
                            subject.as_str(),
                            format!("Most frequent blocked function after a short run: {} ({} times).", func, n),
                        )
                        .metric("blocked_count", n as f64),
                    );
                }
            }
            None => {
                finding = finding.with_observation(Observation::about(
                    subject.as_str(),
                    "Thread state data unavailable; could not check whether these short runs were followed by sleep.",
                ));
            }
        }

        findings.push(
            finding
                .with_narrative(Narrative::new(
                    "Frequent short CPU runs *might* indicate I/O waits or lock contention if followed by sleep states.",
                    "Threads that repeatedly wake, run briefly and block add scheduling overhead and latency.",
                    "Deeper analysis is needed to confirm if these short runs are consistently followed by sleep states indicative of I/O or lock waits.",
                ))
                .with_caveat(CAVEAT),
        );
    }

    tracing::debug!(
        groups = groups.len(),
        flagged = findings.len(),
        correlated = correlate,
        "short runs evaluated"
    );

    if findings.is_empty() {
        findings.push(Finding::new(
            Detector::ShortRunBursts,
            FindingStatus::Clear,
            TITLE,
            format!(
                "No threads found with more than {} short CPU runs (less than {}ms each).",
                count_threshold, short_ms
            ),
        ));
    }

    findings
}
