//! CPU hot-spot summary.
//!
//! Per-process CPU totals, the trace duration estimate, the target process's
//! own total and a fixed-window spike scan. Always a `Summary` finding unless
//! the table is empty or unusable.

use std::collections::{BTreeMap, HashMap};

use tracelens_core::{
    ms_to_ns, ns_to_ms, AnalysisConfig, Detector, Finding, FindingStatus, Observation, SchedSliceTable,
};

use super::indeterminate;

const TITLE: &str = "CPU Spikes Analysis";

const REQUIRED: &[&str] = &["process_name", "dur"];

/// `max(ts) + dur(row with max ts) - min(ts)`; first row wins among equal `ts`.
pub fn trace_duration_ns(sched: &SchedSliceTable) -> Option<i64> {
    if sched.is_empty() || !sched.has_columns(&["ts", "dur"]) {
        return None;
    }
    let min_ts = sched.iter().map(|s| s.ts).min()?;
    let last = sched
        .iter()
        .reduce(|best, s| if s.ts > best.ts { s } else { best })?;
    Some(last.ts + last.dur - min_ts)
}

/// Total scheduled time per process, largest first, ties by name.
pub fn process_totals(sched: &SchedSliceTable) -> Vec<(String, i64)> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for slice in sched.iter() {
        *totals.entry(slice.process_name.as_str()).or_default() += slice.dur;
    }
    let mut ranked: Vec<(String, i64)> = totals
        .into_iter()
        .map(|(name, dur)| (name.to_string(), dur))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

// ── Windowed spikes ─────────────────────────────────────────────────

/// One (window, process) pair whose CPU time exceeded the spike threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeWindow {
    pub process: String,
    pub window_start_ns: i64,
    pub cpu_ns: i64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpikeScan {
    /// Spike windows per process, most first, ties by name.
    pub per_process: Vec<(String, usize)>,
    pub worst: Option<SpikeWindow>,
}

/// Split `[start, start + duration)` into fixed windows and flag every
/// (window, process) pair whose summed overlap is strictly above the threshold.
pub fn scan_spikes(
    sched: &SchedSliceTable,
    start: i64,
    duration: i64,
    window_ns: i64,
    threshold_ns: i64,
) -> SpikeScan {
    if duration <= 0 || window_ns <= 0 {
        return SpikeScan::default();
    }
    let end = start + duration;

    let mut usage: HashMap<(i64, &str), i64> = HashMap::new();
    for slice in sched.iter() {
        let from = slice.ts.max(start);
        let to = slice.end().min(end);
        if to <= from {
            continue;
        }
        let mut window = (from - start) / window_ns;
        loop {
            let w_start = start + window * window_ns;
            let w_end = w_start.saturating_add(window_ns);
            let overlap = to.min(w_end) - from.max(w_start);
            if overlap > 0 {
                *usage
                    .entry((window, slice.process_name.as_str()))
                    .or_default() += overlap;
            }
            if w_end >= to {
                break;
            }
            window += 1;
        }
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut worst: Option<(i64, i64, &str)> = None;
    for (&(window, process), &cpu_ns) in usage.iter().filter(|(_, ns)| **ns > threshold_ns) {
        *counts.entry(process).or_default() += 1;
        // Highest usage, then earliest window, then name.
        let better = match worst {
            None => true,
            Some((w_ns, w_idx, w_proc)) => {
                cpu_ns > w_ns
                    || (cpu_ns == w_ns && (window, process) < (w_idx, w_proc))
            }
        };
        if better {
            worst = Some((cpu_ns, window, process));
        }
    }

    let mut per_process: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, n)| (name.to_string(), n))
        .collect();
    per_process.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    SpikeScan {
        per_process,
        worst: worst.map(|(cpu_ns, window, process)| SpikeWindow {
            process: process.to_string(),
            window_start_ns: start + window * window_ns,
            cpu_ns,
        }),
    }
}

pub fn evaluate(sched: &SchedSliceTable, config: &AnalysisConfig) -> Vec<Finding> {
    if sched.is_empty() {
        return vec![Finding::new(
            Detector::CpuHotSpots,
            FindingStatus::NoData,
            TITLE,
            "CPU scheduling data is empty. Cannot analyze CPU spikes.",
        )];
    }

    let missing = sched.missing_columns(REQUIRED);
    if !missing.is_empty() {
        return vec![indeterminate(Detector::CpuHotSpots, TITLE, sched.name(), &missing)];
    }

    let target = config.target_process.as_str();
    let totals = process_totals(sched);
    let duration = trace_duration_ns(sched);

    let summary = match duration {
        Some(ns) => format!(
            "Overall trace duration considered for CPU usage: {:.2} ms.",
            ns_to_ms(ns)
        ),
        None => "Could not determine total trace duration from sched_slice data (missing 'ts' or 'dur' columns, or data is empty).".to_string(),
    };

    let mut finding = Finding::new(Detector::CpuHotSpots, FindingStatus::Summary, TITLE, summary);
    if let Some(ns) = duration {
        finding = finding.with_metric("trace_duration_ms", ns_to_ms(ns));
    }

    finding = finding.with_observation(Observation::new(format!(
        "Top {} CPU consuming processes (total duration):",
        config.top_process_count
    )));
    for (process, dur) in totals.iter().take(config.top_process_count) {
        let ms = ns_to_ms(*dur);
        finding = finding.with_observation(
            Observation::about(process.as_str(), format!("{}: {:.2} ms", process, ms))
                .metric("cpu_ms", ms),
        );
    }

    let target_total = totals.iter().find(|(p, _)| p == target).map(|(_, d)| *d);
    let target_line = match target_total {
        None => format!(
            "'{}' process not found in sched_slice data.",
            target
        ),
        Some(ns) if ns <= 0 => format!(
            "'{}' process was scheduled but had no CPU time in sched_slice data.",
            target
        ),
        Some(ns) => format!(
            "'{}' consumed {:.2} ms of CPU time in total.",
            target,
            ns_to_ms(ns)
        ),
    };
    let target_ms = target_total.map(ns_to_ms).unwrap_or(0.0);
    finding = finding
        .with_metric("target_total_ms", target_ms)
        .with_observation(Observation::about(target, target_line).metric("cpu_ms", target_ms));

    let spike_ns = ms_to_ns(config.cpu_spike_window_ms)
        .zip(ms_to_ns(config.cpu_spike_process_threshold_ms));
    match (duration, sched.iter().map(|s| s.ts).min(), spike_ns) {
        (Some(_), Some(_), None) => {
            finding = finding.with_caveat(
                "Windowed spike detection skipped: the spike window or threshold is out of range.",
            );
        }
        (Some(ns), Some(start), Some((window_ns, threshold_ns))) => {
            let scan = scan_spikes(sched, start, ns, window_ns, threshold_ns);
            tracing::debug!(
                processes = scan.per_process.len(),
                window_ms = config.cpu_spike_window_ms,
                "spike scan complete"
            );
            finding = finding.with_metric(
                "spike_windows",
                scan.per_process.iter().map(|(_, n)| *n).sum::<usize>() as f64,
            );
            if scan.per_process.is_empty() {
                finding = finding.with_observation(Observation::new(format!(
                    "No process used more than {} ms of CPU within any {} ms window.",
                    config.cpu_spike_process_threshold_ms, config.cpu_spike_window_ms
                )));
            } else {
                for (process, count) in &scan.per_process {
                    finding = finding.with_observation(
                        Observation::about(
                            process.as_str(),
                            format!(
                                "{}: {} window(s) of {} ms with more than {} ms of CPU time.",
                                process,
                                count,
                                config.cpu_spike_window_ms,
                                config.cpu_spike_process_threshold_ms
                            ),
                        )
                        .metric("spike_windows", *count as f64),
                    );
                }
            }
            if let Some(worst) = scan.worst {
                let offset_ms = ns_to_ms(worst.window_start_ns - start);
                let cpu_ms = ns_to_ms(worst.cpu_ns);
                finding = finding.with_observation(
                    Observation::about(
                        worst.process.as_str(),
                        format!(
                            "Worst window: {} used {:.2} ms of CPU in the window starting {:.2} ms into the trace.",
                            worst.process, cpu_ms, offset_ms
                        ),
                    )
                    .metric("cpu_ms", cpu_ms)
                    .metric("window_offset_ms", offset_ms),
                );
            }
        }
        _ => {
            finding = finding.with_caveat(
                "Windowed spike detection skipped: the trace duration is indeterminate.",
            );
        }
    }

    vec![finding]
}
