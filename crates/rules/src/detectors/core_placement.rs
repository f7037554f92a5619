//! Core placement of critical threads.
//!
//! Classifies every scheduling slice of the target process as LITTLE, BIG, or
//! UNKNOWN by core id and reports how much critical-thread CPU time landed on
//! LITTLE cores. The partition is configuration, not measured fact, unless
//! derived from per-core max-frequency metadata; the finding always says which.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use tracelens_core::{
    ns_to_ms, AnalysisConfig, CorePartitionSource, Detector, Finding, FindingStatus, Narrative,
    Observation, SchedSliceTable, SystemMetadataTable,
};

use super::indeterminate;

const TITLE: &str = "Thread CPU Core Placement Analysis";

const REQUIRED: &[&str] = &["process_name", "thread_name", "cpu", "dur"];

static MAX_FREQ_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)cpu([0-9]+)_max_freq_khz").expect("static pattern"));

/// Power/performance class of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CoreType {
    Little,
    Big,
    Unknown,
}

/// How a [`CorePartition`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionBasis {
    /// Configured core sets.
    Assumed,
    /// Derived from `cpuN_max_freq_khz` metadata.
    Metadata,
    /// Metadata derivation was requested but not possible.
    AssumedFallback,
}

/// LITTLE / BIG core id sets used to classify slices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorePartition {
    pub little: BTreeSet<u32>,
    pub big: BTreeSet<u32>,
    pub basis: PartitionBasis,
}

impl CorePartition {
    pub fn assumed(config: &AnalysisConfig) -> Self {
        Self {
            little: config.little_cores.iter().copied().collect(),
            big: config.big_cores.iter().copied().collect(),
            basis: PartitionBasis::Assumed,
        }
    }

    /// Cores at the lowest observed max frequency are LITTLE, the rest BIG.
    ///
    /// Needs at least two distinct frequencies; otherwise returns `None`.
    pub fn from_max_frequencies(freqs: &BTreeMap<u32, i64>) -> Option<Self> {
        let distinct: BTreeSet<i64> = freqs.values().copied().collect();
        if distinct.len() < 2 {
            return None;
        }
        let lowest = *distinct.iter().next()?;
        let mut little = BTreeSet::new();
        let mut big = BTreeSet::new();
        for (&cpu, &freq) in freqs {
            if freq == lowest {
                little.insert(cpu);
            } else {
                big.insert(cpu);
            }
        }
        Some(Self {
            little,
            big,
            basis: PartitionBasis::Metadata,
        })
    }

    /// Resolve the partition the config asks for.
    pub fn resolve(config: &AnalysisConfig, metadata: &SystemMetadataTable) -> Self {
        match config.core_partition {
            CorePartitionSource::Assumed => Self::assumed(config),
            CorePartitionSource::Metadata => {
                match Self::from_max_frequencies(&max_frequencies(metadata)) {
                    Some(p) => p,
                    None => Self {
                        basis: PartitionBasis::AssumedFallback,
                        ..Self::assumed(config)
                    },
                }
            }
        }
    }

    pub fn classify(&self, cpu: u32) -> CoreType {
        if self.little.contains(&cpu) {
            CoreType::Little
        } else if self.big.contains(&cpu) {
            CoreType::Big
        } else {
            CoreType::Unknown
        }
    }

    /// Disclosure line for the finding.
    pub fn describe(&self) -> String {
        let little: Vec<u32> = self.little.iter().copied().collect();
        let big: Vec<u32> = self.big.iter().copied().collect();
        match self.basis {
            PartitionBasis::Assumed => format!(
                "Assuming LITTLE cores: {:?}, BIG cores: {:?} for this analysis. This partition is an assumption and should be verified with device specs or detailed trace metadata.",
                little, big
            ),
            PartitionBasis::Metadata => format!(
                "LITTLE cores {:?} and BIG cores {:?} were derived from per-core max-frequency metadata (lowest max frequency = LITTLE).",
                little, big
            ),
            PartitionBasis::AssumedFallback => format!(
                "Per-core max-frequency metadata was insufficient to derive a partition; falling back to assumed LITTLE cores: {:?}, BIG cores: {:?}. This partition is an assumption.",
                little, big
            ),
        }
    }
}

/// `cpuN_max_freq_khz` metadata entries keyed by core id.
pub fn max_frequencies(metadata: &SystemMetadataTable) -> BTreeMap<u32, i64> {
    let mut freqs = BTreeMap::new();
    for entry in metadata.iter() {
        let Some(caps) = MAX_FREQ_KEY.captures(&entry.name) else {
            continue;
        };
        let Some(cpu) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
            continue;
        };
        let freq = entry.int_value.or_else(|| {
            entry
                .str_value
                .as_deref()
                .and_then(|s| s.trim().parse().ok())
        });
        if let Some(freq) = freq {
            freqs.entry(cpu).or_insert(freq);
        }
    }
    freqs
}

#[derive(Default)]
struct CoreTotals {
    little: i64,
    big: i64,
    unknown: i64,
}

impl CoreTotals {
    fn add(&mut self, core: CoreType, dur: i64) {
        match core {
            CoreType::Little => self.little += dur,
            CoreType::Big => self.big += dur,
            CoreType::Unknown => self.unknown += dur,
        }
    }

    fn total(&self) -> i64 {
        self.little + self.big + self.unknown
    }
}

/// Percentage of `part` in `total`, 0 when `total` is 0, clamped to `[0, 100]`.
pub fn little_core_percentage(little_ns: i64, total_ns: i64) -> f64 {
    if total_ns <= 0 {
        return 0.0;
    }
    (little_ns as f64 / total_ns as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn evaluate(
    sched: &SchedSliceTable,
    metadata: &SystemMetadataTable,
    config: &AnalysisConfig,
) -> Vec<Finding> {
    let partition = CorePartition::resolve(config, metadata);
    let disclosure = partition.describe();
    let freqs = max_frequencies(metadata);

    let freq_observation = (!freqs.is_empty()).then(|| {
        let listing: Vec<String> = freqs
            .iter()
            .map(|(cpu, khz)| format!("cpu{}={}kHz", cpu, khz))
            .collect();
        Observation::new(format!("Per-core max frequency metadata: {}.", listing.join(", ")))
    });

    let target = config.target_process.as_str();

    if !sched.is_empty() {
        let missing = sched.missing_columns(REQUIRED);
        if !missing.is_empty() {
            return vec![
                indeterminate(Detector::CorePlacement, TITLE, sched.name(), &missing)
                    .with_caveat(disclosure),
            ];
        }
    }

    let target_rows: Vec<_> = sched.iter().filter(|s| s.process_name == target).collect();
    if target_rows.is_empty() {
        return vec![Finding::new(
            Detector::CorePlacement,
            FindingStatus::NoData,
            TITLE,
            format!(
                "No CPU scheduling slices found for '{}'. Cannot analyze core placement.",
                target
            ),
        )
        .with_caveat(disclosure)];
    }

    // Per critical thread, in configured order.
    let mut per_thread: Vec<(&str, CoreTotals)> = config
        .critical_thread_names
        .iter()
        .map(|n| (n.as_str(), CoreTotals::default()))
        .collect();
    let mut critical_rows = 0usize;

    for slice in &target_rows {
        let Some(idx) = per_thread
            .iter()
            .position(|(name, _)| *name == slice.thread_name)
        else {
            continue;
        };
        critical_rows += 1;
        per_thread[idx]
            .1
            .add(partition.classify(slice.cpu), slice.dur.max(0));
    }

    if critical_rows == 0 {
        return vec![Finding::new(
            Detector::CorePlacement,
            FindingStatus::NoData,
            TITLE,
            format!(
                "No scheduling data found for critical {} threads ({}).",
                target,
                config.critical_thread_names.join(", ")
            ),
        )
        .with_caveat(disclosure)];
    }

    let little_ns: i64 = per_thread.iter().map(|(_, t)| t.little).sum();
    let total_ns: i64 = per_thread.iter().map(|(_, t)| t.total()).sum();
    let unknown_ns: i64 = per_thread.iter().map(|(_, t)| t.unknown).sum();
    let percentage = little_core_percentage(little_ns, total_ns);

    let status = if little_ns > 0 {
        FindingStatus::Flagged
    } else {
        FindingStatus::Clear
    };

    let mut finding = Finding::new(
        Detector::CorePlacement,
        status,
        TITLE,
        format!(
            "Critical {} threads spent {:.2}% of their CPU time on LITTLE cores ({:.2} ms out of {:.2} ms).",
            target,
            percentage,
            ns_to_ms(little_ns),
            ns_to_ms(total_ns)
        ),
    )
    .with_metric("percentage_on_little", percentage)
    .with_metric("little_ms", ns_to_ms(little_ns))
    .with_metric("total_critical_ms", ns_to_ms(total_ns))
    .with_caveat(disclosure);

    if let Some((_, main)) = per_thread
        .iter()
        .find(|(name, _)| *name == config.main_thread)
    {
        if main.little > 0 {
            finding = finding.with_observation(
                Observation::about(
                    config.main_thread.as_str(),
                    format!(
                        "Specifically, '{}' ran on LITTLE cores for {:.2} ms.",
                        config.main_thread,
                        ns_to_ms(main.little)
                    ),
                )
                .metric("little_ms", ns_to_ms(main.little)),
            );
        }
    }

    for (name, totals) in per_thread.iter().filter(|(_, t)| t.total() > 0) {
        finding = finding.with_observation(
            Observation::about(
                *name,
                format!(
                    "{}: LITTLE {:.2} ms, BIG {:.2} ms, unclassified {:.2} ms.",
                    name,
                    ns_to_ms(totals.little),
                    ns_to_ms(totals.big),
                    ns_to_ms(totals.unknown)
                ),
            )
            .metric("little_ms", ns_to_ms(totals.little))
            .metric("big_ms", ns_to_ms(totals.big))
            .metric("unknown_ms", ns_to_ms(totals.unknown)),
        );
    }

    if unknown_ns > 0 {
        finding = finding.with_caveat(format!(
            "{:.2} ms ran on cores in neither the LITTLE nor the BIG set and counts toward the total only.",
            ns_to_ms(unknown_ns)
        ));
    }

    if let Some(obs) = freq_observation {
        finding = finding.with_observation(obs);
    }

    if status == FindingStatus::Flagged {
        finding = finding.with_narrative(Narrative::new(
            "Critical threads running on LITTLE cores can lead to slower frame production.",
            "Work on low-power cores takes longer, especially harmful when BIG cores were available.",
            "Check scheduler hints (uclamp, cpusets, thread priority) for the affected threads.",
        ));
    }

    vec![finding]
}
