use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TraceLensError};
use crate::table::ms_to_ns;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Defaults ──────────────────────────────────────────────────

fn default_target_process() -> String {
    "com.google.android.youtube".to_string()
}

fn default_main_thread() -> String {
    "com.google.android.youtube:main".to_string()
}

fn default_long_task_threshold_ms() -> u64 {
    16
}

fn default_high_runnable_ratio_threshold() -> f64 {
    0.20
}

fn default_short_run_threshold_ns() -> i64 {
    5_000_000
}

fn default_frequent_short_run_count_threshold() -> usize {
    100
}

fn default_little_cores() -> Vec<u32> {
    (0..4).collect()
}

fn default_big_cores() -> Vec<u32> {
    (4..8).collect()
}

fn default_critical_thread_names() -> Vec<String> {
    vec![
        default_main_thread(),
        "RenderThread".to_string(),
        "GPU completion".to_string(),
    ]
}

fn default_cpu_spike_window_ms() -> u64 {
    100
}

fn default_cpu_spike_process_threshold_ms() -> u64 {
    50
}

fn default_top_process_count() -> usize {
    5
}

fn default_skipped_samples_key() -> String {
    "perf_samples_skipped".to_string()
}

// ── Core partition source ─────────────────────────────────────

/// Where the LITTLE/BIG core partition comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorePartitionSource {
    /// Use `little_cores` / `big_cores` as given.
    #[default]
    Assumed,
    /// Derive from `cpuN_max_freq_khz` metadata, falling back to the configured sets.
    Metadata,
}

// ── Analysis config ───────────────────────────────────────────

/// Thresholds and assumptions threaded through every detector.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Process whose threads are analysed.
    #[serde(default = "default_target_process")]
    pub target_process: String,
    /// Main (UI) thread of the target process.
    #[serde(default = "default_main_thread")]
    pub main_thread: String,
    /// Threshold the extractor used for long-task slices; echoed into findings.
    #[serde(default = "default_long_task_threshold_ms")]
    pub long_task_threshold_ms: u64,
    /// Runnable / (runnable + running) ratio above which a thread is flagged.
    #[serde(default = "default_high_runnable_ratio_threshold")]
    pub high_runnable_ratio_threshold: f64,
    /// Slices shorter than this count as short runs.
    #[serde(default = "default_short_run_threshold_ns")]
    pub short_run_threshold_ns: i64,
    /// Short-run count above which a (process, thread) group is flagged.
    #[serde(default = "default_frequent_short_run_count_threshold")]
    pub frequent_short_run_count_threshold: usize,
    /// Core ids assumed to be low-power.
    #[serde(default = "default_little_cores")]
    pub little_cores: Vec<u32>,
    /// Core ids assumed to be high-performance.
    #[serde(default = "default_big_cores")]
    pub big_cores: Vec<u32>,
    #[serde(default)]
    pub core_partition: CorePartitionSource,
    /// Threads whose core placement matters for frame production.
    #[serde(default = "default_critical_thread_names")]
    pub critical_thread_names: Vec<String>,
    #[serde(default = "default_cpu_spike_window_ms")]
    pub cpu_spike_window_ms: u64,
    /// CPU time a process must exceed inside one window to count as a spike.
    #[serde(default = "default_cpu_spike_process_threshold_ms")]
    pub cpu_spike_process_threshold_ms: u64,
    #[serde(default = "default_top_process_count")]
    pub top_process_count: usize,
    /// Metadata key holding the dropped-sample counter.
    #[serde(default = "default_skipped_samples_key")]
    pub skipped_samples_key: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_process: default_target_process(),
            main_thread: default_main_thread(),
            long_task_threshold_ms: default_long_task_threshold_ms(),
            high_runnable_ratio_threshold: default_high_runnable_ratio_threshold(),
            short_run_threshold_ns: default_short_run_threshold_ns(),
            frequent_short_run_count_threshold: default_frequent_short_run_count_threshold(),
            little_cores: default_little_cores(),
            big_cores: default_big_cores(),
            core_partition: CorePartitionSource::default(),
            critical_thread_names: default_critical_thread_names(),
            cpu_spike_window_ms: default_cpu_spike_window_ms(),
            cpu_spike_process_threshold_ms: default_cpu_spike_process_threshold_ms(),
            top_process_count: default_top_process_count(),
            skipped_samples_key: default_skipped_samples_key(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, TraceLensError> {
        tracing::debug!(path = %path.display(), "loading analysis config");
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Render the config as TOML (used to print the defaults).
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject inconsistent configuration. A run never starts with an invalid config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_process.trim().is_empty() {
            return Err(ConfigError::EmptyTargetProcess);
        }

        let ratio = self.high_runnable_ratio_threshold;
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "high_runnable_ratio_threshold",
                value: ratio,
                reason: "must be strictly between 0 and 1",
            });
        }

        if self.short_run_threshold_ns <= 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "short_run_threshold_ns",
                value: self.short_run_threshold_ns as f64,
                reason: "must be positive",
            });
        }

        if self.cpu_spike_window_ms == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "cpu_spike_window_ms",
                value: 0.0,
                reason: "must be positive",
            });
        }

        for (name, ms) in [
            ("cpu_spike_window_ms", self.cpu_spike_window_ms),
            ("cpu_spike_process_threshold_ms", self.cpu_spike_process_threshold_ms),
        ] {
            if ms_to_ns(ms).is_none() {
                return Err(ConfigError::InvalidThreshold {
                    name,
                    value: ms as f64,
                    reason: "too large to express in nanoseconds",
                });
            }
        }

        if self.top_process_count == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "top_process_count",
                value: 0.0,
                reason: "must be positive",
            });
        }

        let little: BTreeSet<u32> = self.little_cores.iter().copied().collect();
        let overlap: Vec<u32> = self
            .big_cores
            .iter()
            .copied()
            .filter(|c| little.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::OverlappingCores { cores: overlap });
        }

        if self.critical_thread_names.iter().all(|n| n.trim().is_empty()) {
            return Err(ConfigError::EmptyCriticalThreads);
        }

        Ok(())
    }

    /// Print the effective thresholds for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Analysis config:");
        tracing::info!("  target:       process={}, main_thread={}", self.target_process, self.main_thread);
        tracing::info!("  long_tasks:   threshold_ms={}", self.long_task_threshold_ms);
        tracing::info!("  runnable:     ratio_threshold={}", self.high_runnable_ratio_threshold);
        tracing::info!(
            "  short_runs:   threshold_ns={}, count_threshold={}",
            self.short_run_threshold_ns,
            self.frequent_short_run_count_threshold
        );
        tracing::info!(
            "  cores:        little={:?}, big={:?}, source={:?}",
            self.little_cores,
            self.big_cores,
            self.core_partition
        );
        tracing::info!(
            "  spikes:       window_ms={}, process_threshold_ms={}",
            self.cpu_spike_window_ms,
            self.cpu_spike_process_threshold_ms
        );
    }
}
