//! End-to-end runs of the aggregator over small hand-built table sets.

use tracelens_core::{
    AnalysisConfig, ConfigError, Detector, FindingStatus, LongTaskTable, MetadataEntry,
    SchedSlice, SchedSliceTable, SystemMetadataTable, TableSet, ThreadCpuState,
    ThreadCpuStateTable,
};
use tracelens_rules::{detect_anomalies, Aggregator, AnomalyReport};

const APP: &str = "com.google.android.youtube";
const MAIN: &str = "com.google.android.youtube:main";

fn make_slice(process: &str, thread: &str, cpu: u32, ts: i64, dur: i64) -> SchedSlice {
    SchedSlice {
        thread_name: thread.to_string(),
        process_name: process.to_string(),
        cpu,
        ts,
        dur,
        utid: 1,
        end_state: None,
    }
}

fn findings_for(report: &AnomalyReport, detector: Detector) -> Vec<&tracelens_core::Finding> {
    report
        .findings
        .iter()
        .filter(|f| f.detector == detector)
        .collect()
}

fn busy_tables() -> TableSet {
    let mut sched = Vec::new();
    for i in 0..150 {
        sched.push(make_slice(APP, "Binder:123_4", 5, i * 2_000_000, 1_000_000));
    }
    sched.push(make_slice(APP, MAIN, 1, 400_000_000, 30_000_000));
    sched.push(make_slice(APP, MAIN, 6, 450_000_000, 70_000_000));
    sched.push(make_slice("surfaceflinger", "sf", 7, 10_000_000, 8_000_000));

    TableSet {
        system_info: SystemMetadataTable::from_rows(vec![MetadataEntry {
            name: "perf_samples_skipped".to_string(),
            str_value: None,
            int_value: Some(12),
        }]),
        sched: SchedSliceTable::from_rows(sched),
        long_tasks: LongTaskTable::empty(),
        thread_cpu_states: ThreadCpuStateTable::from_rows(vec![ThreadCpuState {
            thread_name: "ExoPlayer:Playb".to_string(),
            total_running_ns: 8_000_000,
            total_runnable_ns: 4_000_000,
            ..ThreadCpuState::default()
        }]),
        ..TableSet::default()
    }
}

// ── Scenarios ───────────────────────────────────────────────

#[test]
fn scenario_a_contended_thread_flagged() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let ratio = findings_for(&report, Detector::RunnableRatio);
    assert_eq!(ratio.len(), 1);
    assert!(ratio[0].is_flagged());
    assert!(ratio[0].full_text().contains("33.33%"));
}

#[test]
fn scenario_b_binder_short_runs_flagged() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let short = findings_for(&report, Detector::ShortRunBursts);
    assert_eq!(short.len(), 1);
    assert!(short[0].is_flagged());
    assert!(short[0].summary.contains("Binder:123_4"));
    assert_eq!(short[0].metric("short_run_count"), Some(150.0));
}

#[test]
fn scenario_c_little_core_share() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let placement = findings_for(&report, Detector::CorePlacement);
    assert_eq!(placement.len(), 1);
    let text = placement[0].full_text();
    assert!(text.contains("30.00%"), "{}", text);
    assert!(text.contains("30.00 ms out of 100.00 ms"), "{}", text);
    assert!(text.contains("assumption"));
}

#[test]
fn scenario_d_no_long_tasks_echoes_threshold() {
    let config = AnalysisConfig {
        long_task_threshold_ms: 20,
        ..AnalysisConfig::default()
    };
    let report = detect_anomalies(&busy_tables(), &config).unwrap();
    let long = findings_for(&report, Detector::LongTasks);
    assert_eq!(long[0].status, FindingStatus::NoData);
    assert_eq!(
        long[0].summary,
        format!("No long tasks (>20ms) recorded for {}.", MAIN)
    );
}

#[test]
fn scenario_e_absent_skip_counter() {
    let tables = TableSet {
        system_info: SystemMetadataTable::empty(),
        ..busy_tables()
    };
    let report = detect_anomalies(&tables, &AnalysisConfig::default()).unwrap();
    let missing = findings_for(&report, Detector::MissingSamples);
    assert_eq!(missing[0].status, FindingStatus::NoData);
    assert!(missing[0].summary.contains("counter is absent"));
}

#[test]
fn skipped_samples_reported() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let missing = findings_for(&report, Detector::MissingSamples);
    assert!(missing[0].is_flagged());
    assert!(missing[0].summary.contains("12 skipped perf samples"));
}

// ── Run-level properties ────────────────────────────────────

#[test]
fn repeated_runs_serialize_identically() {
    let tables = busy_tables();
    let aggregator = Aggregator::new(AnalysisConfig::default()).unwrap();
    let first = serde_json::to_string(&aggregator.run(&tables)).unwrap();
    let second = serde_json::to_string(&aggregator.run(&tables)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parallel_run_matches_sequential() {
    let tables = busy_tables();
    let aggregator = Aggregator::new(AnalysisConfig::default()).unwrap();
    assert_eq!(aggregator.run(&tables), aggregator.run_parallel(&tables));
}

#[test]
fn findings_follow_detector_order() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let order: Vec<Detector> = report.findings.iter().map(|f| f.detector).collect();
    let mut sorted = order.clone();
    sorted.sort_by_key(|d| *d as u8);
    assert_eq!(order, sorted);
    assert_eq!(order.last(), Some(&Detector::CpuHotSpots));
}

#[test]
fn empty_input_gives_documented_no_data_findings() {
    let report = detect_anomalies(&TableSet::default(), &AnalysisConfig::default()).unwrap();
    assert_eq!(report.findings.len(), 6);
    for finding in &report.findings {
        assert_eq!(finding.status, FindingStatus::NoData, "{}", finding.detector);
    }
    let again = detect_anomalies(&TableSet::default(), &AnalysisConfig::default()).unwrap();
    assert_eq!(report, again);
}

#[test]
fn overlapping_cores_fail_the_run() {
    let config = AnalysisConfig {
        little_cores: vec![0, 1, 2, 3, 4],
        ..AnalysisConfig::default()
    };
    let err = detect_anomalies(&busy_tables(), &config).unwrap_err();
    assert_eq!(err, ConfigError::OverlappingCores { cores: vec![4] });
}

#[test]
fn report_json_shape() {
    let report = detect_anomalies(&busy_tables(), &AnalysisConfig::default()).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["title"], "Performance Anomalies Report");
    assert_eq!(value["findings"][0]["detector"], "missing_samples");
    assert_eq!(value["findings"][0]["status"], "flagged");
}
