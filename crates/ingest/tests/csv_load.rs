//! Loading a directory of extractor CSV files.

use std::fs;
use std::path::Path;

use tracelens_core::{TraceLensError, ThreadCpuState};
use tracelens_ingest::{load_table, load_tables, InputPaths};

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn loads_full_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "system_info.csv",
        "name,str_value,int_value\nperf_samples_skipped,,3\nandroid_build_fingerprint,google/raven/raven,\n",
    );
    write(
        dir.path(),
        "cpu_sched.csv",
        "thread_name,process_name,cpu,ts,dur,utid,end_state\n\
         RenderThread,com.google.android.youtube,2,1000,500,11,S\n\
         sf,surfaceflinger,6,1200,300,20,R\n",
    );
    write(
        dir.path(),
        "long_tasks.csv",
        "slice_name,thread_name,process_name,ts,dur,utid,upid\n\
         Choreographer#doFrame,com.google.android.youtube:main,com.google.android.youtube,5000,20000000,10,3\n",
    );
    write(
        dir.path(),
        "youtube_thread_states.csv",
        "thread_name,total_running_ns,total_runnable_ns,total_sleeping_ns,total_interruptible_sleep_ns,total_uninterruptible_sleep_ns,total_stopped_ns,total_parked_ns\n\
         ExoPlayer:Playb,8000000,4000000,0,0,0,0,0\n",
    );
    write(
        dir.path(),
        "thread_states.csv",
        "utid,thread_name,process_name,ts,dur,state,blocked_function\n\
         11,RenderThread,com.google.android.youtube,1500,100,S,\n\
         11,RenderThread,com.google.android.youtube,1600,100,D,futex_wait_queue\n",
    );

    let tables = load_tables(&InputPaths::in_dir(dir.path())).unwrap();

    assert_eq!(tables.system_info.int_value("perf_samples_skipped"), Some(3));
    assert_eq!(tables.sched.len(), 2);
    assert_eq!(tables.sched.rows()[1].cpu, 6);
    assert_eq!(tables.long_tasks.rows()[0].dur, 20_000_000);
    assert_eq!(tables.thread_cpu_states.rows()[0].total_runnable_ns, 4_000_000);
    assert_eq!(tables.thread_states.rows()[0].blocked_function, None);
    assert_eq!(
        tables.thread_states.rows()[1].blocked_function.as_deref(),
        Some("futex_wait_queue")
    );
}

#[test]
fn missing_files_become_empty_tables() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "long_tasks.csv", "");

    let tables = load_tables(&InputPaths::in_dir(dir.path())).unwrap();

    assert!(tables.system_info.is_empty());
    assert!(tables.sched.is_empty());
    assert!(tables.long_tasks.is_empty());
    assert!(tables.sched.has_columns(&["ts", "dur"]));
}

#[test]
fn missing_column_recorded() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "states.csv", "thread_name,total_running_ns\nmain,10\n");

    let table = load_table::<ThreadCpuState>(&dir.path().join("states.csv")).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.missing_columns(&["total_runnable_ns"]), vec!["total_runnable_ns"]);
}

#[test]
fn bad_number_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "cpu_sched.csv",
        "thread_name,process_name,cpu,ts,dur,utid,end_state\nt,p,0,abc,1,1,R\n",
    );

    let err = load_tables(&InputPaths::in_dir(dir.path())).unwrap_err();
    assert!(matches!(err, TraceLensError::Schema { ref column, .. } if column == "ts"));
}
