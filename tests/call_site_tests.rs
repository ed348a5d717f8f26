use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use binary_log_packer::{
    all_entries, find_entry, log_packed, register_component, set_record_handler, Component, Level,
    LogEntryMeta, LogRecord, LogValue, RecordHandler, Severity, MAX_LOG_BUFFER_SIZE,
};

static SERVICE: Component = Component::new("call_site_tests::service", Level::Debug);
static QUIET: Component = Component::new("call_site_tests::quiet", Level::None);

struct Captured {
    entry_id: usize,
    name: &'static str,
    payload: Vec<u8>,
}

static RECORDS: Mutex<Vec<Captured>> = Mutex::new(Vec::new());

struct Collector;

impl RecordHandler for Collector {
    fn handle_record(&self, entry: &LogEntryMeta, payload: &[u8]) {
        if entry.name() == "handler panics" {
            panic!("handler failure");
        }
        RECORDS.lock().unwrap().push(Captured {
            entry_id: entry.id(),
            name: entry.name(),
            payload: payload.to_vec(),
        });
    }
}

// Tests share one process-wide handler and tell their records apart by
// statement name.
fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        register_component(&SERVICE);
        register_component(&QUIET);
        set_record_handler(Collector);
    });
}

fn records_named(name: &str) -> Vec<(usize, Vec<u8>)> {
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.name == name)
        .map(|r| (r.entry_id, r.payload.clone()))
        .collect()
}

#[test]
fn test_record_reaches_handler() {
    setup();
    let peer = "10.1.2.3";
    let port = 8080u16;
    log_packed!(SERVICE, Level::Basic, "accepted", peer, port);

    let records = records_named("accepted");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1, b"\x08\x00\x00\x0010.1.2.3\x90\x1f");
}

#[test]
fn test_entry_is_built_once_per_call_site() {
    setup();
    for i in 0..3u32 {
        log_packed!(SERVICE, Level::Detail, "loop iteration", i);
    }

    let records = records_named("loop iteration");
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|(id, _)| *id == records[0].0));
    assert_eq!(
        all_entries()
            .iter()
            .filter(|e| e.name() == "loop iteration")
            .count(),
        1
    );
    let payloads: Vec<_> = records.iter().map(|(_, p)| p.clone()).collect();
    assert_eq!(payloads, [vec![0, 0, 0, 0], vec![1, 0, 0, 0], vec![2, 0, 0, 0]]);
}

#[test]
fn test_entry_metadata() {
    setup();
    let tags = vec!["a".to_string(), "b".to_string()];
    let limit = Some(3i8);
    log_packed!(SERVICE, Level::Basic, severity = Severity::Warning, "metadata", tags, limit);

    let (id, _) = records_named("metadata")[0].clone();
    let entry = find_entry(id).unwrap();
    assert_eq!(entry.component().name(), "call_site_tests::service");
    assert_eq!(entry.severity(), Severity::Warning);
    assert_eq!(entry.arg_count(), 2);
    assert!(entry.file().ends_with("call_site_tests.rs"));
    assert!(entry.module().contains("call_site_tests"));
    assert!(entry.line() > 0);

    let params: Vec<_> = entry.types().iter().map(|t| t.param_name).collect();
    assert_eq!(params, ["tags", "value", "limit", "ptr"]);
    assert_eq!(entry.types()[0].total_sub_entries, 1);
    assert!(entry.types()[1].is_text);
}

#[test]
fn test_filtered_statement_evaluates_nothing() {
    setup();
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn expensive() -> u64 {
        CALLS.fetch_add(1, Ordering::Relaxed);
        42
    }

    log_packed!(QUIET, Level::Basic, "never emitted", expensive());
    log_packed!(SERVICE, Level::Trace, "never emitted", expensive());

    assert_eq!(CALLS.load(Ordering::Relaxed), 0);
    assert!(records_named("never emitted").is_empty());
    assert!(all_entries().iter().all(|e| e.name() != "never emitted"));
}

#[test]
fn test_level_change_takes_effect() {
    static TOGGLED: Component = Component::new("call_site_tests::toggled", Level::None);
    setup();
    register_component(&TOGGLED);

    log_packed!(TOGGLED, Level::Basic, "toggled");
    assert!(records_named("toggled").is_empty());

    TOGGLED.set_level(Level::Basic);
    log_packed!(TOGGLED, Level::Basic, "toggled");
    let records = records_named("toggled");
    assert_eq!(records.len(), 1);
    assert!(records[0].1.is_empty());
}

#[test]
fn test_oversized_record_is_delivered_truncated() {
    setup();
    let page = vec![1u64; 512];
    log_packed!(
        SERVICE, Level::Basic, "oversized",
        page, page, page, page, page, page, page, page,
        page, page, page, page, page, page, page, page
    );

    let (id, payload) = records_named("oversized")[0].clone();
    assert_eq!(payload.len(), 15 * 4100);
    assert!(payload.len() <= MAX_LOG_BUFFER_SIZE);

    let record = LogRecord::decode(find_entry(id).unwrap(), &payload).unwrap();
    assert_eq!(record.args.len(), 15);
    assert_eq!(
        record.args[0].value,
        LogValue::List(vec![LogValue::UInt(1); 512])
    );
}

#[test]
fn test_panicking_handler_is_contained() {
    setup();
    log_packed!(SERVICE, Level::Basic, "handler panics", 1u8);
    log_packed!(SERVICE, Level::Basic, "after panic", 2u8);
    assert_eq!(records_named("after panic").len(), 1);
}
