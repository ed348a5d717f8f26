use std::collections::BTreeMap;
use std::fmt;
use std::sync::Once;

use binary_log_packer::{
    log_packed, pack_args, register_component, set_record_handler, Component, DynLoggable, Level,
    LogEntryMeta, PackLimits, RecordHandler, MAX_LOG_BUFFER_SIZE,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use log::{info, LevelFilter};
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use tempfile::tempdir;

static BENCH: Component = Component::new("pack_bench", Level::Basic);
static INIT: Once = Once::new();

struct Event {
    id: i32,
    active: bool,
    data: [u8; 16],
    large_number: u64,
    description: String,
    tags: Vec<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[id={}, active={}, data={:?}, large_number={}, desc={}, tags={:?}]",
            self.id, self.active, self.data, self.large_number, self.description, self.tags
        )
    }
}

fn event() -> Event {
    Event {
        id: 42,
        active: true,
        data: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        large_number: u64::MAX,
        description: "A longer description with some metrics: CPU 95%, Memory 2.5GB, Network 1.2Gbps"
            .to_string(),
        tags: vec!["ingest".to_string(), "hot".to_string(), "eu-west".to_string()],
    }
}

// Discards records so only packing is measured.
struct NullHandler;

impl RecordHandler for NullHandler {
    fn handle_record(&self, _entry: &LogEntryMeta, payload: &[u8]) {
        black_box(payload);
    }
}

fn setup(log_file: &str) {
    INIT.call_once(|| {
        register_component(&BENCH);
        set_record_handler(NullHandler);

        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} - {m}{n}")))
            .build(log_file)
            .unwrap();
        let config = Config::builder()
            .appender(Appender::builder().build("logfile", Box::new(logfile)))
            .build(Root::builder().appender("logfile").build(LevelFilter::Info))
            .unwrap();
        log4rs::init_config(config).unwrap();
    });
}

fn bench_pack_args(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_args");
    let e = event();
    let mut out = vec![0u8; MAX_LOG_BUFFER_SIZE];

    group.bench_function("fixed", |b| {
        b.iter(|| {
            pack_args(
                [&e.id, &e.active, &e.data, &e.large_number],
                &PackLimits::DEFAULT,
                black_box(&mut out),
            )
        })
    });

    group.bench_function("two_pass", |b| {
        b.iter(|| {
            pack_args(
                [&e.id as &dyn DynLoggable, &e.description, &e.tags, &e.data],
                &PackLimits::DEFAULT,
                black_box(&mut out),
            )
        })
    });

    let map: BTreeMap<u32, String> = (0..64).map(|i| (i, format!("value-{i}"))).collect();
    group.bench_function("map_64", |b| {
        b.iter(|| pack_args([&map], &PackLimits::DEFAULT, black_box(&mut out)))
    });

    group.finish();
}

fn bench_logging_comparison(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let log_file = dir.path().join("text.log");
    setup(log_file.to_str().unwrap());

    let mut group = c.benchmark_group("logging_comparison");
    let e = event();

    group.bench_function("log_packed", |b| {
        b.iter(|| {
            log_packed!(
                BENCH, Level::Basic, "event",
                e.id, e.active, e.data, e.large_number, e.description, e.tags
            )
        })
    });

    group.bench_function("log_packed_filtered", |b| {
        b.iter(|| log_packed!(BENCH, Level::Trace, "filtered", e.id, e.description))
    });

    group.bench_function("log4rs_text", |b| b.iter(|| info!("event: {}", e)));

    group.finish();
}

criterion_group!(benches, bench_pack_args, bench_logging_comparison);
criterion_main!(benches);
