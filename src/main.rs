use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use binary_log_packer::{
    all_components, all_entries, log_packed, register_component, set_record_handler, Component,
    Level, LevelDirectives, LogEntryMeta, LogRecord, RecordHandler, Severity, WideStr, PACKER,
};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

static SCHEDULER: Component = Component::new("scheduler", Level::Detail);
static STORAGE: Component = Component::with_default_level("storage");

#[derive(Default)]
struct SinkStats {
    records: AtomicUsize,
    bytes: AtomicUsize,
}

/// Decodes each record and re-emits it as a `tracing` event.
struct TracingSink {
    stats: Arc<SinkStats>,
}

impl RecordHandler for TracingSink {
    fn handle_record(&self, entry: &LogEntryMeta, payload: &[u8]) {
        self.stats.records.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(payload.len(), Ordering::Relaxed);

        match LogRecord::decode(entry, payload) {
            Ok(record) => tracing::info!(
                component = entry.component().name(),
                severity = %entry.severity(),
                bytes = payload.len(),
                "{}",
                record.format()
            ),
            Err(err) => tracing::warn!(entry = entry.name(), %err, "undecodable record"),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .init();

    register_component(&SCHEDULER);
    register_component(&STORAGE);

    if let Some(directives) = LevelDirectives::from_env()? {
        directives.apply();
    }
    for component in all_components() {
        tracing::debug!(component = component.name(), level = %component.level(), "component level");
    }

    let stats = Arc::new(SinkStats::default());
    set_record_handler(TracingSink {
        stats: Arc::clone(&stats),
    });

    let job = "compaction";
    let workers = 4u16;
    log_packed!(SCHEDULER, Level::Basic, "job started", job, workers);

    let shards: BTreeMap<u32, &str> = [(1, "a-f"), (2, "g-p"), (3, "q-z")].into_iter().collect();
    let idle: HashSet<u8> = [7].into_iter().collect();
    log_packed!(SCHEDULER, Level::Detail, "shard layout", shards, idle);

    let last_error: Option<i64> = None;
    let ratio = 0.75f64;
    log_packed!(STORAGE, Level::Basic, severity = Severity::Warning, "segment sealed", ratio, last_error);

    let label: Vec<u16> = "résumé".encode_utf16().collect();
    log_packed!(STORAGE, Level::Basic, "wide label", WideStr(&label));

    let oversized = vec![[0u64; 512]; 20];
    log_packed!(STORAGE, Level::Basic, "oversized", oversized.len(), oversized);

    // Filtered unless raised through LOG_PACKER_LEVELS, e.g. `storage=trace,log_packer=basic`.
    log_packed!(STORAGE, Level::Trace, "page cache", vec![1u32, 2, 3]);
    log_packed!(PACKER, Level::Basic, "demo finished");

    tracing::info!(
        records = stats.records.load(Ordering::Relaxed),
        bytes = stats.bytes.load(Ordering::Relaxed),
        call_sites = all_entries().len(),
        "done"
    );
    Ok(())
}
