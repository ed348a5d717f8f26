use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::component::Component;
use crate::config::{PackLimits, MAX_LOG_BUFFER_SIZE};
use crate::level::Severity;
use crate::loggable::DynLoggable;
use crate::packer::pack_args;
use crate::type_info::TypeInfo;

/// Receiver for packed records.
///
/// Implementations decide what happens to a record once it is packed:
/// appending it to a file, a ring buffer, a socket. The payload slice is only
/// valid for the duration of the call.
///
/// # Usage
///
/// ```
/// # use binary_log_packer::{LogEntryMeta, RecordHandler};
/// # use std::sync::atomic::{AtomicUsize, Ordering};
/// struct ByteCounter(AtomicUsize);
///
/// impl RecordHandler for ByteCounter {
///     fn handle_record(&self, _entry: &LogEntryMeta, payload: &[u8]) {
///         self.0.fetch_add(payload.len(), Ordering::Relaxed);
///     }
/// }
/// ```
pub trait RecordHandler: Send + Sync {
    /// Processes one packed record.
    ///
    /// `entry` describes the call site and carries the type table needed to
    /// decode `payload`.
    fn handle_record(&self, entry: &LogEntryMeta, payload: &[u8]);
}

lazy_static! {
    static ref HANDLER: RwLock<Option<Arc<dyn RecordHandler>>> = RwLock::new(None);

    /// Every call site that has executed at least once, in first-use order.
    static ref ENTRIES: RwLock<Vec<&'static LogEntryMeta>> = RwLock::new(Vec::new());
}

static NEXT_ENTRY_ID: AtomicUsize = AtomicUsize::new(1);

/// Installs the process-wide record handler and returns the previous one.
///
/// Without a handler packed records are discarded.
pub fn set_record_handler(handler: impl RecordHandler + 'static) -> Option<Arc<dyn RecordHandler>> {
    tracing::debug!("installing log record handler");
    HANDLER.write().replace(Arc::new(handler))
}

/// Removes the process-wide record handler.
pub fn clear_record_handler() -> Option<Arc<dyn RecordHandler>> {
    HANDLER.write().take()
}

/// Returns every call-site entry created so far.
pub fn all_entries() -> Vec<&'static LogEntryMeta> {
    ENTRIES.read().clone()
}

pub fn find_entry(id: usize) -> Option<&'static LogEntryMeta> {
    ENTRIES.read().iter().copied().find(|entry| entry.id == id)
}

/// Metadata for one log statement, created the first time it runs.
///
/// The `types` table lists a descriptor for every argument, flattened with
/// the descriptors of nested values (see [`TypeInfo`]). Top-level
/// descriptors carry the argument expressions as parameter names.
#[derive(Debug)]
pub struct LogEntryMeta {
    id: usize,
    component: &'static Component,
    name: &'static str,
    file: &'static str,
    module: &'static str,
    line: u32,
    severity: Severity,
    arg_count: usize,
    types: Vec<TypeInfo>,
}

impl LogEntryMeta {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn component(&self) -> &'static Component {
        self.component
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Number of top-level arguments.
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }
}

/// Static description of a log statement, declared by [`log_packed!`].
///
/// The entry is memoized on first use, so the type table is built once per
/// call site no matter how often the statement runs.
#[derive(Debug)]
pub struct CallSite {
    name: &'static str,
    file: &'static str,
    module: &'static str,
    line: u32,
    params: &'static [&'static str],
    severity: Severity,
    entry: OnceLock<LogEntryMeta>,
}

impl CallSite {
    pub const fn new(
        name: &'static str,
        file: &'static str,
        module: &'static str,
        line: u32,
        params: &'static [&'static str],
        severity: Severity,
    ) -> Self {
        Self {
            name,
            file,
            module,
            line,
            params,
            severity,
            entry: OnceLock::new(),
        }
    }

    /// The entry of this call site, if it has run.
    pub fn get(&self) -> Option<&LogEntryMeta> {
        self.entry.get()
    }

    /// Returns the entry, building and registering it on first use.
    pub fn entry(
        &'static self,
        component: &'static Component,
        args: &[&dyn DynLoggable],
    ) -> &'static LogEntryMeta {
        if let Some(entry) = self.entry.get() {
            return entry;
        }

        let mut created = false;
        let entry = self.entry.get_or_init(|| {
            created = true;
            self.build_entry(component, args)
        });

        if created {
            ENTRIES.write().push(entry);
            tracing::debug!(
                id = entry.id,
                name = entry.name,
                component = component.name(),
                file = entry.file,
                line = entry.line,
                descriptors = entry.types.len(),
                "registered log call site"
            );
        }
        entry
    }

    fn build_entry(&self, component: &'static Component, args: &[&dyn DynLoggable]) -> LogEntryMeta {
        let mut types = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            let param = self.params.get(index).copied().unwrap_or_default();
            arg.describe_as(param, &mut types);
        }

        LogEntryMeta {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            component,
            name: self.name,
            file: self.file,
            module: self.module,
            line: self.line,
            severity: self.severity,
            arg_count: args.len(),
            types,
        }
    }
}

/// Packs one record for `site` and hands it to the installed handler.
///
/// Never fails and never blocks on anything but the handler: arguments that
/// do not fit are dropped and the shorter record is delivered. A panicking
/// handler is contained and reported through `tracing`.
///
/// Callers normally go through [`log_packed!`], which also checks the
/// component level first.
pub fn output<const N: usize>(
    site: &'static CallSite,
    component: &'static Component,
    args: [&dyn DynLoggable; N],
) {
    let entry = site.entry(component, &args);

    if N == 0 {
        dispatch(entry, &[]);
        return;
    }

    let mut buffer = [0u8; MAX_LOG_BUFFER_SIZE];
    let outcome = pack_args(args, &PackLimits::DEFAULT, &mut buffer);
    dispatch(entry, &buffer[..outcome.len]);
}

fn dispatch(entry: &LogEntryMeta, payload: &[u8]) {
    let handler = HANDLER.read().clone();
    let Some(handler) = handler else {
        return;
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle_record(entry, payload)));
    if result.is_err() {
        tracing::error!(entry = entry.name, "log record handler panicked");
    }
}

/// Logs a packed record when the component's level allows it.
///
/// The component level is checked first; when it filters the statement out
/// nothing else is evaluated, not even the arguments. Otherwise a static
/// [`CallSite`] is declared for this statement and the arguments are packed
/// by [`output`].
///
/// # Arguments
///
/// * `component` - a `static` [`Component`]
/// * `level` - the [`Level`](crate::Level) of the statement
/// * `severity = ...` - optional [`Severity`], `Info` when omitted
/// * `name` - a string literal naming the statement
/// * `args...` - zero or more [`Loggable`](crate::Loggable) expressions
///
/// # Examples
///
/// ```
/// # use binary_log_packer::{log_packed, register_component, Component, Level, Severity};
/// static NET: Component = Component::new("doc::macro", Level::Detail);
/// register_component(&NET);
///
/// let peer = "10.0.0.7";
/// let retries = 3u8;
/// log_packed!(NET, Level::Basic, "connect", peer, retries);
/// log_packed!(NET, Level::Detail, severity = Severity::Warning, "slow peer", peer);
/// log_packed!(NET, Level::Trace, "filtered out", vec![1u32, 2, 3]);
/// ```
#[macro_export]
macro_rules! log_packed {
    ($component:expr, $level:expr, severity = $severity:expr, $name:literal $(, $arg:expr)* $(,)?) => {{
        let component: &'static $crate::Component = &$component;
        if component.is_logging($level) {
            static SITE: $crate::CallSite = $crate::CallSite::new(
                $name,
                file!(),
                module_path!(),
                line!(),
                &[$(stringify!($arg)),*],
                $severity,
            );
            $crate::output(&SITE, component, [$(&$arg as &dyn $crate::DynLoggable),*]);
        }
    }};
    ($component:expr, $level:expr, $name:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_packed!($component, $level, severity = $crate::Severity::Info, $name $(, $arg)*)
    };
}
