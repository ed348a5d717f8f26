//! # Binary Log Packer
//!
//! Packs structured log arguments into a compact binary record instead of
//! formatting text on the hot path:
//!
//! * **Cheap when filtered**: a disabled statement costs one atomic load
//! * **Bounded records**: every record fits in 64 KiB, whatever is logged
//! * **Self-describing call sites**: each statement gets a type table once,
//!   enough to decode its records later
//!
//! ## Key Features
//!
//! * Scalars, strings, C and wide strings, fixed and growable sequences,
//!   sets, maps, optionals, smart pointers and pairs, nested arbitrarily
//! * A fixed-size fast path that skips measuring when every argument has a
//!   compile-time size
//! * Safe truncation: arguments that would overflow the record are dropped
//!   whole, from the first one that does not fit
//! * Per-component level gates, adjustable at runtime or through
//!   `LOG_PACKER_LEVELS`
//!
//! ## Main Components
//!
//! * [`Component`]: a named subsystem with an atomically adjustable level
//! * [`Loggable`]: how a Rust type describes and encodes itself
//! * [`pack_args`]: the packer, usable on its own with a caller buffer
//! * [`log_packed!`]: declares a call site and hands packed records to the
//!   installed [`RecordHandler`]
//! * [`LogRecord`]: decodes a record back into values
//!
//! ## Quick Start
//!
//! ```
//! use binary_log_packer::{
//!     log_packed, register_component, set_record_handler, Component, Level, LogEntryMeta,
//!     LogRecord, RecordHandler,
//! };
//!
//! static STORAGE: Component = Component::new("storage", Level::Detail);
//!
//! struct Printer;
//! impl RecordHandler for Printer {
//!     fn handle_record(&self, entry: &LogEntryMeta, payload: &[u8]) {
//!         if let Ok(record) = LogRecord::decode(entry, payload) {
//!             println!("{}", record.format());
//!         }
//!     }
//! }
//!
//! register_component(&STORAGE);
//! set_record_handler(Printer);
//!
//! let path = "/var/db/segment-7";
//! let offsets = vec![0u64, 4096, 8192];
//! log_packed!(STORAGE, Level::Basic, "segment flushed", path, offsets);
//! ```

pub mod call_site;
pub mod component;
pub mod config;
pub mod decoder;
pub mod error;
pub mod level;
pub mod loggable;
pub mod packer;
pub mod type_info;

pub use call_site::{
    all_entries, clear_record_handler, find_entry, output, set_record_handler, CallSite,
    LogEntryMeta, RecordHandler,
};
pub use component::{all_components, find_component, register_component, Component, PACKER};
pub use config::{
    LevelDirectives, PackLimits, LEVELS_ENV_VAR, MAX_LOG_ARRAY_ENTRIES, MAX_LOG_BUFFER_SIZE,
    MAX_LOG_STRING_LENGTH,
};
pub use decoder::{decode_payload, DecodedArg, LogRecord, LogValue};
pub use error::{ConfigError, DecodeError};
pub use level::{Level, Severity};
pub use loggable::{
    DynLoggable, Elements, Encodable, Entries, LogStr, Loggable, NullableCStr, Scalar, WideStr,
};
pub use packer::{encoded_size, pack_args, ArgSlot, PackOutcome, Packer, SIZE_COUNT};
pub use type_info::{TypeInfo, TypeKind};
