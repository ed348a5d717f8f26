//! Packing limits and runtime level configuration.
//!
//! The limits bound every record: strings and containers are cut to their
//! caps before their size is computed, and a whole record never exceeds
//! [`MAX_LOG_BUFFER_SIZE`]. Data past a cap is dropped silently.
//!
//! Component levels can be set from a directive string using the same shape
//! as `tracing-subscriber`'s `EnvFilter`: a comma separated list of
//! `component=level` pairs, plus an optional bare `level` applied to every
//! component first.
//!
//! ```
//! # use binary_log_packer::{Level, LevelDirectives};
//! let directives: LevelDirectives = "basic,net=trace".parse().unwrap();
//! assert_eq!(directives.level_for("net"), Some(Level::Trace));
//! assert_eq!(directives.level_for("db"), Some(Level::Basic));
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::component::{all_components, find_component};
use crate::error::{ConfigError, Result};
use crate::level::Level;

/// Upper bound of one packed record, in bytes.
pub const MAX_LOG_BUFFER_SIZE: usize = 64 * 1024;

/// Most elements packed from one container.
pub const MAX_LOG_ARRAY_ENTRIES: usize = 512;

/// Most characters packed from one string.
pub const MAX_LOG_STRING_LENGTH: usize = 1024;

/// Environment variable read by [`LevelDirectives::from_env`].
pub const LEVELS_ENV_VAR: &str = "LOG_PACKER_LEVELS";

/// Truncation caps applied while packing.
///
/// [`output`](crate::output) always packs with [`PackLimits::DEFAULT`];
/// [`pack_args`](crate::pack_args) accepts tighter limits, which must not
/// exceed the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackLimits {
    pub max_buffer_size: usize,
    pub max_array_entries: usize,
    pub max_string_length: usize,
}

impl PackLimits {
    pub const DEFAULT: PackLimits = PackLimits {
        max_buffer_size: MAX_LOG_BUFFER_SIZE,
        max_array_entries: MAX_LOG_ARRAY_ENTRIES,
        max_string_length: MAX_LOG_STRING_LENGTH,
    };
}

impl Default for PackLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parsed `component=level` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelDirectives {
    default: Option<Level>,
    directives: Vec<(String, Level)>,
}

impl LevelDirectives {
    /// Reads directives from [`LEVELS_ENV_VAR`].
    ///
    /// Returns `Ok(None)` when the variable is not set.
    pub fn from_env() -> Result<Option<Self>> {
        match env::var(LEVELS_ENV_VAR) {
            Ok(value) => value.parse().map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Reads directives from a file, one or more per line.
    ///
    /// Everything after a `#` on a line is a comment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let joined = contents
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        joined.parse()
    }

    /// The level these directives give a component called `name`.
    pub fn level_for(&self, name: &str) -> Option<Level> {
        self.directives
            .iter()
            .rev()
            .find(|(component, _)| component == name)
            .map(|(_, level)| *level)
            .or(self.default)
    }

    /// Sets the level of every registered component the directives cover.
    ///
    /// Returns the component names that matched no registered component.
    pub fn apply(&self) -> Vec<String> {
        if let Some(level) = self.default {
            for component in all_components() {
                component.set_level(level);
            }
        }

        let mut unmatched = Vec::new();
        for (name, level) in &self.directives {
            match find_component(name) {
                Some(component) => component.set_level(*level),
                None => unmatched.push(name.clone()),
            }
        }

        if !unmatched.is_empty() {
            tracing::warn!(?unmatched, "level directives name unregistered components");
        }
        unmatched
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.directives.is_empty()
    }
}

impl FromStr for LevelDirectives {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parsed = LevelDirectives::default();

        for directive in s.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((name, level)) => {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(ConfigError::MalformedDirective(directive.to_string()));
                    }
                    parsed.directives.push((name.to_string(), level.parse()?));
                }
                None => parsed.default = Some(directive.parse()?),
            }
        }

        Ok(parsed)
    }
}
