use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Verbosity of a log statement, and the filter threshold of a component.
///
/// Levels are ordered from quietest to noisiest. A component configured at
/// `Detail` emits statements logged at `Basic` and `Detail`, and skips
/// everything above.
///
/// # Examples
///
/// ```
/// # use binary_log_packer::Level;
/// assert!(Level::Trace > Level::Detail);
/// assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
/// assert_eq!(Level::Insane.to_string(), "insane");
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    None = 0,
    #[default]
    Basic = 1,
    Detail = 2,
    Debug = 3,
    Trace = 4,
    Insane = 5,
}

impl Level {
    /// Every level, quietest first.
    pub const ALL: [Level; 6] = [
        Level::None,
        Level::Basic,
        Level::Detail,
        Level::Debug,
        Level::Trace,
        Level::Insane,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Basic => "basic",
            Level::Detail => "detail",
            Level::Debug => "debug",
            Level::Trace => "trace",
            Level::Insane => "insane",
        }
    }

    /// Recovers a level from its `u8` representation.
    ///
    /// Values past the last level clamp to [`Level::Insane`].
    pub const fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::None,
            1 => Level::Basic,
            2 => Level::Detail,
            3 => Level::Debug,
            4 => Level::Trace,
            _ => Level::Insane,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::UnknownLevel(trimmed.to_string()))
    }
}

/// How bad the condition behind a log statement is.
///
/// Severity is carried in the call-site metadata for readers; it plays no
/// part in filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl Severity {
    /// Alias kept for readers that spell out the syslog name.
    pub const INFORMATIONAL: Severity = Severity::Info;

    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Fatal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("informational") {
            return Ok(Severity::INFORMATIONAL);
        }
        Severity::ALL
            .iter()
            .copied()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::UnknownSeverity(trimmed.to_string()))
    }
}
