// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog severities and the PRI value sent on the wire.

use std::cmp::Ordering;
use std::fmt;

/// Syslog severity.
///
/// Ordered by importance, `Debug < Info < Warning < Error < Critical`, which
/// is the reverse of the numeric wire codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical = 2,
    Error = 3,
    Warning = 4,
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// Map a configured level name to a severity.
    ///
    /// Unknown names fall back to [`Severity::Info`].
    #[must_use]
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" | "warning" => Severity::Warning,
            "error" => Severity::Error,
            "dpanic" | "panic" | "fatal" | "critical" => Severity::Critical,
            _ => Severity::Info,
        }
    }

    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// True when `self` is at least as severe as `threshold`.
    #[inline]
    #[must_use]
    pub const fn at_least(self, threshold: Severity) -> bool {
        self.code() <= threshold.code()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        other.code().cmp(&self.code())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facility stamped on every line: user-level messages.
const USER_FACILITY: u8 = 1;

/// PRI header value: `facility * 8 + severity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub severity: Severity,
}

impl Priority {
    #[must_use]
    pub const fn value(self) -> u8 {
        USER_FACILITY * 8 + self.severity.code()
    }
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        Self { severity }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        let cases = [
            ("debug", Severity::Debug),
            ("info", Severity::Info),
            ("warn", Severity::Warning),
            ("warning", Severity::Warning),
            ("error", Severity::Error),
            ("dpanic", Severity::Critical),
            ("panic", Severity::Critical),
            ("fatal", Severity::Critical),
            ("critical", Severity::Critical),
            ("ERROR", Severity::Error),
        ];
        for (level, expected) in cases {
            assert_eq!(Severity::from_level(level), expected, "level {level}");
        }
    }

    #[test]
    fn test_unknown_level_defaults_to_info() {
        assert_eq!(Severity::from_level("verbose"), Severity::Info);
        assert_eq!(Severity::from_level(""), Severity::Info);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical.at_least(Severity::Error));
        assert!(Severity::Error.at_least(Severity::Warning));
        assert!(Severity::Warning.at_least(Severity::Info));
        assert!(Severity::Info.at_least(Severity::Debug));
        assert!(!Severity::Debug.at_least(Severity::Info));

        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Critical > Severity::Debug);
        let mut levels = vec![Severity::Error, Severity::Debug, Severity::Critical, Severity::Info];
        levels.sort();
        assert_eq!(
            levels,
            vec![Severity::Debug, Severity::Info, Severity::Error, Severity::Critical]
        );
        assert_eq!(Severity::Warning.max(Severity::Error), Severity::Error);
    }

    #[test]
    fn test_priority_value() {
        assert_eq!(Priority::from(Severity::Info).value(), 14);
        assert_eq!(Priority::from(Severity::Critical).value(), 10);
        assert_eq!(Priority::from(Severity::Warning).value(), 12);
        assert_eq!(Priority::from(Severity::Debug).to_string(), "15");
    }
}
