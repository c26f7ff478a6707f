// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog line framing.
//!
//! Lines follow the classic network syslog layout:
//!
//! ```text
//! <PRI>TIMESTAMP HOSTNAME TAG[PID]: MSG\n
//! ```
//!
//! The message body is opaque; a single trailing newline is kept instead of
//! adding a second one.

use std::{env, fs};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::priority::Priority;

const FALLBACK_HOSTNAME: &str = "localhost";

/// Static header fields shared by every line a transport sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub priority: Priority,
    pub hostname: String,
    pub tag: String,
    pub pid: u32,
}

impl Header {
    #[must_use]
    pub fn new(priority: Priority, tag: &str) -> Self {
        Self {
            priority,
            hostname: hostname(),
            tag: if tag.is_empty() { process_name() } else { tag.to_string() },
            pid: std::process::id(),
        }
    }

    /// Frame `msg` as one syslog line stamped with the current time.
    #[must_use]
    pub fn frame(&self, msg: &[u8]) -> Vec<u8> {
        self.frame_at(Utc::now(), msg)
    }

    #[must_use]
    pub fn frame_at(&self, timestamp: DateTime<Utc>, msg: &[u8]) -> Vec<u8> {
        let prefix = format!(
            "<{}>{} {} {}[{}]: ",
            self.priority,
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.hostname,
            self.tag,
            self.pid
        );
        let mut line = Vec::with_capacity(prefix.len() + msg.len() + 1);
        line.extend_from_slice(prefix.as_bytes());
        line.extend_from_slice(msg);
        if !msg.ends_with(b"\n") {
            line.push(b'\n');
        }
        line
    }
}

/// Hostname as reported by `HOSTNAME` or `/etc/hostname`.
#[must_use]
pub fn hostname() -> String {
    if let Ok(name) = env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

fn process_name() -> String {
    env::args()
        .next()
        .as_deref()
        .and_then(|arg0| std::path::Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "syslog-writer".to_string())
}
