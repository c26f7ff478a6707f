// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reconnecting syslog writer.
//!
//! [`Transport`] owns a single outbound connection to a remote syslog
//! collector. Every call to [`Transport::write`] frames the caller's bytes as
//! one syslog line and sends it in one critical section. A dead connection is
//! dropped and re-dialed on the next write; a closed transport never dials
//! again.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod errors;
pub mod format;
pub mod priority;
pub mod transport;

pub use errors::TransportError;
pub use priority::{Priority, Severity};
pub use transport::{Protocol, SyslogConfig, Transport, TransportState};
