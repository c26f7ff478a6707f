// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors returned by the syslog [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport was closed; the write was not attempted and must not be retried.
    #[error("syslog transport closed")]
    Closed,

    /// Dialing the collector failed. The next write dials again.
    #[error("failed to connect to syslog collector: {0}")]
    Connect(#[source] io::Error),

    /// Sending on an established connection failed. The connection was dropped.
    #[error("failed to write to syslog collector: {0}")]
    Write(#[source] io::Error),

    /// Closing the underlying connection failed.
    #[error("failed to close syslog connection: {0}")]
    Close(#[source] io::Error),

    #[error("unsupported syslog protocol '{0}', expected tcp or udp")]
    InvalidProtocol(String),
}

impl TransportError {
    /// True for the permanent error produced by writes after close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            TransportError::Connect(e) | TransportError::Write(e) | TransportError::Close(e) => e,
            TransportError::InvalidProtocol(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
        }
    }
}
