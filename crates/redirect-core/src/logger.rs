// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dual-sink structured logger.
//!
//! Every `tracing` event that passes the shared level filter is formatted as
//! one JSON object and written to two independent sinks:
//!
//! ```text
//!                      ┌─> fmt::Layer (json) ─> local writer (stdout)
//! event ─> LevelFilter ┤
//!                      └─> fmt::Layer (json) ─> RemoteSink ─> syslog Transport
//! ```
//!
//! The sinks never see each other's errors. A failed remote write is reported
//! on stderr by its own layer and the local record is still written.
//!
//! The logger shares, but does not own, the [`Transport`]: closing it is the
//! job of the shutdown sequence in [`crate::server`].

use std::fmt;
use std::sync::Arc;

use syslog_writer::{Transport, TransportError};
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, Registry};

use crate::config::LoggerConfig;
use crate::error::RedirectError;

/// Parse a configured level name into the filter shared by both sinks.
///
/// `critical` has no `tracing` counterpart and maps to `ERROR`.
pub fn parse_level(level: &str) -> Result<LevelFilter, RedirectError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "critical" => Ok(LevelFilter::ERROR),
        other => Err(RedirectError::Logger(format!("unknown log level '{other}'"))),
    }
}

/// Adapts a shared [`Transport`] to the writer contract of `fmt` layers.
#[derive(Clone, Debug)]
pub struct RemoteSink {
    transport: Arc<Transport>,
}

impl RemoteSink {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

impl<'a> MakeWriter<'a> for RemoteSink {
    type Writer = &'a Transport;

    fn make_writer(&'a self) -> Self::Writer {
        self.transport.as_ref()
    }
}

/// Builder for [`Logger`]; the local writer defaults to stdout.
pub struct LoggerBuilder {
    config: LoggerConfig,
    local: BoxMakeWriter,
    transport: Option<Arc<Transport>>,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            local: BoxMakeWriter::new(std::io::stdout),
            transport: None,
        }
    }

    /// Replace the local sink.
    pub fn with_local_writer<W>(mut self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.local = BoxMakeWriter::new(writer);
        self
    }

    /// Use an existing transport instead of building one from the config.
    pub fn with_transport(mut self, transport: Arc<Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Logger, RedirectError> {
        self.config.validate()?;
        let level = parse_level(&self.config.level)?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(Transport::new(self.config.syslog_config())));

        let (filter, level_handle) = reload::Layer::new(level);
        let local = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(self.local);
        let remote = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .log_internal_errors(true)
            .with_writer(RemoteSink::new(Arc::clone(&transport)));

        let subscriber = Registry::default().with(filter).with(local).with(remote);

        Ok(Logger {
            dispatch: Dispatch::new(subscriber),
            level: level_handle,
            transport,
        })
    }
}

/// Handle to the dual-sink logger.
///
/// Cheap to clone; clones share the level filter and the transport.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    level: reload::Handle<LevelFilter, Registry>,
    transport: Arc<Transport>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("transport", &self.transport)
            .finish()
    }
}

impl Logger {
    /// Build a logger writing locally to stdout.
    pub fn new(config: &LoggerConfig) -> Result<Self, RedirectError> {
        LoggerBuilder::new(config.clone()).build()
    }

    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    /// Subscriber dispatch; attach it to tasks with
    /// [`tracing::instrument::WithSubscriber`].
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Set this logger as the process-wide default subscriber.
    pub fn install(&self) -> Result<(), RedirectError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| RedirectError::Logger(e.to_string()))
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Eagerly dial the collector. Failures are not fatal; the next record
    /// dials again.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect()
    }

    /// Current threshold shared by both sinks.
    pub fn level(&self) -> Option<LevelFilter> {
        self.level.clone_current()
    }

    /// Change the threshold of both sinks at once.
    pub fn set_level(&self, level: &str) -> Result<(), RedirectError> {
        let level = parse_level(level)?;
        self.level
            .reload(level)
            .map_err(|e| RedirectError::Logger(e.to_string()))
    }
}
