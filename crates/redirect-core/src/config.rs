// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::RedirectError;
use std::env;
use std::time::Duration;
use syslog_writer::{Protocol, Severity, SyslogConfig};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COMPONENT: &str = "registry-redirect";
const DEFAULT_SYSLOG_ADDRESS: &str = "127.0.0.1:514";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const VALID_LOG_LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "critical"];

/// Configuration for the dual-sink logger and its syslog transport
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum severity emitted to both sinks: debug, info, warn, error or critical
    pub level: String,
    /// Syslog tag identifying this process
    pub component: String,
    /// Collector protocol
    pub protocol: Protocol,
    /// Collector address as host:port
    pub address: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            component: DEFAULT_COMPONENT.to_string(),
            protocol: Protocol::Tcp,
            address: DEFAULT_SYSLOG_ADDRESS.to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), RedirectError> {
        if !VALID_LOG_LEVELS.contains(&self.level.as_str()) {
            return Err(RedirectError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: debug, info, warn, error, critical",
                self.level
            )));
        }
        if self.address.trim().is_empty() {
            return Err(RedirectError::InvalidConfig(
                "SYSLOG_ADDRESS cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings derived from this configuration
    pub fn syslog_config(&self) -> SyslogConfig {
        SyslogConfig {
            protocol: self.protocol,
            address: self.address.clone(),
            tag: self.component.clone(),
            severity: Severity::from_level(&self.level),
        }
    }
}

/// Configuration for the redirect service
#[derive(Debug, Clone)]
pub struct RedirectConfig {
    /// HTTP listen port
    pub port: u16,
    /// Repository to redirect to; empty keeps the requested repository
    pub repo: String,
    /// User-visible repository prefix stripped before redirecting
    pub prefix: String,
    /// Redirect to gcr.io instead of ghcr.io
    pub gcr: bool,
    /// How long the listener waits for open connections on shutdown
    pub shutdown_timeout: Duration,
    pub logger: LoggerConfig,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            repo: String::new(),
            prefix: String::new(),
            gcr: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            logger: LoggerConfig::default(),
        }
    }
}

impl RedirectConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, RedirectError> {
        let port = match env::var("PORT") {
            Ok(port) => port.parse::<u16>().map_err(|e| {
                RedirectError::InvalidConfig(format!("Invalid PORT '{port}': {e}"))
            })?,
            Err(_) => DEFAULT_PORT,
        };
        let repo = env::var("REDIRECT_REPO").unwrap_or_default();
        let prefix = env::var("REDIRECT_PREFIX").unwrap_or_default();
        let gcr = env::var("REDIRECT_GCR")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);
        let shutdown_timeout = env::var("SHUTDOWN_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        let level = env::var("LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        let component = env::var("LOG_COMPONENT")
            .or_else(|_| env::var("FLY_APP_NAME"))
            .ok()
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPONENT.to_string());
        let protocol = env::var("SYSLOG_PROTOCOL")
            .unwrap_or_else(|_| "tcp".to_string())
            .parse::<Protocol>()
            .map_err(|e| RedirectError::InvalidConfig(e.to_string()))?;
        let address =
            env::var("SYSLOG_ADDRESS").unwrap_or_else(|_| DEFAULT_SYSLOG_ADDRESS.to_string());

        let config = Self {
            port,
            repo,
            prefix,
            gcr,
            shutdown_timeout,
            logger: LoggerConfig {
                level,
                component,
                protocol,
                address,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RedirectError> {
        if self.port == 0 {
            return Err(RedirectError::InvalidConfig(
                "PORT must be greater than 0".to_string(),
            ));
        }
        self.logger.validate()
    }

    /// Registry host requests are redirected to
    pub fn registry_host(&self) -> &'static str {
        if self.gcr {
            "gcr.io"
        } else {
            "ghcr.io"
        }
    }
}
