// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur while configuring or running the redirect service
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build logger: {0}")]
    Logger(String),

    #[error("Failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,
}
