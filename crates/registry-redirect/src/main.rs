// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use redirect_core::{Logger, RedirectConfig, RedirectError, Redirector, Server};

const LISTEN_HOST: &str = "0.0.0.0";

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = match RedirectConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Unable to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let logger = match Logger::new(&config.logger) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Unable to build logger: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger.install() {
        eprintln!("Unable to install logger: {e}");
        return ExitCode::FAILURE;
    }

    // The collector may come up after us; records keep redialing it.
    if let Err(e) = logger.connect() {
        warn!(
            "Unable to reach syslog collector at {}: {e}",
            config.logger.address
        );
    }

    let listener = match TcpListener::bind((LISTEN_HOST, config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", RedirectError::Bind(e));
            if let Err(e) = logger.transport().close() {
                eprintln!("Failed to close log transport: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    let redirector = Redirector::from_config(&config);
    info!(
        registry = config.registry_host(),
        repo = %config.repo,
        prefix = %config.prefix,
        "Starting registry redirect"
    );

    let server = Server::new(logger, config.shutdown_timeout);
    match server.run(listener, redirector, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Unable to listen for SIGTERM: {e}");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
