// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP listener and ordered shutdown.
//!
//! Once the shutdown token is cancelled the server moves through
//! [`ShutdownPhase`] in order: it stops accepting, gives open connections up
//! to `shutdown_timeout` to finish, waits for every in-flight request
//! regardless of that timeout, and only then closes the log transport.

use std::fmt;
use std::io;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info};

use crate::error::RedirectError;
use crate::logger::Logger;
use crate::redirect::Body;
use crate::tracker::{InFlightLayer, RequestTracker};

/// Lifecycle of a [`Server`]; phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    Running,
    /// Listener closed, open connections are finishing.
    Stopping,
    /// Waiting for the in-flight count to reach zero.
    Draining,
    /// Log transport closed.
    Closed,
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Stopping => "stopping",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct Server {
    logger: Logger,
    tracker: RequestTracker,
    shutdown_timeout: Duration,
    phase: watch::Sender<ShutdownPhase>,
}

impl Server {
    pub fn new(logger: Logger, shutdown_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            logger,
            tracker: RequestTracker::new(),
            shutdown_timeout,
            phase,
        }
    }

    /// Observe phase transitions, e.g. to assert shutdown ordering.
    pub fn phase_receiver(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Serve `service` on `listener` until `shutdown` is cancelled, then run
    /// the shutdown sequence.
    ///
    /// Every task spawned here logs through this server's [`Logger`], whether
    /// or not it is installed globally. Shutdown problems (timeout, failed
    /// transport close) are logged and do not make this return an error; only
    /// a fatal accept error does, after the shutdown sequence has still run.
    pub async fn run<S>(
        self,
        listener: TcpListener,
        service: S,
        shutdown: CancellationToken,
    ) -> Result<(), RedirectError>
    where
        S: Service<Request<Incoming>, Response = Response<Body>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let dispatch = self.logger.dispatch().clone();
        self.serve(listener, service, shutdown)
            .with_subscriber(dispatch)
            .await
    }

    async fn serve<S>(
        self,
        listener: TcpListener,
        service: S,
        shutdown: CancellationToken,
    ) -> Result<(), RedirectError>
    where
        S: Service<Request<Incoming>, Response = Response<Body>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let service =
            TowerToHyperService::new(InFlightLayer::new(self.tracker.clone()).layer(service));
        let server = http1::Builder::new();
        let graceful = GracefulShutdown::new();
        let dispatch = self.logger.dispatch().clone();
        let mut joinset = JoinSet::new();

        if let Ok(addr) = listener.local_addr() {
            info!("Listening on {addr}");
        }

        let outcome = loop {
            let conn = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                con_res = listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Server error: {e}");
                        break Err(RedirectError::Serve(e));
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        error!("Connection handler panicked: {:?}", e);
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
            };
            let conn = graceful.watch(server.serve_connection(TokioIo::new(conn), service.clone()));
            joinset.spawn(
                async move {
                    if let Err(e) = conn.await {
                        error!("Connection error: {e}");
                    }
                }
                .with_subscriber(dispatch.clone()),
            );
        };

        drop(listener);
        self.advance(ShutdownPhase::Stopping);
        info!(
            in_flight = self.tracker.in_flight(),
            "Shutting down, waiting up to {:?} for open connections", self.shutdown_timeout
        );
        if tokio::time::timeout(self.shutdown_timeout, graceful.shutdown())
            .await
            .is_err()
        {
            error!(
                in_flight = self.tracker.in_flight(),
                "{}, still waiting for in-flight requests",
                RedirectError::ShutdownTimeout
            );
        }

        self.advance(ShutdownPhase::Draining);
        self.tracker.drained().await;
        // Connection tasks may still be flushing their last response.
        joinset.detach_all();

        info!("All requests drained, closing log transport");
        if let Err(e) = self.logger.transport().close() {
            error!("Failed to close log transport: {e}");
        }
        self.phase.send_replace(ShutdownPhase::Closed);
        outcome
    }

    fn advance(&self, phase: ShutdownPhase) {
        debug!(%phase, "Shutdown phase changed");
        self.phase.send_replace(phase);
    }
}
