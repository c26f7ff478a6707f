// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-flight request accounting.
//!
//! [`InFlightLayer`] wraps any `tower` service so each call holds an
//! [`InFlightGuard`] until its response future completes or is dropped. The
//! shutdown sequence waits on [`RequestTracker::drained`] before closing the
//! log transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tower::{Layer, Service};

/// Shared counter of requests currently being handled.
#[derive(Clone, Debug)]
pub struct RequestTracker {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            in_flight: Arc::new(in_flight),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Count one request until the returned guard is dropped.
    #[must_use = "the request is released as soon as the guard is dropped"]
    pub fn enter(&self) -> InFlightGuard {
        self.in_flight.send_modify(|count| *count += 1);
        InFlightGuard {
            tracker: self.clone(),
        }
    }

    /// Resolve once no request is in flight.
    ///
    /// Requests may keep entering while this is pending; it resolves on the
    /// first moment the count is zero.
    pub async fn drained(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

/// Releases one in-flight slot on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: RequestTracker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker
            .in_flight
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// `tower` layer producing [`InFlight`] services.
#[derive(Clone, Debug)]
pub struct InFlightLayer {
    tracker: RequestTracker,
}

impl InFlightLayer {
    pub fn new(tracker: RequestTracker) -> Self {
        Self { tracker }
    }
}

impl<S> Layer<S> for InFlightLayer {
    type Service = InFlight<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InFlight {
            inner,
            tracker: self.tracker.clone(),
        }
    }
}

/// Service decorator counting calls to `S` as in flight.
#[derive(Clone, Debug)]
pub struct InFlight<S> {
    inner: S,
    tracker: RequestTracker,
}

impl<S, Request> Service<Request> for InFlight<S>
where
    S: Service<Request>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let guard = self.tracker.enter();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let _guard = guard;
            fut.await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tower::{service_fn, ServiceExt};

    #[test]
    fn test_guard_counts_and_releases() {
        let tracker = RequestTracker::new();
        let a = tracker.enter();
        let b = tracker.enter();
        assert_eq!(tracker.in_flight(), 2);
        drop(a);
        assert_eq!(tracker.in_flight(), 1);
        drop(b);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let tracker = RequestTracker::new();
        let cloned = tracker.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.enter();
            panic!("handler blew up");
        });
        assert!(result.is_err());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drained_resolves_immediately_when_idle() {
        let tracker = RequestTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.drained())
            .await
            .expect("idle tracker is drained");
    }

    #[tokio::test]
    async fn test_drained_waits_for_last_request() {
        let tracker = RequestTracker::new();
        let guard = tracker.enter();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.drained().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // New requests are still admitted while a drain is pending.
        let late = tracker.enter();
        drop(guard);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(late);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain completes")
            .unwrap();
    }

    #[tokio::test]
    async fn test_layer_holds_slot_for_duration_of_call() {
        let tracker = RequestTracker::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = std::sync::Mutex::new(Some(release_rx));

        let inner = service_fn(move |req: u32| {
            let rx = release_rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok::<_, Infallible>(req * 2)
            }
        });
        let svc = InFlightLayer::new(tracker.clone()).layer(inner);

        let call = tokio::spawn(svc.oneshot(21));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.in_flight(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(call.await.unwrap().unwrap(), 42);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_layer_releases_slot_on_error() {
        let tracker = RequestTracker::new();
        let svc = InFlightLayer::new(tracker.clone())
            .layer(service_fn(|_: ()| async { Err::<(), _>("boom") }));
        assert!(svc.oneshot(()).await.is_err());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_layer_releases_slot_when_dropped() {
        let tracker = RequestTracker::new();
        let mut svc = InFlightLayer::new(tracker.clone()).layer(service_fn(|_: ()| async {
            std::future::pending::<Result<(), Infallible>>().await
        }));
        let fut = svc.call(());
        assert_eq!(tracker.in_flight(), 1);
        drop(fut);
        assert_eq!(tracker.in_flight(), 0);
    }
}
