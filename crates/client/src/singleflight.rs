// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coalescing future: concurrent callers share one in-flight operation.
//!
//! The first caller to find no flight in progress starts one; everyone who
//! arrives before it settles awaits the same shared future and observes the
//! same result. The slot is released by the flight itself right before its
//! result becomes visible, so a caller arriving afterwards always starts a
//! fresh flight instead of reusing a stale result.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Single-flight group for one kind of operation.
pub struct SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    slot: Arc<Mutex<Option<Flight<T, E>>>>,
    started: AtomicU64,
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { slot: Arc::new(Mutex::new(None)), started: AtomicU64::new(0) }
    }

    /// Whether a flight is currently outstanding.
    pub fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of flights started so far.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Join the outstanding flight, or start one with `work`.
    ///
    /// `work` is only invoked when this caller becomes the leader. The
    /// returned flag is true for the leader.
    pub async fn run<F, Fut>(&self, work: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (flight, leader) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(flight) => (flight.clone(), false),
                None => {
                    let fut = work();
                    let release = Arc::clone(&self.slot);
                    let flight = async move {
                        let out = fut.await;
                        release.lock().take();
                        out
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    self.started.fetch_add(1, Ordering::Relaxed);
                    (flight, true)
                }
            }
        };
        (flight.await, leader)
    }
}

#[cfg(test)]
#[path = "singleflight_tests.rs"]
mod tests;
