//! Worker pools
//!
//! The broker runs its two request paths, message dispatch and registry
//! mutation, on two independent [`WorkerPool`]s. A pool owns a dedicated
//! multi-thread tokio runtime with a fixed number of worker threads, so a
//! flood of publishes can never starve subscribe requests (and the other way
//! around), and neither ever runs on the caller's thread.
//!
//! Every submitted unit of work hands back a [`Completion`], a future that
//! resolves with the unit's result once it has run.

pub mod dispatch;
pub mod mutation;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::utils::BrokerError;

pub use dispatch::{DispatchExecutor, DispatchOutcome};
pub use mutation::MutationExecutor;

/// Default number of worker threads of each pool.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Default time a pool is given to finish in-flight work on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct WorkerPool {
    name: &'static str,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    accepting: AtomicBool,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    pub fn new(name: &'static str, parallelism: usize) -> Result<Self, BrokerError> {
        if parallelism == 0 {
            return Err(BrokerError::validation(format!(
                "{name} pool parallelism must be at least 1"
            )));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(parallelism)
            .thread_name(format!("popsub-{name}"))
            .enable_all()
            .build()
            .map_err(|source| BrokerError::PoolStart { pool: name, source })?;

        info!(pool = name, parallelism, "worker pool started");

        Ok(Self {
            name,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            accepting: AtomicBool::new(true),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Run `work` on the pool.
    ///
    /// Rejected with [`BrokerError::ShutDown`] once [`shutdown`](Self::shutdown)
    /// has started.
    pub fn submit<F>(&self, work: F) -> Result<Completion<F::Output>, BrokerError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        // count first: a shutdown racing with us then waits for this unit
        let guard = InFlightGuard::enter(&self.in_flight);
        if !self.accepting.load(Ordering::Acquire) {
            return Err(BrokerError::ShutDown);
        }

        let handle = self.handle.spawn(async move {
            let _guard = guard;
            work.await
        });
        Ok(Completion { handle })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Stop accepting work, wait up to `grace` for in-flight units, then cancel
    /// whatever is left.
    ///
    /// Must be awaited inside a tokio runtime other than this pool's own.
    pub async fn shutdown(&self, grace: Duration) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }

        if tokio::time::timeout(grace, self.in_flight.wait_idle())
            .await
            .is_err()
        {
            warn!(
                pool = self.name,
                remaining = self.in_flight(),
                ?grace,
                "worker pool did not drain in time, cancelling remaining work"
            );
        }

        self.stop_runtime();
        info!(pool = self.name, "worker pool stopped");
    }

    fn stop_runtime(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(runtime) = runtime {
            // never blocks, safe from async code
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.accepting.store(false, Ordering::Release);
        self.stop_runtime();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("accepting", &self.is_accepting())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    async fn wait_idle(&self) {
        loop {
            // register before checking so a notify between the two is not lost
            let notified = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count when the unit finishes or is dropped.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::AcqRel);
        Self {
            in_flight: in_flight.clone(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}

/// The pending result of one unit of work submitted to a [`WorkerPool`].
///
/// Await it from async code, or call [`wait`](Completion::wait) from a plain
/// thread. Dropping it does not cancel the work.
#[must_use = "a Completion does nothing unless awaited, but the work runs regardless"]
#[derive(Debug)]
pub struct Completion<T> {
    handle: JoinHandle<T>,
}

impl<T> Completion<T> {
    /// Block the current thread until the work is done.
    ///
    /// Do not call this from inside an async task; await the completion instead.
    pub fn wait(self) -> Result<T, BrokerError> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, BrokerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|res| {
            res.map_err(|err| {
                if err.is_panic() {
                    let reason = panic_reason(err.into_panic());
                    debug!(%reason, "unit of work panicked");
                    BrokerError::WorkerPanicked(reason)
                } else {
                    BrokerError::Cancelled
                }
            })
        })
    }
}

pub(crate) fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
