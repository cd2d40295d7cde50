//! Invocation handles.
//!
//! Each pending request owns one [`InvocationCell`]. The cell is claimed with a
//! single compare-and-swap from `PENDING` to `RESOLVED`; whoever wins the CAS
//! (response delivery, timeout sweep, channel cleanup) writes the outcome and
//! every other attempt is a no-op. The caller observes the cell through a
//! [`ResponseFuture`]: block on it, await it, or attach a continuation.

use crate::error::ExchangeError;
use exchange_types::{RequestId, Response};
use futures::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Terminal outcome of an invocation.
///
/// Non-OK responses arrive as `Ok(response)`; `Err` is reserved for
/// timeout, channel loss and transport failure.
pub type Outcome = Result<Response, ExchangeError>;

type Listener = Box<dyn FnOnce(&Outcome) + Send>;

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;

struct CellInner {
    outcome: Option<Outcome>,
    listeners: Vec<Listener>,
}

/// Single-assignment completion cell shared by the table and the caller.
pub(crate) struct InvocationCell {
    request_id: RequestId,
    state: AtomicU8,
    inner: Mutex<CellInner>,
    ready: Condvar,
    waker: AtomicWaker,
}

impl InvocationCell {
    pub(crate) fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: AtomicU8::new(PENDING),
            inner: Mutex::new(CellInner {
                outcome: None,
                listeners: Vec::new(),
            }),
            ready: Condvar::new(),
            waker: AtomicWaker::new(),
        }
    }

    /// Claim the cell and publish `outcome`.
    ///
    /// Returns `false` if another resolver already claimed it.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        if self
            .state
            .compare_exchange(PENDING, RESOLVED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let (listeners, snapshot) = {
            let mut inner = self.inner.lock();
            let listeners = std::mem::take(&mut inner.listeners);
            let snapshot = (!listeners.is_empty()).then(|| outcome.clone());
            inner.outcome = Some(outcome);
            (listeners, snapshot)
        };

        self.ready.notify_all();
        self.waker.wake();

        if let Some(outcome) = snapshot {
            for listener in listeners {
                listener(&outcome);
            }
        }
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.state.load(Ordering::Acquire) == RESOLVED
    }

    fn outcome(&self) -> Option<Outcome> {
        self.inner.lock().outcome.clone()
    }

    /// Run `listener` on the resolving thread, or right away if the cell is
    /// already resolved.
    fn on_resolve(&self, listener: Listener) {
        let mut inner = self.inner.lock();
        match &inner.outcome {
            Some(outcome) => {
                let outcome = outcome.clone();
                drop(inner);
                listener(&outcome);
            }
            None => inner.listeners.push(listener),
        }
    }

    fn wait(&self) -> Outcome {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = &inner.outcome {
                return outcome.clone();
            }
            self.ready.wait(&mut inner);
        }
    }

    fn wait_until(&self, deadline: Instant) -> Option<Outcome> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = &inner.outcome {
                return Some(outcome.clone());
            }
            if self.ready.wait_until(&mut inner, deadline).timed_out() {
                return inner.outcome.clone();
            }
        }
    }
}

/// Caller-side handle of a two-way request.
///
/// Returned by `ExchangeChannel::request` before the request is answered.
/// Dropping it abandons interest only; the table keeps the entry until a
/// response, the timeout sweep, or channel close resolves it.
pub struct ResponseFuture {
    cell: Arc<InvocationCell>,
}

impl ResponseFuture {
    pub(crate) fn new(cell: Arc<InvocationCell>) -> Self {
        Self { cell }
    }

    pub fn request_id(&self) -> RequestId {
        self.cell.request_id
    }

    /// Whether a terminal transition has been claimed.
    pub fn is_done(&self) -> bool {
        self.cell.is_resolved()
    }

    /// Outcome if already published, without blocking.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.cell.outcome()
    }

    /// Block the calling thread until the invocation resolves.
    ///
    /// Do not call from an async context; await the future instead.
    pub fn wait(&self) -> Outcome {
        self.cell.wait()
    }

    /// Block for at most `timeout`. `None` means the invocation is still
    /// pending; it keeps running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.cell.wait_until(deadline),
            None => Some(self.cell.wait()),
        }
    }

    /// Attach a continuation, invoked exactly once by whichever thread
    /// resolves the invocation.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        self.cell.on_resolve(Box::new(callback));
    }
}

impl Future for ResponseFuture {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Register before checking so a concurrent resolve cannot be missed.
        self.cell.waker.register(cx.waker());
        match self.cell.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("request_id", &self.cell.request_id)
            .field("done", &self.cell.is_resolved())
            .finish()
    }
}
