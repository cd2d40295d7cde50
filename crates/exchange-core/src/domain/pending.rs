//! Pending-invocation table.
//!
//! Maps request IDs to in-flight invocations awaiting a response. Every entry
//! leaves the table through exactly one of:
//!
//! 1. `complete()` - the matching response arrived
//! 2. `fail_timeouts()` - the deadline passed (CLIENT_TIMEOUT)
//! 3. `fail_all_for_channel()` / `fail_all_for_instance()` - the owning channel
//!    disconnected, or the wrapper that issued the request closed
//!
//! The table is sharded (`DashMap`), so unrelated requests never contend on a
//! single lock. Removal from the map and the CAS inside the invocation cell
//! each admit one winner; late or duplicate deliveries are dropped.

use crate::domain::invocation::{InvocationCell, ResponseFuture};
use crate::error::ExchangeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use exchange_telemetry::{
    CHANNEL_INACTIVE_FAILURES, LATE_RESPONSES, PENDING_INVOCATIONS, RESPONSES_MATCHED, TIMEOUTS,
};
use exchange_types::{ChannelId, RequestId, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

static GLOBAL_TABLE: LazyLock<Arc<PendingTable>> = LazyLock::new(|| Arc::new(PendingTable::new()));

/// Upper bound on a single timeout, keeps deadline arithmetic in range.
const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Instance tag of invocations registered directly, not through a wrapper.
const UNSCOPED: u64 = 0;

/// An invocation awaiting its terminal transition
struct PendingInvocation {
    /// Channel that issued the request
    owner: ChannelId,
    /// Wrapper instance that issued the request; several wrappers can
    /// succeed one another on the same raw channel
    instance: u64,
    /// When the request was registered
    created_at: Instant,
    /// Timeout for this request
    timeout: Duration,
    /// Instant after which the sweep fails the invocation
    deadline: Instant,
    /// Completion cell shared with the caller's handle
    cell: Arc<InvocationCell>,
}

/// Statistics for the pending-invocation table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total invocations registered
    pub total_registered: AtomicU64,
    /// Total invocations completed by a response
    pub total_completed: AtomicU64,
    /// Total invocations failed by the timeout sweep
    pub total_timeouts: AtomicU64,
    /// Total invocations failed because their channel went away
    pub total_channel_inactive: AtomicU64,
    /// Total responses with no pending invocation
    pub total_late_responses: AtomicU64,
}

/// Process-wide correlation table from request ID to pending invocation.
pub struct PendingTable {
    pending: DashMap<RequestId, PendingInvocation>,
    stats: PendingStats,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// The table shared by every channel in this process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_TABLE)
    }

    /// Register a pending invocation owned by `owner`.
    ///
    /// A duplicate ID means ID allocation is broken; it is reported as
    /// `DuplicateRequestId` and the existing entry is left untouched.
    pub fn register(
        &self,
        request_id: RequestId,
        owner: ChannelId,
        timeout: Duration,
    ) -> Result<ResponseFuture, ExchangeError> {
        self.register_scoped(request_id, owner, UNSCOPED, timeout)
    }

    /// Register on behalf of one wrapper `instance` of `owner`.
    pub(crate) fn register_scoped(
        &self,
        request_id: RequestId,
        owner: ChannelId,
        instance: u64,
        timeout: Duration,
    ) -> Result<ResponseFuture, ExchangeError> {
        match self.pending.entry(request_id) {
            Entry::Occupied(_) => {
                error!(
                    request_id = %request_id,
                    channel = %owner,
                    "Duplicate request id registered"
                );
                Err(ExchangeError::DuplicateRequestId(request_id))
            }
            Entry::Vacant(slot) => {
                let timeout = timeout.min(MAX_TIMEOUT);
                let created_at = Instant::now();
                let cell = Arc::new(InvocationCell::new(request_id));
                slot.insert(PendingInvocation {
                    owner,
                    instance,
                    created_at,
                    timeout,
                    deadline: created_at + timeout,
                    cell: Arc::clone(&cell),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                PENDING_INVOCATIONS.inc();

                debug!(
                    request_id = %request_id,
                    channel = %owner,
                    timeout_ms = timeout.as_millis(),
                    "Registered pending invocation"
                );

                Ok(ResponseFuture::new(cell))
            }
        }
    }

    /// Complete the invocation matching `response.id()`.
    ///
    /// Returns false if nothing was pending under that ID (already timed out,
    /// already completed, or never registered); the response is dropped.
    pub fn complete(&self, response: Response) -> bool {
        let request_id = response.id();
        let Some(invocation) = self.take(&request_id) else {
            self.stats.total_late_responses.fetch_add(1, Ordering::Relaxed);
            LATE_RESPONSES.inc();
            warn!(
                request_id = %request_id,
                status = %response.status(),
                "Response for unknown or expired request id"
            );
            return false;
        };

        let response_time = invocation.created_at.elapsed();
        if !invocation.cell.resolve(Ok(response)) {
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        RESPONSES_MATCHED.inc();
        debug!(
            request_id = %request_id,
            channel = %invocation.owner,
            response_time_ms = response_time.as_millis(),
            "Completed pending invocation"
        );
        true
    }

    /// Fail every invocation whose deadline is before `now`.
    ///
    /// Returns the number of invocations failed.
    pub fn fail_timeouts(&self, now: Instant) -> usize {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.deadline < now)
            .map(|entry| *entry.key())
            .collect();

        let mut failed = 0;
        for request_id in expired {
            let Some((_, invocation)) = self
                .pending
                .remove_if(&request_id, |_, invocation| invocation.deadline < now)
            else {
                continue;
            };
            PENDING_INVOCATIONS.dec();

            let elapsed = now.saturating_duration_since(invocation.created_at);
            let resolved = invocation.cell.resolve(Err(ExchangeError::Timeout {
                request_id,
                channel: invocation.owner,
                elapsed,
                timeout: invocation.timeout,
            }));
            if resolved {
                failed += 1;
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                TIMEOUTS.inc();
                warn!(
                    request_id = %request_id,
                    channel = %invocation.owner,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = invocation.timeout.as_millis(),
                    "Pending invocation timed out"
                );
            }
        }

        failed
    }

    /// Fail every invocation owned by `channel` with `ChannelInactive`.
    ///
    /// Invocations of other channels are untouched. Returns the number failed.
    pub fn fail_all_for_channel(&self, channel: ChannelId, cause: &str) -> usize {
        self.fail_owned(channel, cause, |invocation| invocation.owner == channel)
    }

    /// Fail only the invocations issued through wrapper `instance` of
    /// `channel`; a newer wrapper on the same raw channel keeps its own.
    pub(crate) fn fail_all_for_instance(
        &self,
        channel: ChannelId,
        instance: u64,
        cause: &str,
    ) -> usize {
        self.fail_owned(channel, cause, |invocation| {
            invocation.owner == channel && invocation.instance == instance
        })
    }

    fn fail_owned<F>(&self, channel: ChannelId, cause: &str, owned_by: F) -> usize
    where
        F: Fn(&PendingInvocation) -> bool,
    {
        let owned: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| owned_by(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut failed = 0;
        for request_id in owned {
            let Some((_, invocation)) = self
                .pending
                .remove_if(&request_id, |_, invocation| owned_by(invocation))
            else {
                continue;
            };
            PENDING_INVOCATIONS.dec();
            let resolved = invocation.cell.resolve(Err(ExchangeError::ChannelInactive {
                request_id,
                channel,
                cause: cause.to_string(),
            }));
            if resolved {
                failed += 1;
                self.stats
                    .total_channel_inactive
                    .fetch_add(1, Ordering::Relaxed);
                CHANNEL_INACTIVE_FAILURES.inc();
            }
        }

        if failed > 0 {
            debug!(
                channel = %channel,
                failed = failed,
                cause = cause,
                "Failed pending invocations of inactive channel"
            );
        }
        failed
    }

    /// Withdraw a registration whose request never reached the peer.
    pub(crate) fn abort(&self, request_id: RequestId, error: ExchangeError) -> bool {
        match self.take(&request_id) {
            Some(invocation) => invocation.cell.resolve(Err(error)),
            None => false,
        }
    }

    /// Get number of currently pending invocations
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get number of pending invocations owned by `channel`
    pub fn pending_count_for(&self, channel: ChannelId) -> usize {
        self.pending
            .iter()
            .filter(|entry| entry.owner == channel)
            .count()
    }

    /// Check if a request ID is pending
    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    fn take(&self, request_id: &RequestId) -> Option<PendingInvocation> {
        let (_, invocation) = self.pending.remove(request_id)?;
        PENDING_INVOCATIONS.dec();
        Some(invocation)
    }
}
