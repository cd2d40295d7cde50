//! Channel registry.
//!
//! Side table from raw channel identity to its [`ExchangeChannel`] wrapper.
//! Lookups are per-shard (`DashMap::entry`), so concurrent callers asking for
//! the same raw channel always get the same wrapper while unrelated channels
//! never contend.

use crate::domain::{ExchangeConfig, PendingTable};
use crate::error::ConfigError;
use crate::ports::RawChannel;
use crate::service::exchange_channel::ExchangeChannel;
use crate::sweeper;
use dashmap::DashMap;
use exchange_telemetry::CHANNELS_ACTIVE;
use exchange_types::ChannelId;
use std::sync::{Arc, LazyLock, Weak};
use tokio::task::JoinHandle;
use tracing::debug;

static GLOBAL_REGISTRY: LazyLock<Arc<ChannelRegistry>> =
    LazyLock::new(|| ChannelRegistry::new(PendingTable::global(), ExchangeConfig::from_env()));

/// Cache of exchange wrappers keyed by raw channel identity.
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Arc<ExchangeChannel>>,
    pending: Arc<PendingTable>,
    config: ExchangeConfig,
    /// Handed to wrappers so `close()` can deregister itself
    this: Weak<ChannelRegistry>,
}

impl ChannelRegistry {
    /// Build a registry without checking `config`; see [`try_new`](Self::try_new).
    pub fn new(pending: Arc<PendingTable>, config: ExchangeConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            channels: DashMap::new(),
            pending,
            config,
            this: this.clone(),
        })
    }

    /// Build a registry after validating `config`.
    pub fn try_new(
        pending: Arc<PendingTable>,
        config: ExchangeConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Self::new(pending, config))
    }

    /// Sweep this registry's pending table every `config.sweep_interval`.
    /// Must be called within a tokio runtime; abort the handle to stop.
    pub fn spawn_timeout_sweeper(&self) -> JoinHandle<()> {
        debug!(
            interval_ms = self.config.sweep_interval.as_millis(),
            "Starting timeout sweeper"
        );
        sweeper::spawn_timeout_sweeper(Arc::clone(&self.pending), self.config.sweep_interval)
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Registry backed by [`PendingTable::global`], configured from the
    /// environment.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Wrapper for `raw`, created on first use. `None` in, `None` out.
    pub fn get_or_add_channel(
        &self,
        raw: Option<&Arc<dyn RawChannel>>,
    ) -> Option<Arc<ExchangeChannel>> {
        raw.map(|raw| self.channel_for(raw))
    }

    /// Wrapper for `raw`, created on first use.
    pub fn channel_for(&self, raw: &Arc<dyn RawChannel>) -> Arc<ExchangeChannel> {
        let id = raw.id();
        let entry = self.channels.entry(id).or_insert_with(|| {
            CHANNELS_ACTIVE.inc();
            debug!(channel = %id, "Registered exchange channel");
            Arc::new(ExchangeChannel::registered(
                Arc::clone(raw),
                Arc::clone(&self.pending),
                self.config.clone(),
                self.this.clone(),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Drop the cached wrapper once the raw channel reports disconnected.
    pub fn remove_channel_if_disconnected(&self, raw: &Arc<dyn RawChannel>) {
        if !raw.is_connected() {
            let id = raw.id();
            if self.channels.remove(&id).is_some() {
                CHANNELS_ACTIVE.dec();
                debug!(channel = %id, "Dropped wrapper of disconnected channel");
            }
        }
    }

    /// Remove `channel` if it is still the cached wrapper for its raw channel.
    /// A successor cached under the same id is left in place.
    pub(crate) fn deregister(&self, channel: &ExchangeChannel) -> bool {
        let id = channel.id();
        let removed = self
            .channels
            .remove_if(&id, |_, cached| std::ptr::eq(cached.as_ref(), channel))
            .is_some();
        if removed {
            CHANNELS_ACTIVE.dec();
            debug!(channel = %id, "Deregistered exchange channel");
        }
        removed
    }

    pub fn get_channel(&self, id: ChannelId) -> Option<Arc<ExchangeChannel>> {
        self.channels.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Pending table shared by every wrapper of this registry
    pub fn pending(&self) -> &Arc<PendingTable> {
        &self.pending
    }
}
