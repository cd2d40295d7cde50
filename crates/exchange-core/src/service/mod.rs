//! Service layer: exchange channels and the registry that caches them.

pub mod exchange_channel;
pub mod registry;

pub use exchange_channel::ExchangeChannel;
pub use registry::ChannelRegistry;
