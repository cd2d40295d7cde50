//! Domain types for the exchange layer.
//!
//! Correlation table, invocation handles, the channel phase flag, the
//! in-flight counter used for graceful drain, and configuration.

pub mod config;
pub mod drain;
pub mod invocation;
pub mod pending;
pub mod phase;

pub use config::ExchangeConfig;
pub use drain::InflightCounter;
pub use invocation::{Outcome, ResponseFuture};
pub use pending::{PendingStats, PendingTable};
pub use phase::ChannelPhase;
