//! Basket Sync client library.
//!
//! Keeps a signed-in shopper's cart and wishlist badge counts consistent with
//! the remote store across tabs, without ever blocking a read on the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use basket_sync::{HttpGateway, LocalSession, Notifier, SyncConfig, SyncOptions, Synchronizer};
//!
//! let config = SyncConfig::from_env()?;
//! let session = LocalSession::open(config.session_file.clone().map(SessionFile::new), None)?;
//! let gateway = HttpGateway::new(&config, session.clone())?;
//! let sync = Synchronizer::new(gateway, session, Notifier::new(), SyncOptions::from_config(&config));
//! let _handle = sync.start();
//!
//! let counts = sync.read();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod counter;
pub mod gateway;
pub mod mutation;
pub mod notifier;
pub mod session;
pub mod synchronizer;
pub mod telemetry;

#[cfg(test)]
mod fake;

pub use config::{ConfigError, SyncConfig};
pub use counter::{CounterCache, Freshness, Snapshot};
pub use gateway::{GatewayError, HttpGateway, RemoteStore};
pub use mutation::Mutation;
pub use notifier::{
    ChangeMarker, FileWatchSource, Notifier, StorageBus, StorageEvent, StorageKey, Subscription,
    TabId, TabStorage, TimerSource, TriggerSource,
};
pub use session::{Credentials, LocalSession, SessionError, SessionFile, SessionOracle, UserRecord};
pub use synchronizer::{
    DomainOutcome, RefreshFailure, RefreshReport, SyncHandle, SyncOptions, Synchronizer,
};
