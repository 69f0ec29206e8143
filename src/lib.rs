//! Couples Companion - backend pieces of a two-partner mood and chat app.
//!
//! # Architecture
//!
//! - **VAPID** - stateless P-256 key pair generation for web push setup
//! - **Service / Server** - the key generation endpoint and its HTTP host
//! - **Sync** - mood history and chat kept live from a realtime datastore
//!
//! # Modules
//!
//! - [`vapid`] - Key generation, encoding and validation
//! - [`service`] - Framework-independent endpoint logic
//! - [`server`] - axum router and listener
//! - [`sync`] - Data layer capability and the synced view
//! - [`config`] - Configuration loading/saving
//! - [`env`] - Runtime environment detection

pub mod config;
pub mod env;
pub mod server;
pub mod service;
pub mod sync;
pub mod vapid;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use service::{KeyPairReply, KeyPairService, KeySource, OsKeySource};
pub use sync::{DataLayer, InMemoryDataLayer, SyncedView};
pub use vapid::{GenerationFailure, VapidKeys};
