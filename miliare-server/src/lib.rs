//! Miliare referral network service
//!
//! HTTP front for the Miliare core: session-based identity, referral and
//! company administration, commission reports, gated dashboard routes and
//! the partner webhook.

pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod workflow;

pub use config::Config;
pub use error::ServerError;
pub use notify::{ConsoleNotifier, Notice, Notifier};
pub use state::AppState;
pub use store::{
    DataStore, InMemoryDataStore, InMemorySessionStore, SessionStore, SqliteStore,
};
