//! Application state management

use std::sync::Arc;

use axum::http::HeaderMap;
use miliare_core::Resolution;
use tower_cookies::Cookies;

use crate::config::Config;
use crate::error::ServerError;
use crate::identity::resolve_request;
use crate::notify::Notifier;
use crate::store::{DataStore, SessionStore};

/// Shared state handed to every handler
pub struct AppState<D, S, N>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    pub data_store: Arc<D>,
    pub session_store: Arc<S>,
    pub notifier: N,
    pub config: Config,
}

impl<D, S, N> AppState<D, S, N>
where
    D: DataStore,
    S: SessionStore,
    N: Notifier,
{
    pub fn new(data_store: D, session_store: S, notifier: N, config: Config) -> Self {
        Self::with_shared_stores(Arc::new(data_store), Arc::new(session_store), notifier, config)
    }

    /// Build state over stores that are already shared, e.g. one SQLite
    /// connection backing both traits
    pub fn with_shared_stores(
        data_store: Arc<D>,
        session_store: Arc<S>,
        notifier: N,
        config: Config,
    ) -> Self {
        Self {
            data_store,
            session_store,
            notifier,
            config,
        }
    }

    /// Resolve the principal behind a request's session token
    pub fn resolve(&self, cookies: &Cookies, headers: &HeaderMap) -> Result<Resolution, ServerError> {
        resolve_request(
            self.data_store.as_ref(),
            self.session_store.as_ref(),
            cookies,
            headers,
        )
    }
}
