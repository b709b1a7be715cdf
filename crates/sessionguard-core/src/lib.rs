//! sessionguard-core - client-side session layer for a cookie + bearer API.
//!
//! Keeps a short-lived access credential in a durable slot, attaches it to
//! every request, silently refreshes it when the server answers 401, and logs
//! the session out after a period of user inactivity.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sessionguard_core::{ApiClient, ClientConfig, CredentialStore, SessionContext};
//!
//! # async fn run() -> sessionguard_core::api::Result<()> {
//! let config = ClientConfig::from_env();
//! let client = ApiClient::new(&config, CredentialStore::in_memory())?;
//! let session = Arc::new(SessionContext::new(client));
//! session.initialize().await;
//! if session.state().requires_login() {
//!     session.login("ana@example.com", "secret").await?;
//! }
//! let clientes: serde_json::Value = session.client().get_json("/api/clientes/").await?;
//! # let _ = clientes;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, RequestOptions};
pub use auth::{
    ActivityBus, CredentialStore, FileSlot, InactivityGuard, InactivityMonitor, InputEvent,
    KeyringSlot, SessionContext, SessionPhase, SessionState,
};
pub use config::ClientConfig;
pub use models::{AccessCredential, CsrfToken, SessionUser};
