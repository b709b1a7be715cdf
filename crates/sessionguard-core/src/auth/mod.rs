//! Session management: credential storage, session state, idle logout.
//!
//! This module provides:
//! - `CredentialStore`: the single slot holding the access credential, over a
//!   pluggable `CredentialSlot` (memory, file, or OS keychain)
//! - `SessionContext`: observable session state driven by login/logout/refresh
//! - `InactivityMonitor` / `InactivityGuard`: log out after a quiet period
//!
//! The credential is never checked for expiry locally; a 401 from the server
//! is what triggers a refresh.

pub mod credentials;
pub mod file_slot;
pub mod inactivity;
pub mod session;

pub use credentials::{CredentialSlot, CredentialStore, KeyringSlot, MemorySlot, ACCESS_TOKEN_KEY};
pub use file_slot::FileSlot;
pub use inactivity::{ActivityBus, InactivityGuard, InactivityMonitor, InputEvent, TimeoutCallback};
pub use session::{SessionContext, SessionPhase, SessionState};
