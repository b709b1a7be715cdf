//! Credential Store: the single well-known slot holding the access credential.
//!
//! The store never tracks expiry. A stale credential is only discovered when
//! the server answers 401, at which point the executor refreshes it.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::api::{ApiError, Result as ApiResult};
use crate::models::AccessCredential;

/// Key of the one slot every backend persists the credential under.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Keychain service name
const SERVICE_NAME: &str = "sessionguard";

/// Durable key-value slot backing the credential store.
///
/// Backends only move strings around; they know nothing about tokens.
pub trait CredentialSlot: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn store(&self, value: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Single writer for the current access credential.
///
/// Clones share the same slot, so a credential set through one clone is seen
/// by all of them. Writes are last-write-wins.
#[derive(Clone)]
pub struct CredentialStore {
    slot: Arc<dyn CredentialSlot>,
}

impl CredentialStore {
    pub fn new(slot: impl CredentialSlot + 'static) -> Self {
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(MemorySlot::default())
    }

    pub fn get(&self) -> ApiResult<Option<AccessCredential>> {
        let value = self.slot.load().map_err(ApiError::Storage)?;
        Ok(value.filter(|v| !v.is_empty()).map(AccessCredential::from))
    }

    pub fn set(&self, credential: &AccessCredential) -> ApiResult<()> {
        debug!("Storing access credential");
        self.slot
            .store(credential.as_str())
            .map_err(ApiError::Storage)
    }

    pub fn clear(&self) -> ApiResult<()> {
        debug!("Clearing access credential");
        self.slot.remove().map_err(ApiError::Storage)
    }

    /// Whether a credential is currently held. Storage errors count as absent.
    pub fn has_credential(&self) -> bool {
        matches!(self.get(), Ok(Some(_)))
    }
}

/// Slot that lives and dies with the process.
#[derive(Default)]
pub struct MemorySlot {
    value: RwLock<Option<String>>,
}

impl CredentialSlot for MemorySlot {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .value
            .read()
            .map_err(|_| anyhow!("Memory slot lock poisoned"))?;
        Ok(guard.clone())
    }

    fn store(&self, value: &str) -> Result<()> {
        let mut guard = self
            .value
            .write()
            .map_err(|_| anyhow!("Memory slot lock poisoned"))?;
        *guard = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let mut guard = self
            .value
            .write()
            .map_err(|_| anyhow!("Memory slot lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Slot stored in the OS keychain.
pub struct KeyringSlot {
    entry: Entry,
}

impl KeyringSlot {
    pub fn new() -> Result<Self> {
        Self::for_account(ACCESS_TOKEN_KEY)
    }

    fn for_account(account: &str) -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl CredentialSlot for KeyringSlot {
    fn load(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve access token from keychain"),
        }
    }

    fn store(&self, value: &str) -> Result<()> {
        self.entry
            .set_password(value)
            .context("Failed to store access token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete access token from keychain"),
        }
    }
}
