//! Runtime configuration: where key material lives and which account it
//! belongs to.
//!
//! The default lives under `~/.bali/`, created on first use via
//! `dirs::home_dir()`, with a per-account subdirectory underneath it.

use std::path::PathBuf;

use crate::error::{ErrorKind, NotaryError, Result};

/// Where an [`crate::ssm::SoftwareSecurityModule`] keeps its key and
/// certificate: `{configDir}/{accountId}/`.
#[derive(Clone, Debug)]
pub struct NotaryConfig {
    pub config_dir: PathBuf,
    pub account_id: String,
}

impl NotaryConfig {
    pub fn new(config_dir: PathBuf, account_id: impl Into<String>) -> Self {
        NotaryConfig { config_dir, account_id: account_id.into() }
    }

    /// `~/.bali/{accountId}` — the default the spec prescribes, overridable
    /// by callers who construct [`NotaryConfig`] directly.
    pub fn default_for_account(account_id: impl Into<String>) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| NotaryError::new("config", "default_for_account", ErrorKind::StorageError))?;
        Ok(NotaryConfig { config_dir: home.join(".bali"), account_id: account_id.into() })
    }

    pub fn account_dir(&self) -> PathBuf {
        self.config_dir.join(&self.account_id)
    }
}
