//! On-disk persistence for a security module's private key and current
//! certificate.
//!
//! Writes are atomic (write to a temp file in the same directory, fsync,
//! rename over the target) and files are permission-hardened to `0600`
//! (directories `0700`) on Unix. Non-Unix targets get an explicit
//! [`ErrorKind::UnsupportedPlatform`] rather than a silently world-readable
//! private key.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};

use crate::error::{ErrorKind, NotaryError, Result};

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Where a single account's key material and certificate live:
/// `{configDir}/{accountId}/NotaryKey` and `{configDir}/{accountId}/NotaryCertificate`.
pub struct Keystore {
    account_dir: PathBuf,
}

impl Keystore {
    pub fn new(config_dir: &Path, account_id: &str) -> Self {
        Keystore { account_dir: config_dir.join(account_id) }
    }

    fn key_path(&self) -> PathBuf {
        self.account_dir.join("NotaryKey")
    }

    fn cert_path(&self) -> PathBuf {
        self.account_dir.join("NotaryCertificate")
    }

    /// Whether an SSM backed by this keystore has ever been initialized.
    pub fn exists(&self) -> bool {
        self.key_path().is_file() && self.cert_path().is_file()
    }

    pub fn load_key(&self) -> Result<Vec<u8>> {
        fs::read(self.key_path()).map_err(|e| NotaryError::storage("load_key", e))
    }

    pub fn load_certificate(&self) -> Result<Vec<u8>> {
        fs::read(self.cert_path()).map_err(|e| NotaryError::storage("load_certificate", e))
    }

    /// Persist a new key and its paired certificate. Both files are staged
    /// as temp files in the account directory, fsynced, and permission-
    /// hardened before either is renamed into place, so a crash before
    /// staging completes touches neither live file. The two renames
    /// themselves cannot be made a single kernel-level atomic operation;
    /// [`crate::ssm::SoftwareSecurityModule::initialize`] cross-checks the
    /// loaded key against the loaded certificate's public key so a crash
    /// between the two renames is detected on next load rather than
    /// silently trusted.
    pub fn save_key_and_certificate(&self, key_text: &[u8], certificate_text: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        let key_tmp = stage_temp(&self.account_dir, key_text)?;
        let cert_tmp = stage_temp(&self.account_dir, certificate_text)?;
        key_tmp
            .persist(self.key_path())
            .map_err(|e| NotaryError::storage("save_key_and_certificate", e.error))?;
        cert_tmp
            .persist(self.cert_path())
            .map_err(|e| NotaryError::storage("save_key_and_certificate", e.error))?;
        Ok(())
    }

    /// Irreversibly remove both files. There is no undo.
    pub fn erase(&self) -> Result<()> {
        for path in [self.key_path(), self.cert_path()] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| NotaryError::storage("erase", e))?;
            }
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.account_dir.exists() {
            fs::create_dir_all(&self.account_dir)
                .map_err(|e| NotaryError::storage("ensure_dir", e))?;
        }
        harden_dir(&self.account_dir)
    }
}

#[cfg(unix)]
fn harden_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(DIR_MODE);
    fs::set_permissions(dir, perms).map_err(|e| NotaryError::storage("harden_dir", e))
}

#[cfg(not(unix))]
fn harden_dir(_dir: &Path) -> Result<()> {
    Err(NotaryError::new("keystore", "harden_dir", ErrorKind::UnsupportedPlatform))
}

#[cfg(unix)]
fn harden_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(FILE_MODE);
    fs::set_permissions(path, perms).map_err(|e| NotaryError::storage("harden_file", e))
}

#[cfg(not(unix))]
fn harden_file(_path: &Path) -> Result<()> {
    Err(NotaryError::new("keystore", "harden_file", ErrorKind::UnsupportedPlatform))
}

/// Write `text` plus a trailing newline to a fresh temp file in `dir`,
/// fsync it, and harden its permissions, without yet renaming it into
/// place.
fn stage_temp(dir: &Path, text: &[u8]) -> Result<TempPath> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| NotaryError::storage("stage_temp", e))?;
    tmp.write_all(text).map_err(|e| NotaryError::storage("stage_temp", e))?;
    tmp.write_all(b"\n").map_err(|e| NotaryError::storage("stage_temp", e))?;
    tmp.flush().map_err(|e| NotaryError::storage("stage_temp", e))?;
    tmp.as_file().sync_all().map_err(|e| NotaryError::storage("stage_temp", e))?;
    let tmp_path = tmp.into_temp_path();
    harden_file(&tmp_path)?;
    Ok(tmp_path)
}
