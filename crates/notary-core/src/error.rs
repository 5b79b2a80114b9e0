//! Closed error taxonomy.
//!
//! Validation failures — a bad signature, a mismatched digest — are never
//! errors here; they come back as `false` from `documentValid` /
//! `citationMatches`. What lands in `NotaryError` is structural: malformed
//! input, a security module in the wrong state, an unregistered protocol, a
//! storage failure. Every error names the module and operation that raised
//! it, and never carries the private key.

use std::fmt;

/// The kind of failure, independent of where it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("component is missing required parameters or has the wrong shape")]
    MalformedComponent,
    #[error("operation requires an active security module")]
    UninitializedKey,
    #[error("security module already initialized; use rotateKey")]
    AlreadyInitialized,
    #[error("protocol not present in the registry")]
    UnsupportedProtocol,
    #[error("authentication tag did not verify")]
    AuthenticationFailed,
    #[error("underlying storage operation failed")]
    StorageError,
    #[error("platform cannot enforce the required file permissions")]
    UnsupportedPlatform,
}

/// A notary operation failure: which module, which operation, what kind, and
/// an optional underlying cause. Never contains key material.
#[derive(Debug, thiserror::Error)]
pub struct NotaryError {
    pub module: &'static str,
    pub operation: &'static str,
    pub kind: ErrorKind,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl NotaryError {
    pub fn new(module: &'static str, operation: &'static str, kind: ErrorKind) -> Self {
        NotaryError { module, operation, kind, cause: None }
    }

    pub fn with_cause(
        module: &'static str,
        operation: &'static str,
        kind: ErrorKind,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        NotaryError { module, operation, kind, cause: Some(Box::new(cause)) }
    }

    pub fn storage(operation: &'static str, cause: std::io::Error) -> Self {
        Self::with_cause("keystore", operation, ErrorKind::StorageError, cause)
    }
}

impl fmt::Display for NotaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.module, self.operation, self.kind)
    }
}

pub type Result<T> = std::result::Result<T, NotaryError>;
