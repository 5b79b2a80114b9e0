//! The software security module: the sole holder of the notary's private
//! key, in any given process.
//!
//! This is an explicit, caller-owned value whose lifetime bounds the
//! private key's lifetime — the key is zeroed the moment it is forgotten or
//! this value is dropped, using `secrecy::Secret` for that guarantee rather
//! than a hand-rolled zeroizing wrapper.
//!
//! `SoftwareSecurityModule` implements the same contract an HSM-backed
//! module eventually would (see the `hsm` feature flag in `Cargo.toml`); the
//! `Notary` core in [`crate::notary`] is polymorphic over the trait in
//! [`crate::suite`] but not over this struct directly — that seam is left
//! for the `hsm` feature to fill in with its own type implementing the same
//! five operations.

use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use tracing::{info, instrument, warn};

use crate::error::{ErrorKind, NotaryError, Result};
use crate::keystore::Keystore;
use crate::model::{Aem, Certificate, Citation, Document};
use crate::registry::ProtocolRegistry;
use crate::value::{Binary, Catalog, Moment, Name, Tag, Value, Version};

/// The permissions every certificate this module mints carries, absent a
/// caller override. Rotation always resets to this value rather than
/// preserving whatever the caller last supplied.
pub const DEFAULT_PERMISSIONS: &str = "/bali/permissions/public/v1";

struct ActiveKey {
    private_key: Secret<Vec<u8>>,
    protocol: &'static str,
    tag: Tag,
    version: Version,
    certificate: Document,
    citation: Citation,
}

enum State {
    Uninitialized,
    Active(ActiveKey),
}

/// Software reference implementation of the security-module contract. One
/// instance owns one account's key material; two instances must never
/// point at the same [`Keystore`] directory (single-writer only).
pub struct SoftwareSecurityModule {
    account_id: Tag,
    keystore: Keystore,
    registry: Arc<ProtocolRegistry>,
    state: State,
}

impl SoftwareSecurityModule {
    pub fn new(account_id: Tag, keystore: Keystore, registry: Arc<ProtocolRegistry>) -> Self {
        SoftwareSecurityModule { account_id, keystore, registry, state: State::Uninitialized }
    }

    /// Load any key and certificate already persisted under this module's
    /// keystore. Calling this twice is a no-op the second time — the module
    /// is already `Active` and re-reading the files would be wasted I/O,
    /// not a correctness requirement.
    #[instrument(skip(self), fields(account = %self.account_id))]
    pub fn initialize(&mut self) -> Result<()> {
        if matches!(self.state, State::Active(_)) {
            return Ok(());
        }
        if !self.keystore.exists() {
            info!("no persisted key; staying uninitialized");
            return Ok(());
        }
        let key_catalog = Catalog::parse(&self.keystore.load_key()?)?;
        let cert_catalog = Catalog::parse(&self.keystore.load_certificate()?)?;
        let certificate_document = Document::from_catalog(cert_catalog);

        let protocol = key_catalog
            .get("$protocol")
            .and_then(Value::as_text)
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?;
        let private_key = key_catalog
            .get("$privateKey")
            .and_then(Value::as_binary)
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?
            .0
            .clone();

        // The citation to this very certificate was computed once, at
        // generation/rotation time, and persisted alongside the key; reread
        // it rather than recomputing, so `initialize` stays idempotent
        // instead of minting a fresh `$timestamp` on every call.
        let citation = key_catalog
            .get("$certificate")
            .and_then(Value::as_catalog)
            .map(|c| Citation::from_catalog(c.clone()))
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?;
        let tag = citation
            .tag()
            .cloned()
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?;
        let version = citation
            .version()
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?;
        // Resolved through the registry (rather than kept as the borrowed
        // `&str` from `key_catalog`) so `ActiveKey::protocol` can hold the
        // suite's own `&'static str` instead of borrowing a local value.
        let suite = self.registry.get(protocol)?;
        let protocol = suite.protocol();

        // The two files are persisted as a rename pair, not a single
        // kernel-atomic commit, so a crash between the two renames can
        // leave a new private key paired with the stale certificate on
        // disk. Catch that here rather than trusting the pair silently: the
        // certificate's published public key must match the one the loaded
        // private key actually derives.
        let certificate_public_key = certificate_document
            .component()
            .and_then(Value::as_catalog)
            .and_then(|c| c.get("$publicKey"))
            .and_then(Value::as_binary)
            .ok_or_else(|| NotaryError::new("ssm", "initialize", ErrorKind::MalformedComponent))?;
        let derived_public_key = suite.derive_public(&private_key)?;
        if derived_public_key != certificate_public_key.0 {
            return Err(NotaryError::new("ssm", "initialize", ErrorKind::StorageError));
        }

        self.state = State::Active(ActiveKey {
            private_key: Secret::new(private_key),
            protocol,
            tag,
            version,
            certificate: certificate_document,
            citation,
        });
        info!(tag = %self.state_tag(), "security module initialized");
        Ok(())
    }

    fn state_tag(&self) -> String {
        match &self.state {
            State::Active(a) => a.tag.to_string(),
            State::Uninitialized => "<none>".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    pub fn certificate(&self) -> Option<Document> {
        match &self.state {
            State::Active(a) => Some(a.certificate.clone()),
            State::Uninitialized => None,
        }
    }

    pub fn citation(&self) -> Option<Citation> {
        match &self.state {
            State::Active(a) => Some(a.citation.clone()),
            State::Uninitialized => None,
        }
    }

    /// Mint the first certificate. Fails with [`ErrorKind::AlreadyInitialized`]
    /// if a key already exists — callers rotating an existing key must call
    /// [`Self::rotate_key`] instead.
    #[instrument(skip(self), fields(account = %self.account_id))]
    pub fn generate_key(&mut self) -> Result<Document> {
        if matches!(self.state, State::Active(_)) {
            return Err(NotaryError::new("ssm", "generate_key", ErrorKind::AlreadyInitialized));
        }
        self.generate_or_rotate()
    }

    /// Replace the active key with a fresh one, chaining the new
    /// certificate to the old one via `$previous` and signing it with the
    /// *old* key — anyone who only trusts the old certificate must be able
    /// to verify the rotation.
    #[instrument(skip(self), fields(account = %self.account_id))]
    pub fn rotate_key(&mut self) -> Result<Document> {
        if !matches!(self.state, State::Active(_)) {
            return Err(NotaryError::new("ssm", "rotate_key", ErrorKind::UninitializedKey));
        }
        self.generate_or_rotate()
    }

    fn generate_or_rotate(&mut self) -> Result<Document> {
        let is_rotation = matches!(self.state, State::Active(_));
        let new_protocol = self.registry.preferred()?;
        let new_suite = self.registry.get(new_protocol)?;
        let new_keys = new_suite.keypair();

        let (tag, version, previous, signing_key, signing_protocol) = match &self.state {
            State::Active(active) => (
                active.tag.clone(),
                active.version.next(),
                active.citation.clone().into_value(),
                active.private_key.expose_secret().clone(),
                active.protocol,
            ),
            State::Uninitialized => {
                (Tag::random(), Version::initial(), Value::None, new_keys.private_key.clone(), new_protocol)
            }
        };

        let certificate = Certificate::new(
            new_protocol,
            self.account_id.clone(),
            Binary(new_keys.public_key.clone()),
            tag.clone(),
            version,
            Name::new(DEFAULT_PERMISSIONS),
            previous.clone(),
        );
        let document = Document::new(new_protocol, Value::Catalog(certificate.into_catalog()), previous);

        let signing_suite = self.registry.get(signing_protocol)?;
        let signable = document.signable_bytes();
        let signature = signing_suite.sign(&signing_key, &signable)?;
        let signed_document = document.with_signature(Binary(signature));

        let digest = new_suite.digest(&signed_document.catalog().canonical_bytes());
        let new_citation = Citation::new(new_protocol, tag.clone(), version, Binary(digest));

        let key_record = build_key_record(
            new_protocol,
            &self.account_id,
            &Binary(new_keys.public_key.clone()),
            &Binary(new_keys.private_key.clone()),
            new_citation.clone().into_value(),
        );
        self.keystore
            .save_key_and_certificate(&key_record.canonical_bytes(), &signed_document.catalog().canonical_bytes())?;

        if let State::Active(old) = std::mem::replace(&mut self.state, State::Uninitialized) {
            drop(old);
        }
        self.state = State::Active(ActiveKey {
            private_key: Secret::new(new_keys.private_key),
            protocol: new_protocol,
            tag,
            version,
            certificate: signed_document.clone(),
            citation: new_citation,
        });

        if is_rotation {
            info!(version = %version, "notary key rotated");
        } else {
            info!(version = %version, "notary key generated");
        }
        Ok(signed_document)
    }

    /// Zero the in-memory key and delete both persisted files. Terminal:
    /// there is no undo.
    #[instrument(skip(self), fields(account = %self.account_id))]
    pub fn forget_key(&mut self) -> Result<()> {
        self.keystore.erase()?;
        if let State::Active(old) = std::mem::replace(&mut self.state, State::Uninitialized) {
            drop(old);
        }
        warn!("notary key forgotten");
        Ok(())
    }

    /// Sign `bytes` with the active private key, using the algorithm suite
    /// that key was generated under.
    pub fn sign(&self, bytes: &[u8]) -> Result<Binary> {
        match &self.state {
            State::Active(active) => {
                let suite = self.registry.get(active.protocol)?;
                let signature = suite.sign(active.private_key.expose_secret(), bytes)?;
                Ok(Binary(signature))
            }
            State::Uninitialized => Err(NotaryError::new("ssm", "sign", ErrorKind::UninitializedKey)),
        }
    }

    /// Decrypt an [`Aem`] addressed to the active key. The suite used is
    /// the one named by the AEM's own `$protocol`, not necessarily the one
    /// the active key was generated under — an old AEM addressed to a key
    /// that has since been superseded by a *different-protocol* rotation
    /// would otherwise become unreadable, and nothing about decrypting an
    /// already-received message requires the two to match.
    pub fn decrypt(&self, aem: &Aem) -> Result<Vec<u8>> {
        match &self.state {
            State::Active(active) => {
                let protocol = aem
                    .protocol()
                    .ok_or_else(|| NotaryError::new("ssm", "decrypt", ErrorKind::MalformedComponent))?;
                let suite = self.registry.get(protocol)?;
                let seed = aem
                    .seed()
                    .ok_or_else(|| NotaryError::new("ssm", "decrypt", ErrorKind::MalformedComponent))?;
                let iv = aem
                    .iv()
                    .ok_or_else(|| NotaryError::new("ssm", "decrypt", ErrorKind::MalformedComponent))?;
                let auth = aem
                    .auth()
                    .ok_or_else(|| NotaryError::new("ssm", "decrypt", ErrorKind::MalformedComponent))?;
                let ciphertext = aem
                    .ciphertext()
                    .ok_or_else(|| NotaryError::new("ssm", "decrypt", ErrorKind::MalformedComponent))?;
                suite.decrypt(active.private_key.expose_secret(), &seed.0, &iv.0, &auth.0, &ciphertext.0)
            }
            State::Uninitialized => Err(NotaryError::new("ssm", "decrypt", ErrorKind::UninitializedKey)),
        }
    }
}

/// `{$type, $protocol, $timestamp, $accountId, $publicKey, $privateKey,
/// $certificate}` — the on-disk `NotaryKey` record.
fn build_key_record(
    protocol: &str,
    account_id: &Tag,
    public_key: &Binary,
    private_key: &Binary,
    certificate_citation: Value,
) -> Catalog {
    Catalog::new()
        .with("$type", Value::Name(Name::new(format!("/bali/notary/NotaryKey/{protocol}"))))
        .with("$protocol", Value::Text(protocol.to_string()))
        .with("$timestamp", Value::Moment(Moment::now()))
        .with("$accountId", Value::Tag(account_id.clone()))
        .with("$publicKey", Value::Binary(public_key.clone()))
        .with("$privateKey", Value::Binary(private_key.clone()))
        .with("$certificate", certificate_citation)
}
