//! Builds and validates notarized documents, citations, and AEMs,
//! orchestrating a [`SoftwareSecurityModule`] and the [`ProtocolRegistry`]
//! to do it. Stateless itself — every operation takes the SSM or the
//! relevant artifacts as arguments, an explicit caller-owned object rather
//! than a singleton.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use crate::error::{ErrorKind, NotaryError, Result};
use crate::model::{Aem, Citation, Document};
use crate::registry::ProtocolRegistry;
use crate::ssm::SoftwareSecurityModule;
use crate::value::{Binary, Value};

const REQUIRED_COMPONENT_PARAMETERS: [&str; 4] = ["$tag", "$version", "$permissions", "$previous"];

/// Orchestrates signing, citing, and verifying notary artifacts. Carries no
/// key material itself — that stays inside whichever [`SoftwareSecurityModule`]
/// is passed to [`NotaryCore::notarize`] / [`NotaryCore::decrypt_component`].
pub struct NotaryCore {
    registry: Arc<ProtocolRegistry>,
}

impl NotaryCore {
    pub fn new(registry: Arc<ProtocolRegistry>) -> Self {
        NotaryCore { registry }
    }

    /// Wrap `component` in a signed [`Document`] envelope under the SSM's
    /// current key, using the registry's preferred protocol. Fails with
    /// [`ErrorKind::MalformedComponent`] if `component` is missing any of
    /// `$tag`, `$version`, `$permissions`, `$previous`; fails
    /// with [`ErrorKind::UninitializedKey`] if `ssm` has no active key.
    #[instrument(skip(self, ssm, component))]
    pub fn notarize(&self, ssm: &SoftwareSecurityModule, component: Value) -> Result<Document> {
        validate_component(&component)?;
        let certificate_citation = ssm
            .citation()
            .map(Citation::into_value)
            .ok_or_else(|| NotaryError::new("notary", "notarize", ErrorKind::UninitializedKey))?;
        let protocol = self.registry.preferred()?;

        let document = Document::new(protocol, component, certificate_citation);
        let signature = ssm.sign(&document.signable_bytes())?;
        Ok(document.with_signature(signature))
    }

    /// Digest `document`'s canonical bytes and build a [`Citation`] to it,
    /// under the protocol `document` itself declares.
    pub fn cite(&self, document: &Document) -> Result<Citation> {
        let protocol = document
            .protocol()
            .ok_or_else(|| NotaryError::new("notary", "cite", ErrorKind::MalformedComponent))?;
        let suite = self.registry.get(protocol)?;
        let digest = suite.digest(&document.catalog().canonical_bytes());

        let component_catalog = document
            .component()
            .and_then(Value::as_catalog)
            .ok_or_else(|| NotaryError::new("notary", "cite", ErrorKind::MalformedComponent))?;
        let tag = component_catalog
            .get("$tag")
            .and_then(Value::as_tag)
            .cloned()
            .ok_or_else(|| NotaryError::new("notary", "cite", ErrorKind::MalformedComponent))?;
        let version = component_catalog
            .get("$version")
            .and_then(Value::as_version)
            .ok_or_else(|| NotaryError::new("notary", "cite", ErrorKind::MalformedComponent))?;

        Ok(Citation::new(protocol, tag, version, Binary(digest)))
    }

    /// Recompute `document`'s citation and compare its digest to
    /// `citation`'s, in constant time.
    pub fn citation_matches(&self, citation: &Citation, document: &Document) -> Result<bool> {
        let recomputed = self.cite(document)?;
        let (Some(expected), Some(actual)) = (citation.digest(), recomputed.digest()) else {
            return Ok(false);
        };
        Ok(bool::from(expected.0.ct_eq(&actual.0)))
    }

    /// Verify `document`'s signature against the public key published in
    /// `certificate`'s component. Returns `false` for every
    /// recoverable mismatch — a bad signature is evidence, not a fault —
    /// and only errors if `document`'s declared protocol isn't registered.
    #[instrument(skip(self, document, certificate))]
    pub fn document_valid(&self, document: &Document, certificate: &Document) -> Result<bool> {
        let Some(protocol) = document.protocol() else {
            return Ok(false);
        };
        let suite = self.registry.get(protocol)?;

        let Some(signature) = document.signature() else {
            return Ok(false);
        };
        let Some(public_key) = certificate
            .component()
            .and_then(Value::as_catalog)
            .and_then(|c| c.get("$publicKey"))
            .and_then(Value::as_binary)
        else {
            return Ok(false);
        };

        let valid = suite.verify(&public_key.0, &document.signable_bytes(), &signature.0);
        if !valid {
            warn!(protocol, "signature did not verify");
        }
        Ok(valid)
    }

    /// Chain validation is just [`Self::document_valid`] applied to two
    /// adjacent certificate documents: `child` must verify under
    /// `parent`'s public key. The core keeps no trust store — callers pin
    /// certificates by citation themselves.
    pub fn chain_valid(&self, child_certificate: &Document, parent_certificate: &Document) -> Result<bool> {
        self.document_valid(child_certificate, parent_certificate)
    }

    /// Encrypt `component` for whoever holds the private key behind
    /// `certificate`'s public key, using the registry's preferred protocol.
    pub fn encrypt_component(&self, component: &Value, certificate: &Document) -> Result<Aem> {
        let protocol = self.registry.preferred()?;
        let suite = self.registry.get(protocol)?;
        let public_key = certificate
            .component()
            .and_then(Value::as_catalog)
            .and_then(|c| c.get("$publicKey"))
            .and_then(Value::as_binary)
            .ok_or_else(|| NotaryError::new("notary", "encrypt_component", ErrorKind::MalformedComponent))?;

        let plaintext = component.canonical_bytes();
        let encrypted = suite.encrypt(&public_key.0, &plaintext)?;
        Ok(Aem::new(
            protocol,
            Binary(encrypted.ephemeral_public),
            Binary(encrypted.iv),
            Binary(encrypted.auth),
            Binary(encrypted.ciphertext),
        ))
    }

    /// Decrypt `aem` via `ssm`. Fails with [`ErrorKind::UnsupportedProtocol`]
    /// if the AEM's declared protocol isn't the registry's current
    /// preferred one — "current protocol" is taken to mean the preferred
    /// protocol, not whatever protocol `ssm`'s active key happens to use.
    pub fn decrypt_component(&self, ssm: &SoftwareSecurityModule, aem: &Aem) -> Result<Value> {
        let protocol = aem
            .protocol()
            .ok_or_else(|| NotaryError::new("notary", "decrypt_component", ErrorKind::MalformedComponent))?;
        let preferred = self.registry.preferred()?;
        if protocol != preferred {
            return Err(NotaryError::new("notary", "decrypt_component", ErrorKind::UnsupportedProtocol));
        }
        let plaintext = ssm.decrypt(aem)?;
        Value::parse(&plaintext)
    }
}

fn validate_component(component: &Value) -> Result<()> {
    let catalog = component
        .as_catalog()
        .ok_or_else(|| NotaryError::new("notary", "notarize", ErrorKind::MalformedComponent))?;
    for key in REQUIRED_COMPONENT_PARAMETERS {
        if catalog.get(key).is_none() {
            return Err(NotaryError::new("notary", "notarize", ErrorKind::MalformedComponent));
        }
    }
    Ok(())
}
