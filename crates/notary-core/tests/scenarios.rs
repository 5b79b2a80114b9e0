//! End-to-end scenarios and supporting properties, driven through the
//! public `notary_core` API the way a host application would.

use std::sync::Arc;

use notary_core::error::ErrorKind;
use notary_core::notary::NotaryCore;
use notary_core::registry::ProtocolRegistry;
use notary_core::ssm::SoftwareSecurityModule;
use notary_core::value::{Catalog, Name, Tag, Value, Version};
use notary_core::{Certificate, Keystore};

fn harness() -> (tempfile::TempDir, NotaryCore, SoftwareSecurityModule) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProtocolRegistry::standard());
    let core = NotaryCore::new(registry.clone());
    let keystore = Keystore::new(dir.path(), "acct-1");
    let ssm = SoftwareSecurityModule::new(Tag::random(), keystore, registry);
    (dir, core, ssm)
}

fn sample_component(tag: Tag) -> Value {
    Value::Catalog(
        Catalog::new()
            .with("$foo", Value::Text("bar".to_string()))
            .with("$tag", Value::Tag(tag))
            .with("$version", Value::Version(Version::initial()))
            .with("$permissions", Value::Name(Name::new("/bali/permissions/public/v1")))
            .with("$previous", Value::None),
    )
}

/// `generate_key` produces a self-signed genesis certificate at version 1
/// with no predecessor, and it validates against itself.
#[test]
fn genesis_certificate_is_self_signed() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    let genesis = ssm.generate_key().unwrap();

    assert!(genesis.certificate_citation().unwrap().is_none());
    let certificate = Certificate::from_catalog(genesis.component().unwrap().as_catalog().unwrap().clone());
    assert_eq!(certificate.version().unwrap(), Version::initial());
    assert!(certificate.previous().unwrap().is_none());

    assert!(core.document_valid(&genesis, &genesis).unwrap());
}

/// Notarizing a component with the required parameters yields a
/// document that validates against the certificate, with a matching
/// citation.
#[test]
fn notarize_validates_and_cites() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();
    let certificate = ssm.certificate().unwrap();

    let document = core.notarize(&ssm, sample_component(Tag::random())).unwrap();
    assert!(core.document_valid(&document, &certificate).unwrap());

    let citation = core.cite(&document).unwrap();
    assert!(core.citation_matches(&citation, &document).unwrap());
}

/// After rotation, a freshly signed document fails against the old
/// certificate and succeeds against the new one.
#[test]
fn rotation_invalidates_old_certificate_for_new_documents() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();
    let old_certificate = ssm.certificate().unwrap();

    ssm.rotate_key().unwrap();
    let new_certificate = ssm.certificate().unwrap();

    let document = core.notarize(&ssm, sample_component(Tag::random())).unwrap();
    assert!(!core.document_valid(&document, &old_certificate).unwrap());
    assert!(core.document_valid(&document, &new_certificate).unwrap());
}

/// Encrypt/decrypt round-trips exactly; flipping a ciphertext byte
/// fails with `AuthenticationFailed`.
#[test]
fn encrypt_decrypt_round_trip_and_tamper_detection() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();
    let certificate = ssm.certificate().unwrap();

    let message = Value::Text("This is a test...".to_string());
    let aem = core.encrypt_component(&message, &certificate).unwrap();
    let decrypted = core.decrypt_component(&ssm, &aem).unwrap();
    assert_eq!(decrypted, message);

    let mut tampered_catalog = aem.catalog().clone();
    let mut ciphertext = tampered_catalog.get("$ciphertext").and_then(Value::as_binary).unwrap().clone();
    ciphertext.0[0] ^= 0x01;
    tampered_catalog = tampered_catalog.without("$ciphertext").with("$ciphertext", Value::Binary(ciphertext));
    let tampered_aem = notary_core::Aem::from_catalog(tampered_catalog);

    let err = core.decrypt_component(&ssm, &tampered_aem).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthenticationFailed);
}

/// After `forget_key`, `sign` fails and the key file is gone.
#[test]
fn forget_key_is_final() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProtocolRegistry::standard());
    let keystore = Keystore::new(dir.path(), "acct-1");
    let mut ssm = SoftwareSecurityModule::new(Tag::random(), keystore, registry);
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();

    ssm.forget_key().unwrap();
    let err = ssm.sign(b"anything").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UninitializedKey);
    assert!(!dir.path().join("acct-1").join("NotaryKey").exists());
}

/// A component missing `$version` is rejected before any SSM state
/// changes.
#[test]
fn malformed_component_is_rejected_without_side_effects() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();
    let citation_before = ssm.citation().unwrap();

    let catalog = Catalog::new()
        .with("$tag", Value::Tag(Tag::random()))
        .with("$permissions", Value::Name(Name::new("/bali/permissions/public/v1")))
        .with("$previous", Value::None);
    let err = core.notarize(&ssm, Value::Catalog(catalog)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedComponent);

    assert_eq!(ssm.citation().unwrap(), citation_before);
}

/// Property: rotation strictly increases certificate version across any
/// sequence of rotations.
#[test]
fn version_is_strictly_increasing_across_rotations() {
    let (_dir, _core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();

    let mut versions = vec![ssm.certificate().unwrap()];
    for _ in 0..5 {
        versions.push(ssm.rotate_key().unwrap());
    }

    let extracted: Vec<Version> = versions
        .iter()
        .map(|doc| {
            Certificate::from_catalog(doc.component().unwrap().as_catalog().unwrap().clone())
                .version()
                .unwrap()
        })
        .collect();
    for window in extracted.windows(2) {
        assert!(window[1] > window[0]);
    }
}

/// Property: `cite` is deterministic — citing the same bytes twice yields
/// the same digest.
#[test]
fn cite_is_deterministic() {
    let (_dir, core, mut ssm) = harness();
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();
    let document = core.notarize(&ssm, sample_component(Tag::random())).unwrap();

    let a = core.cite(&document).unwrap();
    let b = core.cite(&document).unwrap();
    assert_eq!(a.digest(), b.digest());
}

/// Property: `initialize` is idempotent — a second call against the same
/// directory reproduces the same active certificate.
#[test]
fn initialize_twice_is_equivalent_to_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProtocolRegistry::standard());
    let keystore = Keystore::new(dir.path(), "acct-1");
    let mut ssm = SoftwareSecurityModule::new(Tag::random(), keystore, registry);
    ssm.initialize().unwrap();
    ssm.generate_key().unwrap();

    let before = ssm.certificate().unwrap();
    ssm.initialize().unwrap();
    let after = ssm.certificate().unwrap();
    assert_eq!(before, after);
}

/// A second security module pointed at the same directory recovers the
/// same state a fresh process would see after a restart.
#[test]
fn a_second_instance_recovers_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProtocolRegistry::standard());
    let account = Tag::random();

    let mut first = SoftwareSecurityModule::new(
        account.clone(),
        Keystore::new(dir.path(), "acct-1"),
        registry.clone(),
    );
    first.initialize().unwrap();
    let genesis = first.generate_key().unwrap();
    first.rotate_key().unwrap();
    let rotated = first.certificate().unwrap();

    let mut second = SoftwareSecurityModule::new(account, Keystore::new(dir.path(), "acct-1"), registry);
    second.initialize().unwrap();
    assert_eq!(second.certificate().unwrap(), rotated);
    assert_ne!(second.certificate().unwrap(), genesis);
}
