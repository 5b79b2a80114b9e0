//! Digital notary core: binds structured documents to cryptographic
//! identities via detached signatures, content-addresses them with
//! citations, and authenticated-encrypts messages to a recipient's public
//! key.
//!
//! Three things the caller owns and wires together:
//!
//! - [`value::Catalog`] / [`value::Value`] — the structured-document value
//!   framework, here a small reference implementation standing in for the
//!   host application's own.
//! - [`ssm::SoftwareSecurityModule`] — holds one account's private key,
//!   backed by a [`keystore::Keystore`] on disk.
//! - [`notary::NotaryCore`] — stateless orchestration: notarize, cite,
//!   verify, encrypt, decrypt, all taking an SSM or artifact as input.
//!
//! ```no_run
//! use std::sync::Arc;
//! use notary_core::config::NotaryConfig;
//! use notary_core::keystore::Keystore;
//! use notary_core::notary::NotaryCore;
//! use notary_core::registry::ProtocolRegistry;
//! use notary_core::ssm::SoftwareSecurityModule;
//! use notary_core::value::{Catalog, Name, Tag, Value, Version};
//!
//! # fn main() -> notary_core::error::Result<()> {
//! let config = NotaryConfig::default_for_account("alice")?;
//! let registry = Arc::new(ProtocolRegistry::standard());
//! let keystore = Keystore::new(&config.config_dir, &config.account_id);
//! let mut ssm = SoftwareSecurityModule::new(Tag::random(), keystore, registry.clone());
//! ssm.initialize()?;
//! if !ssm.is_active() {
//!     ssm.generate_key()?;
//! }
//!
//! let core = NotaryCore::new(registry);
//! let component = Value::Catalog(
//!     Catalog::new()
//!         .with("$tag", Value::Tag(Tag::random()))
//!         .with("$version", Value::Version(Version::initial()))
//!         .with("$permissions", Value::Name(Name::new("/bali/permissions/public/v1")))
//!         .with("$previous", Value::None),
//! );
//! let document = core.notarize(&ssm, component)?;
//! let certificate = ssm.certificate().unwrap();
//! assert!(core.document_valid(&document, &certificate)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod keystore;
pub mod model;
pub mod notary;
pub mod registry;
pub mod ssm;
pub mod suite;
pub mod value;

pub use config::NotaryConfig;
pub use error::{ErrorKind, NotaryError, Result};
pub use keystore::Keystore;
pub use model::{Aem, Certificate, Citation, Document};
pub use notary::NotaryCore;
pub use registry::ProtocolRegistry;
pub use ssm::SoftwareSecurityModule;
pub use suite::{AlgorithmSuite, SuiteV1};
