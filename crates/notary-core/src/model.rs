//! The four notary artifact shapes: [`Certificate`], [`Document`],
//! [`Citation`], [`Aem`]. Each is a thin, attribute-checked wrapper over
//! [`Catalog`] — parameters like `$type`, `$tag`, `$version`,
//! `$permissions`, `$previous` are modeled as ordinary catalog attributes
//! alongside the rest, since the attribute/parameter split belongs to the
//! external value framework and the distinction isn't load-bearing for
//! anything this crate does with them.

use crate::value::{Binary, Catalog, Moment, Name, Tag, Value, Version};

/// The sentinel digest value marking the first certificate's `$previous`
/// slot: a proto-citation with no tag, version, or digest of its own.
pub fn proto_citation() -> Value {
    Value::None
}

/// `{$type, $protocol, $timestamp, $accountId, $publicKey, $tag, $version,
/// $permissions, $previous}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Certificate(Catalog);

impl Certificate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        protocol: &str,
        account_id: Tag,
        public_key: Binary,
        tag: Tag,
        version: Version,
        permissions: Name,
        previous: Value,
    ) -> Self {
        let catalog = Catalog::new()
            .with("$type", Value::Name(Name::new(format!("/bali/notary/Certificate/{protocol}"))))
            .with("$protocol", Value::Text(protocol.to_string()))
            .with("$timestamp", Value::Moment(Moment::now()))
            .with("$accountId", Value::Tag(account_id))
            .with("$publicKey", Value::Binary(public_key))
            .with("$tag", Value::Tag(tag))
            .with("$version", Value::Version(version))
            .with("$permissions", Value::Name(permissions))
            .with("$previous", previous);
        Certificate(catalog)
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Certificate(catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.0
    }

    pub fn into_catalog(self) -> Catalog {
        self.0
    }

    pub fn public_key(&self) -> Option<&Binary> {
        self.0.get("$publicKey").and_then(Value::as_binary)
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.0.get("$tag").and_then(Value::as_tag)
    }

    pub fn version(&self) -> Option<Version> {
        self.0.get("$version").and_then(Value::as_version)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.0.get("$protocol").and_then(Value::as_text)
    }

    pub fn previous(&self) -> Option<&Value> {
        self.0.get("$previous")
    }
}

/// `{$type, $component, $protocol, $timestamp, $certificate, $signature}`.
/// A certificate-document's `$component` is itself a [`Certificate`]
/// catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Document(Catalog);

impl Document {
    pub fn new(protocol: &str, component: Value, certificate: Value) -> Self {
        let catalog = Catalog::new()
            .with("$type", Value::Name(Name::new(format!("/bali/notary/Document/{protocol}"))))
            .with("$component", component)
            .with("$protocol", Value::Text(protocol.to_string()))
            .with("$timestamp", Value::Moment(Moment::now()))
            .with("$certificate", certificate);
        Document(catalog)
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Document(catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.0
    }

    pub fn into_catalog(self) -> Catalog {
        self.0
    }

    /// Attach a computed signature, consuming the unsigned draft.
    pub fn with_signature(mut self, signature: Binary) -> Self {
        self.0 = self.0.with("$signature", Value::Binary(signature));
        self
    }

    /// Canonical bytes covering every attribute except `$signature` — what
    /// gets signed, and what verification recomputes.
    pub fn signable_bytes(&self) -> Vec<u8> {
        self.0.without("$signature").canonical_bytes()
    }

    pub fn signature(&self) -> Option<&Binary> {
        self.0.get("$signature").and_then(Value::as_binary)
    }

    pub fn component(&self) -> Option<&Value> {
        self.0.get("$component")
    }

    pub fn certificate_citation(&self) -> Option<&Value> {
        self.0.get("$certificate")
    }

    pub fn protocol(&self) -> Option<&str> {
        self.0.get("$protocol").and_then(Value::as_text)
    }
}

/// `{$type, $protocol, $timestamp, $tag, $version, $digest}`. A citation
/// with `$digest == Value::None` is the proto-citation sentinel used only
/// in the first certificate's `$previous` slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Citation(Catalog);

impl Citation {
    pub fn new(protocol: &str, tag: Tag, version: Version, digest: Binary) -> Self {
        let catalog = Catalog::new()
            .with("$type", Value::Name(Name::new(format!("/bali/notary/Citation/{protocol}"))))
            .with("$protocol", Value::Text(protocol.to_string()))
            .with("$timestamp", Value::Moment(Moment::now()))
            .with("$tag", Value::Tag(tag))
            .with("$version", Value::Version(version))
            .with("$digest", Value::Binary(digest));
        Citation(catalog)
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Citation(catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.0
    }

    pub fn into_catalog(self) -> Catalog {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Catalog(self.0)
    }

    pub fn digest(&self) -> Option<&Binary> {
        self.0.get("$digest").and_then(Value::as_binary)
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.0.get("$tag").and_then(Value::as_tag)
    }

    pub fn version(&self) -> Option<Version> {
        self.0.get("$version").and_then(Value::as_version)
    }
}

/// `{$type, $protocol, $timestamp, $seed, $iv, $auth, $ciphertext}`.
/// `$seed` is the ephemeral ECDH public key.
#[derive(Clone, Debug, PartialEq)]
pub struct Aem(Catalog);

impl Aem {
    pub fn new(protocol: &str, seed: Binary, iv: Binary, auth: Binary, ciphertext: Binary) -> Self {
        let catalog = Catalog::new()
            .with("$type", Value::Name(Name::new(format!("/bali/notary/AEM/{protocol}"))))
            .with("$protocol", Value::Text(protocol.to_string()))
            .with("$timestamp", Value::Moment(Moment::now()))
            .with("$seed", Value::Binary(seed))
            .with("$iv", Value::Binary(iv))
            .with("$auth", Value::Binary(auth))
            .with("$ciphertext", Value::Binary(ciphertext));
        Aem(catalog)
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Aem(catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.0
    }

    pub fn protocol(&self) -> Option<&str> {
        self.0.get("$protocol").and_then(Value::as_text)
    }

    pub fn seed(&self) -> Option<&Binary> {
        self.0.get("$seed").and_then(Value::as_binary)
    }

    pub fn iv(&self) -> Option<&Binary> {
        self.0.get("$iv").and_then(Value::as_binary)
    }

    pub fn auth(&self) -> Option<&Binary> {
        self.0.get("$auth").and_then(Value::as_binary)
    }

    pub fn ciphertext(&self) -> Option<&Binary> {
        self.0.get("$ciphertext").and_then(Value::as_binary)
    }
}
