//! Protocol registry: maps a protocol version string to the
//! [`AlgorithmSuite`] that implements it.
//!
//! Suites are registered up front by a closed set of known versions; a
//! version string resolves to exactly one suite or is refused.

use std::collections::BTreeMap;

use crate::error::{ErrorKind, NotaryError, Result};
use crate::suite::{AlgorithmSuite, SuiteV1};

/// A closed set of algorithm suites, keyed by protocol version string.
///
/// `BTreeMap` keeps versions sorted so [`ProtocolRegistry::preferred`] can
/// pick the lexicographically greatest key without a separate pass.
pub struct ProtocolRegistry {
    suites: BTreeMap<&'static str, Box<dyn AlgorithmSuite>>,
}

impl ProtocolRegistry {
    /// The registry this crate ships: `v1` only.
    pub fn standard() -> Self {
        let mut registry = ProtocolRegistry { suites: BTreeMap::new() };
        registry.register(Box::new(SuiteV1::new()));
        registry
    }

    pub fn empty() -> Self {
        ProtocolRegistry { suites: BTreeMap::new() }
    }

    pub fn register(&mut self, suite: Box<dyn AlgorithmSuite>) {
        self.suites.insert(suite.protocol(), suite);
    }

    pub fn get(&self, protocol: &str) -> Result<&dyn AlgorithmSuite> {
        self.suites
            .get(protocol)
            .map(|b| b.as_ref())
            .ok_or_else(|| NotaryError::new("registry", "get", ErrorKind::UnsupportedProtocol))
    }

    /// The protocol a newly generated key or certificate should use: the
    /// highest registered version string. Notaries negotiating a shared
    /// protocol for an exchange use the same rule independently, so no
    /// coordination is required for both sides to agree.
    pub fn preferred(&self) -> Result<&'static str> {
        self.suites
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| NotaryError::new("registry", "preferred", ErrorKind::UnsupportedProtocol))
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
