//! Immutable object-identifier name registry
//!
//! A registry maps well-known object identifiers to display names. It is an
//! explicit value built once and passed by reference; there is no mutable
//! global table.

use crate::datatypes::ObjectIdentifier;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Names of well-known identifiers, dotted form first.
const WELL_KNOWN: &[(&str, &str)] = &[
    // PKCS#1
    ("1.2.840.113549.1.1.1", "rsaEncryption"),
    ("1.2.840.113549.1.1.4", "md5WithRsaEncryption"),
    ("1.2.840.113549.1.1.5", "sha1WithRsaEncryption"),
    ("1.2.840.113549.1.1.11", "sha256WithRsaEncryption"),
    // PKCS#7 content types
    ("1.2.840.113549.1.7.1", "data"),
    ("1.2.840.113549.1.7.2", "signedData"),
    ("1.2.840.113549.1.7.3", "envelopedData"),
    ("1.2.840.113549.1.7.6", "encryptedData"),
    // PKCS#9 attributes
    ("1.2.840.113549.1.9.1", "emailAddress"),
    ("1.2.840.113549.1.9.3", "contentType"),
    ("1.2.840.113549.1.9.4", "messageDigest"),
    ("1.2.840.113549.1.9.20", "friendlyName"),
    ("1.2.840.113549.1.9.21", "localKeyId"),
    // Digest algorithms
    ("1.2.840.113549.2.5", "md5"),
    ("1.3.14.3.2.26", "sha1"),
    ("2.16.840.1.101.3.4.2.1", "sha256"),
    // X.500 attribute types
    ("2.5.4.3", "commonName"),
    ("2.5.4.6", "countryName"),
    ("2.5.4.7", "localityName"),
    ("2.5.4.8", "stateOrProvinceName"),
    ("2.5.4.10", "organizationName"),
    ("2.5.4.11", "organizationalUnitName"),
    // X.509 extensions
    ("2.5.29.14", "subjectKeyIdentifier"),
    ("2.5.29.15", "keyUsage"),
    ("2.5.29.17", "subjectAlternativeName"),
    ("2.5.29.19", "basicConstraints"),
    ("2.5.29.35", "authorityKeyIdentifier"),
    // Elliptic curves
    ("1.2.840.10045.2.1", "ecPublicKey"),
    ("1.2.840.10045.3.1.7", "prime256v1"),
    ("1.3.132.0.10", "secp256k1"),
    ("1.3.132.0.34", "secp384r1"),
    ("1.3.36.3.3.2.8.1.1.7", "brainpoolP256r1"),
];

static WELL_KNOWN_REGISTRY: Lazy<OidRegistry> = Lazy::new(|| {
    let mut registry = OidRegistry::new();
    for (dotted, name) in WELL_KNOWN {
        if let Ok(oid) = ObjectIdentifier::from_string(dotted) {
            registry.insert(oid, name);
        }
    }
    registry
});

/// Immutable lookup table from object identifier to display name.
#[derive(Debug, Clone, Default)]
pub struct OidRegistry {
    names: HashMap<ObjectIdentifier, String>,
}

impl OidRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Add an entry, builder style.
    pub fn with_entry(mut self, oid: ObjectIdentifier, name: &str) -> Self {
        self.insert(oid, name);
        self
    }

    fn insert(&mut self, oid: ObjectIdentifier, name: &str) {
        self.names.insert(oid, name.to_string());
    }

    /// Look up the display name of an identifier.
    pub fn name_of(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.names.get(oid).map(String::as_str)
    }

    /// The number of entries in the registry.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The registry of well-known identifiers, built once on first use.
    pub fn well_known() -> &'static OidRegistry {
        &WELL_KNOWN_REGISTRY
    }
}
