//! SHA-IN / SHA-OUT signature engine.
//!
//! Both directions of the PSP protocol are protected by the same construction:
//!
//! 1. uppercase every parameter name
//! 2. keep only names in the direction's signable set whose value is non-empty
//! 3. sort the names ordinally
//! 4. concatenate `NAME=value<passphrase>` for each of them
//! 5. hash the UTF-8 bytes and hex-encode the digest in uppercase
//!
//! Outbound requests are signed with the SHA-IN passphrase, inbound
//! confirmations are re-signed with the SHA-OUT passphrase and compared in
//! constant time against the received `SHASIGN`.

use std::collections::{BTreeMap, BTreeSet};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Name of the signature parameter in both directions.
pub const SIGNATURE_PARAMETER: &str = "SHASIGN";

/// Parameters the PSP includes in the SHA-IN digest of an order request.
pub const SHA_IN_PARAMETERS: &[&str] = &[
    "AMOUNT",
    "BRAND",
    "CURRENCY",
    "CN",
    "EMAIL",
    "LANGUAGE",
    "ORDERID",
    "PSPID",
    "TITLE",
    "PM",
    "OWNERZIP",
    "OWNERADDRESS",
    "OWNERADDRESS2",
    "OWNERTOWN",
    "OWNERCTY",
    "ACCEPTURL",
    "DECLINEURL",
    "EXCEPTIONURL",
    "CANCELURL",
    "COM",
    "TP",
];

/// Parameters the PSP includes in the SHA-OUT digest of a confirmation.
pub const SHA_OUT_PARAMETERS: &[&str] = &[
    "ACCEPTANCE",
    "AMOUNT",
    "CARDNO",
    "CN",
    "CURRENCY",
    "IP",
    "NCERROR",
    "ORDERID",
    "PAYID",
    "STATUS",
    "BRAND",
];

/// Hash function applied to the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaAlgorithm {
    /// SHA-1, the PSP's legacy default.
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl ShaAlgorithm {
    /// Hex length of a digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            ShaAlgorithm::Sha1 => 40,
            ShaAlgorithm::Sha256 => 64,
            ShaAlgorithm::Sha512 => 128,
        }
    }

    fn hex_digest(&self, input: &[u8]) -> String {
        match self {
            ShaAlgorithm::Sha1 => hex::encode_upper(Sha1::digest(input)),
            ShaAlgorithm::Sha256 => hex::encode_upper(Sha256::digest(input)),
            ShaAlgorithm::Sha512 => hex::encode_upper(Sha512::digest(input)),
        }
    }
}

/// Fixed set of parameter names eligible for a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableSet(BTreeSet<String>);

impl SignableSet {
    /// Creates a set from parameter names; names are uppercased.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_uppercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    /// The default outbound (SHA-IN) set.
    pub fn sha_in() -> Self {
        Self::new(SHA_IN_PARAMETERS)
    }

    /// The default inbound (SHA-OUT) set.
    pub fn sha_out() -> Self {
        Self::new(SHA_OUT_PARAMETERS)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parameter set keyed by uppercase name, iterated in ordinal key order.
///
/// When two input names collide after uppercasing, the later value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignaturePayload(BTreeMap<String, String>);

impl SignaturePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, uppercasing its name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_uppercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if at least one name in `signable` carries a non-empty value.
    pub fn has_signed_values(&self, signable: &SignableSet) -> bool {
        self.0
            .iter()
            .any(|(name, value)| !value.is_empty() && signable.contains(name))
    }

    /// Builds the string that gets hashed.
    ///
    /// Only names in `signable` with a non-empty value take part.
    pub fn canonical_string(&self, signable: &SignableSet, passphrase: &str) -> String {
        self.0
            .iter()
            .filter(|(name, value)| !value.is_empty() && signable.contains(name))
            .map(|(name, value)| format!("{}={}{}", name, value, passphrase))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for SignaturePayload
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut payload = SignaturePayload::new();
        for (name, value) in iter {
            payload.insert(name, value);
        }
        payload
    }
}

/// Computes the uppercase hex signature of `payload`.
pub fn sign(
    payload: &SignaturePayload,
    signable: &SignableSet,
    passphrase: &str,
    algorithm: ShaAlgorithm,
) -> String {
    algorithm.hex_digest(payload.canonical_string(signable, passphrase).as_bytes())
}

/// Recomputes the signature of `payload` and compares it with `received`.
///
/// The comparison ignores hex case and runs in constant time.
pub fn verify(
    payload: &SignaturePayload,
    received: &str,
    signable: &SignableSet,
    passphrase: &str,
    algorithm: ShaAlgorithm,
) -> bool {
    // A payload with nothing signable hashes the passphrase alone.
    if !payload.has_signed_values(signable) {
        return false;
    }
    let expected = sign(payload, signable, passphrase, algorithm);
    constant_time_compare(
        expected.as_bytes(),
        received.trim().to_ascii_uppercase().as_bytes(),
    )
}

/// Signs or verifies one protocol direction with its own key material.
#[derive(Debug)]
pub struct ShaSigner {
    signable: SignableSet,
    passphrase: SecretString,
    algorithm: ShaAlgorithm,
}

impl ShaSigner {
    pub fn new(signable: SignableSet, passphrase: SecretString, algorithm: ShaAlgorithm) -> Self {
        Self {
            signable,
            passphrase,
            algorithm,
        }
    }

    pub fn signable(&self) -> &SignableSet {
        &self.signable
    }

    pub fn sign(&self, payload: &SignaturePayload) -> String {
        sign(
            payload,
            &self.signable,
            self.passphrase.expose_secret(),
            self.algorithm,
        )
    }

    pub fn verify(&self, payload: &SignaturePayload, received: &str) -> bool {
        verify(
            payload,
            received,
            &self.signable,
            self.passphrase.expose_secret(),
            self.algorithm,
        )
    }
}

/// Performs constant-time comparison of two byte slices.
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
