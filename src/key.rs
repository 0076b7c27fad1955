//! Opaque key material handed to scheme factories.
//!
//! Key bytes never implement `Display` or `Serialize`; `Debug` only shows a
//! length and a short BLAKE3 fingerprint, which is also what log lines use.

use crate::error::{BundleError, Result, SchemeFailure};
use crate::scheme::Capability;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the symmetric keys used by the built-in schemes.
pub const SYMMETRIC_KEY_LENGTH: usize = 32;

/// Secret key bytes, zeroed from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Generate `len` random bytes from the OS CSPRNG.
    pub fn generate(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Decode key material from standard or URL-safe base64 text.
    ///
    /// The rejected text is never echoed in the error.
    pub fn from_base64(text: &str) -> Result<Self> {
        let text = text.trim();
        STANDARD
            .decode(text)
            .or_else(|_| URL_SAFE_NO_PAD.decode(text))
            .map(Self::from_bytes)
            .map_err(|_| BundleError::InvalidArgument("key material is not valid base64".into()))
    }

    /// Encode as standard base64, for key generation output only.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the key as a fixed-size array, as the primitives expect.
    pub fn as_array<const N: usize>(&self) -> std::result::Result<&[u8; N], SchemeFailure> {
        self.bytes
            .as_slice()
            .try_into()
            .map_err(|_| SchemeFailure::InvalidKeyLength {
                expected: N,
                actual: self.bytes.len(),
            })
    }

    /// Short, non-reversible identifier safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = blake3::hash(&self.bytes);
        hex::encode(&digest.as_bytes()[..6])
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Key material indexed by scheme identifier.
#[derive(Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<String, KeyMaterial>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the key for a scheme.
    pub fn insert(&mut self, scheme: impl Into<String>, key: KeyMaterial) -> Option<KeyMaterial> {
        self.keys.insert(scheme.into(), key)
    }

    pub fn with(mut self, scheme: impl Into<String>, key: KeyMaterial) -> Self {
        self.insert(scheme, key);
        self
    }

    pub fn get(&self, scheme: &str) -> Option<&KeyMaterial> {
        self.keys.get(scheme)
    }

    /// Like [`KeyRing::get`] but reports a missing key as an error.
    pub fn require(&self, scheme: &str) -> Result<&KeyMaterial> {
        self.get(scheme)
            .ok_or_else(|| BundleError::MissingKey(scheme.to_string()))
    }

    /// Key to use for `capability` of `scheme`.
    ///
    /// Verification prefers a `<scheme>.pub` entry so one ring can hold both
    /// halves of a signing pair; every other capability uses `<scheme>`.
    pub fn require_for(&self, scheme: &str, capability: Capability) -> Result<&KeyMaterial> {
        if capability == Capability::Verify {
            if let Some(public) = self.get(&public_entry(scheme)) {
                return Ok(public);
            }
        }
        self.require(scheme)
    }

    /// Merge `other` into `self`, `other` wins on conflicts.
    pub fn extend(&mut self, other: KeyRing) {
        for (scheme, key) in other.keys {
            self.keys.insert(scheme, key);
        }
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Suffix of key ring entries holding a verification key
pub const PUBLIC_SUFFIX: &str = ".pub";

/// Key ring entry holding the verification key of a signature scheme.
pub fn public_entry(scheme: &str) -> String {
    format!("{}{}", scheme, PUBLIC_SUFFIX)
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.keys.iter().map(|(k, v)| (k, v.fingerprint())))
            .finish()
    }
}
