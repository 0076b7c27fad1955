//! Bootstrap registration of the schemes shipped with the crate.
//!
//! | Identifier  | Capabilities     | Construction                              |
//! |-------------|------------------|-------------------------------------------|
//! | `aead`      | encrypt, decrypt | AES-256-GCM, random nonce                 |
//! | `secretbox` | encrypt, decrypt | NaCl XSalsa20-Poly1305, random nonce      |
//! | `xchacha`   | encrypt, decrypt | XChaCha20-Poly1305, random nonce          |
//! | `dae`       | encrypt, decrypt | AES-256-GCM, HMAC-SHA256 synthetic nonce  |
//! | `raw`       | sign, verify     | Ed25519, signature prepended to message   |
//!
//! `aead`, `dae` and `xchacha` bind their identifier as associated data, so a
//! payload presented under another scheme's prefix fails authentication.

pub mod aead;
pub mod dae;
pub mod raw;
pub mod secretbox;
pub mod xchacha;

use crate::error::{BundleError, Result};
use crate::key::{KeyMaterial, SYMMETRIC_KEY_LENGTH};
use crate::scheme::registry::{RegistryBuilder, SchemeRegistry};
use rand::rngs::OsRng;
use rand::RngCore;

/// Register every built-in scheme on `builder`.
pub fn register_builtin(builder: &mut RegistryBuilder) -> Result<()> {
    aead::register(builder)?;
    secretbox::register(builder)?;
    xchacha::register(builder)?;
    dae::register(builder)?;
    raw::register(builder)?;
    Ok(())
}

/// Registry holding only the built-in schemes.
pub fn default_registry() -> Result<SchemeRegistry> {
    let mut builder = RegistryBuilder::new();
    register_builtin(&mut builder)?;
    Ok(builder.build())
}

/// Fresh key material for a built-in scheme
pub struct GeneratedKey {
    /// Key used to encrypt, decrypt or sign.
    pub secret: KeyMaterial,
    /// Verification key, for signature schemes only.
    pub public: Option<KeyMaterial>,
}

/// Generate key material suitable for the built-in scheme `identifier`.
pub fn generate_key(identifier: &str) -> Result<GeneratedKey> {
    match identifier {
        aead::IDENTIFIER | secretbox::IDENTIFIER | xchacha::IDENTIFIER | dae::IDENTIFIER => {
            Ok(GeneratedKey {
                secret: KeyMaterial::generate(SYMMETRIC_KEY_LENGTH),
                public: None,
            })
        }
        raw::IDENTIFIER => {
            let (secret, public) = raw::generate_keypair();
            Ok(GeneratedKey {
                secret,
                public: Some(public),
            })
        }
        other => Err(BundleError::InvalidArgument(format!(
            "no key generator for scheme '{}'",
            other
        ))),
    }
}

pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
