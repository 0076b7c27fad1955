//! `secretbox`: NaCl `crypto_secretbox` (XSalsa20-Poly1305) with a random
//! 192-bit nonce.
//!
//! ```text
//! payload = nonce (24) || tag (16) || ciphertext
//! ```
//!
//! The box format has no associated data, so unlike the other encryption
//! schemes the identifier is not authenticated.

use super::random_bytes;
use crate::error::{Result, SchemeFailure};
use crate::key::{KeyMaterial, SYMMETRIC_KEY_LENGTH};
use crate::scheme::registry::{Capability, RegistryBuilder, Transformer};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;

pub const IDENTIFIER: &str = "secretbox";

pub const NONCE_LENGTH: usize = 24;
pub const TAG_LENGTH: usize = 16;

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register(IDENTIFIER, Capability::Encrypt, |key: &KeyMaterial| {
        Ok(Box::new(SecretBox::new(key)?) as Box<dyn Transformer>)
    })?;
    builder.register(IDENTIFIER, Capability::Decrypt, |key: &KeyMaterial| {
        Ok(Box::new(Opener(SecretBox::new(key)?)) as Box<dyn Transformer>)
    })?;
    Ok(())
}

struct SecretBox {
    cipher: XSalsa20Poly1305,
}

impl SecretBox {
    fn new(key: &KeyMaterial) -> std::result::Result<Self, SchemeFailure> {
        let bytes = key.as_array::<SYMMETRIC_KEY_LENGTH>()?;
        let cipher = XSalsa20Poly1305::new_from_slice(bytes).map_err(|_| SchemeFailure::InvalidKey)?;
        Ok(Self { cipher })
    }

    fn seal(&self, plaintext: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        let nonce = random_bytes::<NONCE_LENGTH>();
        let boxed = self
            .cipher
            .encrypt(&nonce.into(), plaintext)
            .map_err(|_| SchemeFailure::Primitive("XSalsa20-Poly1305 encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + boxed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&boxed);
        Ok(out)
    }

    fn open(&self, payload: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        if payload.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(SchemeFailure::Truncated {
                minimum: NONCE_LENGTH + TAG_LENGTH,
                actual: payload.len(),
            });
        }
        let (nonce, boxed) = payload.split_at(NONCE_LENGTH);
        let nonce: [u8; NONCE_LENGTH] = nonce
            .try_into()
            .map_err(|_| SchemeFailure::Primitive("invalid nonce length"))?;

        self.cipher
            .decrypt(&nonce.into(), boxed)
            .map_err(|_| SchemeFailure::AuthenticationFailed)
    }
}

impl Transformer for SecretBox {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        self.seal(input)
    }
}

struct Opener(SecretBox);

impl Transformer for Opener {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        self.0.open(input)
    }
}
