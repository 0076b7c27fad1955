//! `xchacha`: XChaCha20-Poly1305 with a random 192-bit nonce, bound to its
//! identifier as associated data.
//!
//! ```text
//! payload = nonce (24) || ciphertext || tag (16)
//! ```

use super::random_bytes;
use crate::error::{Result, SchemeFailure};
use crate::key::{KeyMaterial, SYMMETRIC_KEY_LENGTH};
use crate::scheme::registry::{Capability, RegistryBuilder, Transformer};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};

pub const IDENTIFIER: &str = "xchacha";

pub const NONCE_LENGTH: usize = 24;
pub const TAG_LENGTH: usize = 16;

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register(IDENTIFIER, Capability::Encrypt, |key: &KeyMaterial| {
        Ok(Box::new(XChaCha::new(key)?) as Box<dyn Transformer>)
    })?;
    builder.register(IDENTIFIER, Capability::Decrypt, |key: &KeyMaterial| {
        Ok(Box::new(Opener(XChaCha::new(key)?)) as Box<dyn Transformer>)
    })?;
    Ok(())
}

struct XChaCha {
    cipher: XChaCha20Poly1305,
}

impl XChaCha {
    fn new(key: &KeyMaterial) -> std::result::Result<Self, SchemeFailure> {
        let bytes = key.as_array::<SYMMETRIC_KEY_LENGTH>()?;
        let cipher = XChaCha20Poly1305::new_from_slice(bytes).map_err(|_| SchemeFailure::InvalidKey)?;
        Ok(Self { cipher })
    }

    fn seal(&self, plaintext: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        let nonce = random_bytes::<NONCE_LENGTH>();
        let sealed = self
            .cipher
            .encrypt(
                &nonce.into(),
                Payload {
                    msg: plaintext,
                    aad: IDENTIFIER.as_bytes(),
                },
            )
            .map_err(|_| SchemeFailure::Primitive("XChaCha20-Poly1305 encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open(&self, payload: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        if payload.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(SchemeFailure::Truncated {
                minimum: NONCE_LENGTH + TAG_LENGTH,
                actual: payload.len(),
            });
        }
        let (nonce, sealed) = payload.split_at(NONCE_LENGTH);
        let nonce: [u8; NONCE_LENGTH] = nonce
            .try_into()
            .map_err(|_| SchemeFailure::Primitive("invalid nonce length"))?;

        self.cipher
            .decrypt(
                &nonce.into(),
                Payload {
                    msg: sealed,
                    aad: IDENTIFIER.as_bytes(),
                },
            )
            .map_err(|_| SchemeFailure::AuthenticationFailed)
    }
}

impl Transformer for XChaCha {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        self.seal(input)
    }
}

struct Opener(XChaCha);

impl Transformer for Opener {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        self.0.open(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = KeyMaterial::generate(SYMMETRIC_KEY_LENGTH);
        let xc = XChaCha::new(&key).unwrap();
        let payload = xc.seal(b"s3cr3t").unwrap();
        assert_eq!(payload.len(), NONCE_LENGTH + 6 + TAG_LENGTH);
        assert_eq!(xc.open(&payload).unwrap(), b"s3cr3t");
    }

    #[test]
    fn test_wrong_key() {
        let a = XChaCha::new(&KeyMaterial::generate(SYMMETRIC_KEY_LENGTH)).unwrap();
        let b = XChaCha::new(&KeyMaterial::generate(SYMMETRIC_KEY_LENGTH)).unwrap();
        let payload = a.seal(b"value").unwrap();
        assert_eq!(b.open(&payload).unwrap_err(), SchemeFailure::AuthenticationFailed);
    }

    #[test]
    fn test_rejects_short_payload() {
        let xc = XChaCha::new(&KeyMaterial::generate(SYMMETRIC_KEY_LENGTH)).unwrap();
        assert!(matches!(
            xc.open(&[0u8; 39]),
            Err(SchemeFailure::Truncated { minimum: 40, actual: 39 })
        ));
    }
}
