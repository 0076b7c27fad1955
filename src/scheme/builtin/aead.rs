//! `aead`: AES-256-GCM.
//!
//! ```text
//! payload = nonce (12) || ciphertext || tag (16)
//! ```

use super::random_bytes;
use crate::error::{Result, SchemeFailure};
use crate::key::{KeyMaterial, SYMMETRIC_KEY_LENGTH};
use crate::scheme::registry::{Capability, RegistryBuilder, Transformer};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;

pub const IDENTIFIER: &str = "aead";

/// Length of an AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// Length of the AES-GCM authentication tag in bytes (128 bits).
pub const TAG_LENGTH: usize = 16;

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register(IDENTIFIER, Capability::Encrypt, |key: &KeyMaterial| {
        Ok(Box::new(Encrypter {
            cipher: cipher(key)?,
        }) as Box<dyn Transformer>)
    })?;
    builder.register(IDENTIFIER, Capability::Decrypt, |key: &KeyMaterial| {
        Ok(Box::new(Decrypter {
            cipher: cipher(key)?,
        }) as Box<dyn Transformer>)
    })?;
    Ok(())
}

pub(super) fn cipher(key: &KeyMaterial) -> std::result::Result<Aes256Gcm, SchemeFailure> {
    let bytes = key.as_array::<SYMMETRIC_KEY_LENGTH>()?;
    Aes256Gcm::new_from_slice(bytes).map_err(|_| SchemeFailure::InvalidKey)
}

/// Encrypt under an explicit nonce and prepend it.
pub(super) fn seal(
    cipher: &Aes256Gcm,
    nonce: [u8; NONCE_LENGTH],
    aad: &[u8],
    plaintext: &[u8],
) -> std::result::Result<Vec<u8>, SchemeFailure> {
    let sealed = cipher
        .encrypt(
            &nonce.into(),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| SchemeFailure::Primitive("AES-GCM encryption failed"))?;

    let mut out = Vec::with_capacity(NONCE_LENGTH + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Split the nonce off `payload` and decrypt the rest.
pub(super) fn open(
    cipher: &Aes256Gcm,
    aad: &[u8],
    payload: &[u8],
) -> std::result::Result<(Vec<u8>, [u8; NONCE_LENGTH]), SchemeFailure> {
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

    let plaintext = cipher
        .decrypt(&nonce.into(), Payload { msg: sealed, aad })
        .map_err(|_| SchemeFailure::AuthenticationFailed)?;
    Ok((plaintext, nonce))
}

struct Encrypter {
    cipher: Aes256Gcm,
}

impl Transformer for Encrypter {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        seal(
            &self.cipher,
            random_bytes::<NONCE_LENGTH>(),
            IDENTIFIER.as_bytes(),
            input,
        )
    }
}

struct Decrypter {
    cipher: Aes256Gcm,
}

impl Transformer for Decrypter {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        open(&self.cipher, IDENTIFIER.as_bytes(), input).map(|(plaintext, _)| plaintext)
    }
}
