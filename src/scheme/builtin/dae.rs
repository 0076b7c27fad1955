//! `dae`: deterministic authenticated encryption.
//!
//! The nonce is an HMAC-SHA256 of the plaintext under a nonce subkey, so the
//! same plaintext and key always yield the same payload. Useful where equal
//! secrets must compare equal without being decrypted.
//!
//! ```text
//! enc_key   = HMAC-SHA256(key, "bundlekit/dae/encryption")
//! nonce_key = HMAC-SHA256(key, "bundlekit/dae/nonce")
//! nonce     = HMAC-SHA256(nonce_key, "dae" || 0x00 || plaintext)[..12]
//! payload   = nonce || AES-256-GCM(enc_key, nonce, plaintext, aad = "dae")
//! ```

use super::aead;
use crate::error::{Result, SchemeFailure};
use crate::key::{KeyMaterial, SYMMETRIC_KEY_LENGTH};
use crate::scheme::registry::{Capability, RegistryBuilder, Transformer};
use aes_gcm::Aes256Gcm;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const IDENTIFIER: &str = "dae";

const ENCRYPTION_LABEL: &[u8] = b"bundlekit/dae/encryption";
const NONCE_LABEL: &[u8] = b"bundlekit/dae/nonce";

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register(IDENTIFIER, Capability::Encrypt, |key: &KeyMaterial| {
        Ok(Box::new(Dae::new(key)?) as Box<dyn Transformer>)
    })?;
    builder.register(IDENTIFIER, Capability::Decrypt, |key: &KeyMaterial| {
        Ok(Box::new(Reverse(Dae::new(key)?)) as Box<dyn Transformer>)
    })?;
    Ok(())
}

fn keyed_mac(key: &[u8], parts: &[&[u8]]) -> std::result::Result<HmacSha256, SchemeFailure> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| SchemeFailure::Primitive("HMAC key rejected"))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

fn hmac(key: &[u8], parts: &[&[u8]]) -> std::result::Result<[u8; 32], SchemeFailure> {
    let result = keyed_mac(key, parts)?.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}

struct Dae {
    cipher: Aes256Gcm,
    nonce_key: [u8; 32],
}

impl Dae {
    fn new(key: &KeyMaterial) -> std::result::Result<Self, SchemeFailure> {
        let root = key.as_array::<SYMMETRIC_KEY_LENGTH>()?;
        let enc_key = KeyMaterial::from_bytes(hmac(root, &[ENCRYPTION_LABEL])?.to_vec());
        let nonce_key = hmac(root, &[NONCE_LABEL])?;
        Ok(Self {
            cipher: aead::cipher(&enc_key)?,
            nonce_key,
        })
    }

    fn nonce_mac(&self, plaintext: &[u8]) -> std::result::Result<HmacSha256, SchemeFailure> {
        keyed_mac(&self.nonce_key, &[IDENTIFIER.as_bytes(), &[0u8], plaintext])
    }

    fn synthetic_nonce(
        &self,
        plaintext: &[u8],
    ) -> std::result::Result<[u8; aead::NONCE_LENGTH], SchemeFailure> {
        let digest = self.nonce_mac(plaintext)?.finalize().into_bytes();
        let mut nonce = [0u8; aead::NONCE_LENGTH];
        nonce.copy_from_slice(&digest[..aead::NONCE_LENGTH]);
        Ok(nonce)
    }
}

impl Drop for Dae {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.nonce_key);
    }
}

impl Transformer for Dae {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        let nonce = self.synthetic_nonce(input)?;
        aead::seal(&self.cipher, nonce, IDENTIFIER.as_bytes(), input)
    }
}

struct Reverse(Dae);

impl Transformer for Reverse {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        let (plaintext, nonce) = aead::open(&self.0.cipher, IDENTIFIER.as_bytes(), input)?;
        self.0
            .nonce_mac(&plaintext)?
            .verify_truncated_left(&nonce)
            .map_err(|_| SchemeFailure::AuthenticationFailed)?;
        Ok(plaintext)
    }
}
