//! `raw`: Ed25519 signatures.
//!
//! Signing keys are the 32-byte secret seed, verification keys the 32-byte
//! compressed public key. Verification returns the original message.
//!
//! ```text
//! payload = signature (64) || message
//! ```

use crate::error::{Result, SchemeFailure};
use crate::key::KeyMaterial;
use crate::scheme::registry::{Capability, RegistryBuilder, Transformer};
use ed25519_dalek::{
    Signature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};

pub const IDENTIFIER: &str = "raw";

pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register(IDENTIFIER, Capability::Sign, |key: &KeyMaterial| {
        let seed = key.as_array::<SECRET_KEY_LENGTH>()?;
        Ok(Box::new(RawSigner(SigningKey::from_bytes(seed))) as Box<dyn Transformer>)
    })?;
    builder.register(IDENTIFIER, Capability::Verify, |key: &KeyMaterial| {
        let public = key.as_array::<PUBLIC_KEY_LENGTH>()?;
        let verifying_key =
            VerifyingKey::from_bytes(public).map_err(|_| SchemeFailure::InvalidKey)?;
        Ok(Box::new(RawVerifier(verifying_key)) as Box<dyn Transformer>)
    })?;
    Ok(())
}

/// Generate a signing seed and its verification key.
pub fn generate_keypair() -> (KeyMaterial, KeyMaterial) {
    let seed = KeyMaterial::generate(SECRET_KEY_LENGTH);
    let mut bytes = [0u8; SECRET_KEY_LENGTH];
    bytes.copy_from_slice(seed.as_bytes());
    let public = SigningKey::from_bytes(&bytes).verifying_key().to_bytes();
    zeroize::Zeroize::zeroize(&mut bytes);
    (seed, KeyMaterial::from_bytes(public.to_vec()))
}

struct RawSigner(SigningKey);

impl Transformer for RawSigner {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        let signature = self.0.sign(input);
        let mut out = Vec::with_capacity(SIGNATURE_LENGTH + input.len());
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(input);
        Ok(out)
    }
}

struct RawVerifier(VerifyingKey);

impl Transformer for RawVerifier {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure> {
        if input.len() < SIGNATURE_LENGTH {
            return Err(SchemeFailure::Truncated {
                minimum: SIGNATURE_LENGTH,
                actual: input.len(),
            });
        }
        let (signature, message) = input.split_at(SIGNATURE_LENGTH);
        let signature: [u8; SIGNATURE_LENGTH] = signature
            .try_into()
            .map_err(|_| SchemeFailure::Primitive("invalid signature length"))?;

        self.0
            .verify_strict(message, &Signature::from_bytes(&signature))
            .map_err(|_| SchemeFailure::SignatureMismatch)?;
        Ok(message.to_vec())
    }
}
