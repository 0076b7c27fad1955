use crate::error::{BundleError, Result};
use crate::key::{KeyMaterial, KeyRing};
use crate::scheme::codec::{wrap, WrappedValue};
use crate::scheme::registry::{Capability, SchemeRegistry, Transformer};

/// Applies registered schemes to values.
///
/// Every primitive failure is normalized into [`BundleError::SchemeInitFailed`]
/// or [`BundleError::TransformFailed`]; both carry the scheme, the capability
/// and lengths only.
#[derive(Debug, Clone)]
pub struct Transformers {
    registry: SchemeRegistry,
}

impl Transformers {
    pub fn new(registry: SchemeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Resolve and construct a transformer without applying it.
    pub fn transformer(
        &self,
        identifier: &str,
        capability: Capability,
        key: &KeyMaterial,
    ) -> Result<Box<dyn Transformer>> {
        let factory = self.registry.resolve(identifier, capability)?;
        factory(key).map_err(|cause| {
            tracing::debug!(
                scheme = identifier,
                %capability,
                key = %key.fingerprint(),
                %cause,
                "scheme initialization failed"
            );
            BundleError::SchemeInitFailed {
                scheme: identifier.to_string(),
                capability,
                cause,
            }
        })
    }

    /// Resolve, construct and apply in one step.
    pub fn apply(
        &self,
        identifier: &str,
        capability: Capability,
        key: &KeyMaterial,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        let transformer = self.transformer(identifier, capability, key)?;
        let output = transformer.apply(input).map_err(|cause| {
            tracing::debug!(
                scheme = identifier,
                %capability,
                input_len = input.len(),
                %cause,
                "transform failed"
            );
            BundleError::TransformFailed {
                scheme: identifier.to_string(),
                capability,
                input_len: input.len(),
                cause,
            }
        })?;
        tracing::trace!(
            scheme = identifier,
            %capability,
            input_len = input.len(),
            output_len = output.len(),
            "transform applied"
        );
        Ok(output)
    }

    pub fn encrypt(&self, identifier: &str, key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.apply(identifier, Capability::Encrypt, key, plaintext)
    }

    pub fn decrypt(&self, identifier: &str, key: &KeyMaterial, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.apply(identifier, Capability::Decrypt, key, ciphertext)
    }

    pub fn sign(&self, identifier: &str, key: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>> {
        self.apply(identifier, Capability::Sign, key, message)
    }

    pub fn verify(&self, identifier: &str, key: &KeyMaterial, signed: &[u8]) -> Result<Vec<u8>> {
        self.apply(identifier, Capability::Verify, key, signed)
    }

    /// Apply `capability` (encrypt or sign) and tag the result with its scheme.
    pub fn seal(
        &self,
        identifier: &str,
        capability: Capability,
        key: &KeyMaterial,
        input: &[u8],
    ) -> Result<WrappedValue> {
        let payload = self.apply(identifier, capability, key, input)?;
        wrap(identifier, payload)
    }

    /// Capability that reverses values sealed under `scheme`.
    ///
    /// Decryption when the scheme is registered for it, otherwise signature
    /// verification.
    pub fn opening_capability(&self, scheme: &str) -> Result<Capability> {
        if self.registry.supports(scheme, Capability::Decrypt) {
            Ok(Capability::Decrypt)
        } else if self.registry.supports(scheme, Capability::Verify) {
            Ok(Capability::Verify)
        } else {
            Err(BundleError::UnknownScheme {
                scheme: scheme.to_string(),
                capability: Capability::Decrypt,
            })
        }
    }

    /// Reverse a wrapped value using the scheme named by its prefix.
    pub fn open(&self, value: &WrappedValue, key: &KeyMaterial) -> Result<Vec<u8>> {
        let capability = self.opening_capability(value.scheme())?;
        self.apply(value.scheme(), capability, key, value.payload())
    }

    /// Like [`Transformers::open`], picking the key from `keys`.
    pub fn open_with(&self, value: &WrappedValue, keys: &KeyRing) -> Result<Vec<u8>> {
        let capability = self.opening_capability(value.scheme())?;
        let key = keys.require_for(value.scheme(), capability)?;
        self.apply(value.scheme(), capability, key, value.payload())
    }
}
