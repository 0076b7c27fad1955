use crate::error::{BundleError, Result, SchemeFailure};
use crate::key::KeyMaterial;
use crate::scheme::codec::check_identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Operation a registry entry provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
        }
    }

    /// The capability that reverses this one.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Encrypt => Self::Decrypt,
            Self::Decrypt => Self::Encrypt,
            Self::Sign => Self::Verify,
            Self::Verify => Self::Sign,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = BundleError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "encrypt" => Ok(Self::Encrypt),
            "decrypt" => Ok(Self::Decrypt),
            "sign" => Ok(Self::Sign),
            "verify" => Ok(Self::Verify),
            _ => Err(BundleError::InvalidArgument(format!("capability: {}", s))),
        }
    }
}

/// A constructed value transformer, bound to its key.
pub trait Transformer: Send + Sync {
    fn apply(&self, input: &[u8]) -> std::result::Result<Vec<u8>, SchemeFailure>;
}

/// Builds a transformer from key material.
pub type TransformerFactory = Arc<
    dyn Fn(&KeyMaterial) -> std::result::Result<Box<dyn Transformer>, SchemeFailure>
        + Send
        + Sync,
>;

type EntryKey = (String, Capability);

/// Collects scheme registrations before the registry is frozen.
///
/// Registration is only possible through the builder; once [`build`] has
/// been called the resulting [`SchemeRegistry`] is read-only, so lookups can
/// never race with late registrations.
///
/// [`build`]: RegistryBuilder::build
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<EntryKey, TransformerFactory>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `identifier` and `capability`.
    pub fn register<F>(
        &mut self,
        identifier: impl Into<String>,
        capability: Capability,
        factory: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&KeyMaterial) -> std::result::Result<Box<dyn Transformer>, SchemeFailure>
            + Send
            + Sync
            + 'static,
    {
        let identifier = identifier.into();
        check_identifier(&identifier)?;

        let key = (identifier, capability);
        if self.entries.contains_key(&key) {
            return Err(BundleError::DuplicateScheme {
                scheme: key.0,
                capability,
            });
        }
        self.entries.insert(key, Arc::new(factory));
        Ok(self)
    }

    /// Freeze the registrations into an immutable registry.
    pub fn build(self) -> SchemeRegistry {
        tracing::debug!(entries = self.entries.len(), "scheme registry built");
        SchemeRegistry {
            entries: Arc::new(self.entries),
        }
    }
}

/// Immutable mapping from `(identifier, capability)` to a factory.
///
/// Cloning is cheap and the handle can be shared across threads.
#[derive(Clone, Default)]
pub struct SchemeRegistry {
    entries: Arc<BTreeMap<EntryKey, TransformerFactory>>,
}

impl SchemeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up the factory registered for `identifier` and `capability`.
    pub fn resolve(&self, identifier: &str, capability: Capability) -> Result<&TransformerFactory> {
        self.entries
            .get(&(identifier.to_string(), capability))
            .ok_or_else(|| BundleError::UnknownScheme {
                scheme: identifier.to_string(),
                capability,
            })
    }

    pub fn supports(&self, identifier: &str, capability: Capability) -> bool {
        self.entries
            .contains_key(&(identifier.to_string(), capability))
    }

    /// Sorted identifiers registered for `capability`.
    pub fn identifiers(&self, capability: Capability) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|(_, cap)| *cap == capability)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.keys().map(|(id, cap)| format!("{}/{}", id, cap)))
            .finish()
    }
}
