//! Pushing bundle secrets to an external secret store.
//!
//! Every selected secret is opened, re-sealed for the destination and
//! collected before the first push, so a bad value or key aborts the run
//! with nothing published.

use crate::bundle::{Bundle, SecretValue};
use crate::error::{BundleError, Result};
use crate::key::{KeyMaterial, KeyRing};
use crate::scheme::{Capability, Transformers, WrappedValue};
use glob::Pattern;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Destination of published secrets.
pub trait SecretSink {
    /// Create or replace one secret.
    fn push(&mut self, secret: &PublishedSecret) -> Result<()>;
}

/// Secret as handed to a sink, sealed for the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedSecret {
    pub name: String,
    /// Identifier of the destination key, when the store tracks one.
    pub key_id: Option<String>,
    pub value: WrappedValue,
}

/// Where and how to publish
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Glob over secret keys; `*` selects everything.
    pub filter: String,
    /// Scheme used to seal values for the destination.
    pub scheme: String,
    pub key: KeyMaterial,
    pub key_id: Option<String>,
}

impl PublishRequest {
    pub fn new(scheme: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            filter: "*".to_string(),
            scheme: scheme.into(),
            key,
            key_id: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Names pushed, in push order.
    pub published: Vec<String>,
    /// Secrets excluded by the filter.
    pub skipped: usize,
}

/// Publish the secrets of `bundle` selected by `request.filter` to `sink`.
///
/// Sealed values are opened with `keys` first. Two packages publishing the
/// same key is an error since the destination namespace is flat.
pub fn publish(
    bundle: &Bundle,
    transformers: &Transformers,
    keys: &KeyRing,
    request: &PublishRequest,
    sink: &mut dyn SecretSink,
) -> Result<PublishReport> {
    let pattern = Pattern::new(&request.filter).map_err(|e| {
        BundleError::InvalidArgument(format!("invalid secret filter '{}': {}", request.filter, e))
    })?;
    transformers
        .registry()
        .resolve(&request.scheme, Capability::Encrypt)?;

    let mut prepared: BTreeMap<String, (String, PublishedSecret)> = BTreeMap::new();
    let mut skipped = 0;

    for (package, key, value) in bundle.entries() {
        if !pattern.matches(key) {
            skipped += 1;
            continue;
        }

        let plaintext = match value {
            SecretValue::Plain(bytes) => bytes.clone(),
            SecretValue::Sealed(wrapped) => Zeroizing::new(transformers.open_with(wrapped, keys)?),
        };
        let sealed = transformers.seal(
            &request.scheme,
            Capability::Encrypt,
            &request.key,
            &plaintext,
        )?;

        match prepared.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                return Err(BundleError::InvalidArgument(format!(
                    "secret '{}' is provided by both '{}' and '{}'",
                    key,
                    existing.get().0,
                    package
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert((
                    package.to_string(),
                    PublishedSecret {
                        name: key.to_string(),
                        key_id: request.key_id.clone(),
                        value: sealed,
                    },
                ));
            }
        }
    }

    let mut report = PublishReport {
        published: Vec::with_capacity(prepared.len()),
        skipped,
    };
    for (name, (_, secret)) in prepared {
        sink.push(&secret)?;
        report.published.push(name);
    }

    tracing::info!(
        published = report.published.len(),
        skipped = report.skipped,
        scheme = %request.scheme,
        key = %request.key.fingerprint(),
        "secrets published"
    );
    Ok(report)
}

/// Sink keeping published secrets in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub secrets: BTreeMap<String, PublishedSecret>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PublishedSecret> {
        self.secrets.get(name)
    }
}

impl SecretSink for MemorySink {
    fn push(&mut self, secret: &PublishedSecret) -> Result<()> {
        self.secrets.insert(secret.name.clone(), secret.clone());
        Ok(())
    }
}
