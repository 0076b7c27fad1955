//! Key ring and named value configuration.
//!
//! Keys come from three sources, applied in order so later ones win:
//! a JSON key ring file (`{"<scheme>": "<base64>"}`), the
//! `BUNDLEKIT_KEYS` environment variable (`scheme=base64,...`) and
//! `--key scheme=base64` arguments.

use crate::bundle::StaticResolver;
use crate::error::{BundleError, Result};
use crate::key::{KeyMaterial, KeyRing};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Environment variable holding additional keys
pub const KEYS_ENV: &str = "BUNDLEKIT_KEYS";

/// Options for the render command
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// JSON key ring file
    pub keyring: Option<PathBuf>,
    /// `scheme=base64` key assignments
    pub keys: Vec<String>,
    /// `name=value` assignments for value references
    pub values: Vec<String>,
    /// Resolve `env:NAME` references from the environment
    pub allow_env: bool,
    /// Read keys from `BUNDLEKIT_KEYS`
    pub env_keys: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            keyring: None,
            keys: Vec::new(),
            values: Vec::new(),
            allow_env: false,
            env_keys: true,
        }
    }
}

impl RenderOptions {
    pub fn key_ring(&self) -> Result<KeyRing> {
        load_key_ring(self.keyring.as_deref(), &self.keys, self.env_keys)
    }

    pub fn resolver(&self) -> Result<StaticResolver> {
        let mut resolver = StaticResolver::new().allow_env(self.allow_env);
        for assignment in &self.values {
            let (name, value) = split_assignment(assignment, "value")?;
            resolver.insert(name, value);
        }
        Ok(resolver)
    }
}

/// Options for the unseal command
#[derive(Debug, Clone)]
pub struct UnsealOptions {
    pub keyring: Option<PathBuf>,
    pub keys: Vec<String>,
    pub env_keys: bool,
}

impl Default for UnsealOptions {
    fn default() -> Self {
        Self {
            keyring: None,
            keys: Vec::new(),
            env_keys: true,
        }
    }
}

impl UnsealOptions {
    pub fn key_ring(&self) -> Result<KeyRing> {
        load_key_ring(self.keyring.as_deref(), &self.keys, self.env_keys)
    }
}

/// Merge every configured key source into one ring.
pub fn load_key_ring(file: Option<&Path>, keys: &[String], env_keys: bool) -> Result<KeyRing> {
    let mut ring = KeyRing::new();

    if let Some(path) = file {
        ring.extend(read_key_ring_file(path)?);
    }

    if env_keys {
        if let Ok(mut list) = std::env::var(KEYS_ENV) {
            let parsed = parse_key_list(&list);
            list.zeroize();
            ring.extend(parsed?);
        }
    }

    for assignment in keys {
        let (scheme, key) = parse_key_assignment(assignment)?;
        ring.insert(scheme, key);
    }

    tracing::debug!(keys = ?ring, "key ring loaded");
    Ok(ring)
}

/// Read a JSON object mapping scheme identifiers to base64 keys.
pub fn read_key_ring_file(path: &Path) -> Result<KeyRing> {
    let data = std::fs::read(path)?;
    // serde's message quotes the offending value, which may be a key
    let mut entries: BTreeMap<String, String> = serde_json::from_slice(&data).map_err(|e| {
        BundleError::InvalidArgument(format!(
            "{} is not a JSON object of scheme to base64 key (line {}, column {})",
            path.display(),
            e.line(),
            e.column()
        ))
    })?;

    let mut ring = KeyRing::new();
    let mut outcome = Ok(());
    for (scheme, encoded) in entries.iter_mut() {
        match KeyMaterial::from_base64(encoded) {
            Ok(key) => {
                ring.insert(scheme.clone(), key);
            }
            Err(_) if outcome.is_ok() => {
                outcome = Err(BundleError::InvalidArgument(format!(
                    "key for '{}' in {} is not valid base64",
                    scheme,
                    path.display()
                )));
            }
            Err(_) => {}
        }
        encoded.zeroize();
    }
    outcome.map(|_| ring)
}

/// Parse `scheme=base64[,scheme=base64...]`.
pub fn parse_key_list(text: &str) -> Result<KeyRing> {
    let mut ring = KeyRing::new();
    for assignment in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (scheme, key) = parse_key_assignment(assignment)?;
        ring.insert(scheme, key);
    }
    Ok(ring)
}

/// Parse a single `scheme=base64` assignment.
pub fn parse_key_assignment(text: &str) -> Result<(String, KeyMaterial)> {
    let (scheme, encoded) = split_assignment(text, "key")?;
    let key = KeyMaterial::from_base64(encoded).map_err(|_| {
        BundleError::InvalidArgument(format!("key for '{}' is not valid base64", scheme))
    })?;
    Ok((scheme.to_string(), key))
}

/// Split `name=value` at the first `=`; the value is never echoed.
fn split_assignment<'t>(text: &'t str, what: &str) -> Result<(&'t str, &'t str)> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(BundleError::InvalidArgument(format!(
            "{} assignment must have the form name=value",
            what
        ))),
    }
}
