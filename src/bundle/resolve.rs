use crate::error::{BundleError, Result};
use crate::template::model::{Charset, GeneratorSpec, ValueSpec};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Prefix of references read from the process environment
pub const ENV_PREFIX: &str = "env:";

/// Upper bound on generated value length
pub const MAX_GENERATED_LENGTH: usize = 4096;

/// Turns a template value specification into plaintext bytes.
pub trait ValueResolver {
    fn resolve(&self, value: &ValueSpec) -> Result<Zeroizing<Vec<u8>>>;
}

/// Resolver backed by an in-memory map of named values.
///
/// References are looked up by name first. With `allow_env` set, an
/// unmatched `env:NAME` reference falls back to the environment variable
/// `NAME`.
#[derive(Clone, Default)]
pub struct StaticResolver {
    values: BTreeMap<String, Zeroizing<String>>,
    allow_env: bool,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(name.into(), Zeroizing::new(value.into()));
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn allow_env(mut self, allow: bool) -> Self {
        self.allow_env = allow;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn lookup(&self, reference: &str) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(value) = self.values.get(reference) {
            return Ok(Zeroizing::new(value.as_bytes().to_vec()));
        }

        if self.allow_env {
            if let Some(name) = reference.strip_prefix(ENV_PREFIX) {
                if let Ok(value) = std::env::var(name) {
                    let value = Zeroizing::new(value);
                    return Ok(Zeroizing::new(value.as_bytes().to_vec()));
                }
            }
        }

        Err(BundleError::UnresolvedReference(reference.to_string()))
    }
}

impl ValueResolver for StaticResolver {
    fn resolve(&self, value: &ValueSpec) -> Result<Zeroizing<Vec<u8>>> {
        match value {
            ValueSpec::Literal(literal) => Ok(Zeroizing::new(literal.as_bytes().to_vec())),
            ValueSpec::Reference { reference } => self.lookup(reference),
            ValueSpec::Generate { generate } => generate_value(generate),
        }
    }
}

impl fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticResolver")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .field("allow_env", &self.allow_env)
            .finish()
    }
}

/// Produce a random printable value from the OS CSPRNG.
pub fn generate_value(spec: &GeneratorSpec) -> Result<Zeroizing<Vec<u8>>> {
    let length = spec.length;
    if length == 0 || length > MAX_GENERATED_LENGTH {
        return Err(BundleError::InvalidArgument(format!(
            "generated length must be between 1 and {}, got {}",
            MAX_GENERATED_LENGTH, length
        )));
    }

    let mut value = match spec.charset {
        Charset::Alphanumeric => OsRng.sample_iter(Alphanumeric).take(length).collect(),
        Charset::Hex => {
            let raw = Zeroizing::new(random_vec(length.div_ceil(2)));
            hex::encode(raw.as_slice()).into_bytes()
        }
        Charset::Base64 => {
            let raw = Zeroizing::new(random_vec(length * 3 / 4 + 1));
            URL_SAFE_NO_PAD.encode(raw.as_slice()).into_bytes()
        }
    };
    value.truncate(length);
    Ok(Zeroizing::new(value))
}

fn random_vec(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
