//! Materialized bundles and the visitors that produce or inspect them.

pub mod builder;
pub mod dry_run;
pub mod publish;
pub mod resolve;

use crate::error::{BundleError, Result};
use crate::key::KeyRing;
use crate::scheme::{Transformers, WrappedValue};
use crate::template::checksum::checksum;
use crate::template::executor::execute;
use crate::template::model::Template;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

pub use builder::BundleBuilder;
pub use dry_run::{DryRun, DryRunReport};
pub use publish::{publish, MemorySink, PublishReport, PublishRequest, SecretSink};
pub use resolve::{StaticResolver, ValueResolver};

/// Secrets produced from a template, grouped by package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Checksum of the template the bundle was rendered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Full name, namespace path included.
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub secrets: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: SecretValue,
}

/// Value of one secret.
///
/// Plain values are wiped on drop and never shown by `Debug`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretValue {
    Plain(#[serde(with = "plain_base64")] Zeroizing<Vec<u8>>),
    Sealed(WrappedValue),
}

impl SecretValue {
    pub fn plain(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Plain(Zeroizing::new(bytes.into()))
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }

    pub fn as_plain(&self) -> Option<&[u8]> {
        match self {
            Self::Plain(bytes) => Some(bytes.as_slice()),
            Self::Sealed(_) => None,
        }
    }

    pub fn as_sealed(&self) -> Option<&WrappedValue> {
        match self {
            Self::Plain(_) => None,
            Self::Sealed(value) => Some(value),
        }
    }

    /// Scheme that sealed the value, if any.
    pub fn scheme(&self) -> Option<&str> {
        self.as_sealed().map(WrappedValue::scheme)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(bytes) => write!(f, "Plain(<{} bytes>)", bytes.len()),
            Self::Sealed(value) => write!(
                f,
                "Sealed({}, <{} bytes>)",
                value.scheme(),
                value.payload().len()
            ),
        }
    }
}

mod plain_base64 {
    use super::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub fn serialize<S: Serializer>(bytes: &Zeroizing<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = Zeroizing::new(STANDARD.encode(bytes.as_slice()));
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Zeroizing<Vec<u8>>, D::Error> {
        let encoded = Zeroizing::new(String::deserialize(deserializer)?);
        STANDARD
            .decode(encoded.as_bytes())
            .map(Zeroizing::new)
            .map_err(|_| serde::de::Error::custom("plain value is not base64"))
    }
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.secrets
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }
}

impl Bundle {
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Look up a secret by package and key.
    pub fn get(&self, package: &str, key: &str) -> Option<&SecretValue> {
        self.package(package).and_then(|p| p.get(key))
    }

    pub fn secret_count(&self) -> usize {
        self.packages.iter().map(|p| p.secrets.len()).sum()
    }

    pub fn sealed_count(&self) -> usize {
        self.packages
            .iter()
            .flat_map(|p| &p.secrets)
            .filter(|kv| kv.value.is_sealed())
            .count()
    }

    /// Every secret as `(package, key, value)` in bundle order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &SecretValue)> {
        self.packages.iter().flat_map(|p| {
            p.secrets
                .iter()
                .map(move |kv| (p.name.as_str(), kv.key.as_str(), &kv.value))
        })
    }

    /// Copy of the bundle with every sealed value opened.
    ///
    /// Encryption schemes are decrypted, signature schemes verified. Stops
    /// at the first value that cannot be opened.
    pub fn unseal(&self, transformers: &Transformers, keys: &KeyRing) -> Result<Bundle> {
        let mut packages = Vec::with_capacity(self.packages.len());
        for package in &self.packages {
            let mut secrets = Vec::with_capacity(package.secrets.len());
            for kv in &package.secrets {
                let value = match &kv.value {
                    SecretValue::Plain(bytes) => SecretValue::Plain(bytes.clone()),
                    SecretValue::Sealed(wrapped) => {
                        SecretValue::plain(transformers.open_with(wrapped, keys)?)
                    }
                };
                secrets.push(KeyValue {
                    key: kv.key.clone(),
                    value,
                });
            }
            packages.push(Package {
                name: package.name.clone(),
                labels: package.labels.clone(),
                annotations: package.annotations.clone(),
                secrets,
            });
        }

        tracing::debug!(
            packages = packages.len(),
            opened = self.sealed_count(),
            "bundle unsealed"
        );
        Ok(Bundle {
            template: self.template.clone(),
            packages,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(BundleError::InvalidArgument("bundle document is empty".into()));
        }
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read(path)?)
    }
}

/// Execute `template` with a [`BundleBuilder`] and stamp the result with the
/// template checksum.
pub fn render(
    template: &Template,
    transformers: &Transformers,
    keys: &KeyRing,
    resolver: &dyn ValueResolver,
) -> Result<Bundle> {
    let mut builder = BundleBuilder::new(transformers, keys, resolver);
    execute(template, &mut builder)?;
    let mut bundle = builder.into_bundle()?;
    bundle.template = Some(checksum(template)?);

    tracing::info!(
        packages = bundle.packages.len(),
        secrets = bundle.secret_count(),
        sealed = bundle.sealed_count(),
        "bundle rendered"
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{public_entry, KeyMaterial};
    use crate::scheme::builtin::{default_registry, generate_key};
    use crate::template::model::{Meta, Namespace, PackageSpec, SecretSpec, TransformMode};

    fn transformers() -> Transformers {
        Transformers::new(default_registry().unwrap())
    }

    fn template() -> Template {
        Template::new(
            Meta::named("bundle-test"),
            Namespace::default().with_package(
                PackageSpec::new("app/db")
                    .with_label("tier", "data")
                    .with_secret(SecretSpec::literal("password", "s3cr3t").with_scheme("secretbox"))
                    .with_secret(SecretSpec::literal("user", "admin")),
            ),
        )
    }

    #[test]
    fn test_render_and_unseal() {
        let t = transformers();
        let keys = KeyRing::new().with("secretbox", KeyMaterial::generate(32));
        let bundle = render(&template(), &t, &keys, &StaticResolver::new()).unwrap();

        assert_eq!(bundle.template, Some(checksum(&template()).unwrap()));
        assert_eq!(bundle.secret_count(), 2);
        assert_eq!(bundle.sealed_count(), 1);
        assert_eq!(bundle.package("app/db").unwrap().labels["tier"], "data");
        assert_eq!(bundle.get("app/db", "password").unwrap().scheme(), Some("secretbox"));
        assert_eq!(bundle.get("app/db", "user").unwrap().as_plain(), Some(&b"admin"[..]));

        let opened = bundle.unseal(&t, &keys).unwrap();
        assert_eq!(opened.sealed_count(), 0);
        assert_eq!(
            opened.get("app/db", "password").unwrap().as_plain(),
            Some(&b"s3cr3t"[..])
        );
    }

    #[test]
    fn test_unseal_signed_value_with_public_entry() {
        let t = transformers();
        let pair = generate_key("raw").unwrap();
        let mut keys = KeyRing::new().with("raw", pair.secret);
        if let Some(public) = pair.public {
            keys.insert(public_entry("raw"), public);
        }

        let spec = Template::new(
            Meta::named("signed"),
            Namespace::default().with_package(PackageSpec::new("release").with_secret(
                SecretSpec::literal("manifest", "v1.2.3")
                    .with_scheme("raw")
                    .with_mode(TransformMode::Sign),
            )),
        );
        let bundle = render(&spec, &t, &keys, &StaticResolver::new()).unwrap();
        let opened = bundle.unseal(&t, &keys).unwrap();
        assert_eq!(
            opened.get("release", "manifest").unwrap().as_plain(),
            Some(&b"v1.2.3"[..])
        );
    }

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let t = transformers();
        let keys = KeyRing::new().with("secretbox", KeyMaterial::generate(32));
        let bundle = render(&template(), &t, &keys, &StaticResolver::new()).unwrap();

        let wrong = KeyRing::new().with("secretbox", KeyMaterial::generate(32));
        assert!(matches!(
            bundle.unseal(&t, &wrong),
            Err(BundleError::TransformFailed { .. })
        ));
        assert!(matches!(
            bundle.unseal(&t, &KeyRing::new()),
            Err(BundleError::MissingKey(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_and_redacted_debug() {
        let t = transformers();
        let keys = KeyRing::new().with("secretbox", KeyMaterial::generate(32));
        let bundle = render(&template(), &t, &keys, &StaticResolver::new()).unwrap();

        let json = bundle.to_json().unwrap();
        assert!(json.contains("\"sealed\": \"secretbox:"));
        assert!(json.contains("\"plain\": \"YWRtaW4=\""));
        assert!(!json.contains("s3cr3t"));
        assert_eq!(Bundle::from_json(json.as_bytes()).unwrap(), bundle);

        let debug = format!("{:?}", bundle);
        assert!(!debug.contains("admin"));
        assert!(debug.contains("Plain(<5 bytes>)"));
    }

    #[test]
    fn test_entries_in_bundle_order() {
        let mut bundle = Bundle::default();
        let mut a = Package::new("a");
        a.secrets.push(KeyValue {
            key: "k1".into(),
            value: SecretValue::plain(b"1".to_vec()),
        });
        bundle.packages.push(a);
        bundle.packages.push(Package::new("b"));

        let entries: Vec<_> = bundle.entries().map(|(p, k, _)| (p, k)).collect();
        assert_eq!(entries, vec![("a", "k1")]);
        assert!(matches!(
            Bundle::from_json(b" "),
            Err(BundleError::InvalidArgument(_))
        ));
    }
}
