use crate::error::{BundleError, Result};
use crate::scheme::Capability;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Required `apiVersion` of a bundle template
pub const API_VERSION: &str = "harp.elastic.co/v1";

/// Required `kind` of a bundle template
pub const KIND: &str = "BundleTemplate";

/// Declarative description of a bundle.
///
/// `meta` and `spec` are optional at the type level so that a loaded
/// document missing them can be represented and rejected by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, alias = "metadata", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Namespace>,
}

impl Template {
    /// A template with the required sentinels set.
    pub fn new(meta: Meta, spec: Namespace) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            meta: Some(meta),
            spec: Some(spec),
        }
    }

    /// Parse a JSON document
    pub fn from_json(data: &[u8]) -> Result<Self> {
        ensure_not_empty(data)?;
        Ok(serde_json::from_slice(data)?)
    }

    /// Parse a YAML document
    pub fn from_yaml(data: &str) -> Result<Self> {
        ensure_not_empty(data.as_bytes())?;
        Ok(serde_yaml::from_str(data)?)
    }

    /// Load a template file, YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            let text = String::from_utf8(data).map_err(|_| {
                BundleError::InvalidArgument(format!("{} is not valid UTF-8", path.display()))
            })?;
            Self::from_yaml(&text)
        } else {
            Self::from_json(&data)
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn ensure_not_empty(data: &[u8]) -> Result<()> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(BundleError::InvalidArgument(
            "template document is empty".into(),
        ));
    }
    Ok(())
}

/// Template metadata; unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Meta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Tree node grouping packages and child namespaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self
    }
}

/// Named group of secrets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretSpec>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: SecretSpec) -> Self {
        self.secrets.push(secret);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// One secret of a package and how to produce its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub key: String,
    pub value: ValueSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default)]
    pub mode: TransformMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SecretSpec {
    pub fn new(key: impl Into<String>, value: ValueSpec) -> Self {
        Self {
            key: key.into(),
            value,
            scheme: None,
            mode: TransformMode::default(),
            description: None,
        }
    }

    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, ValueSpec::Literal(value.into()))
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_mode(mut self, mode: TransformMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Source of a secret value.
///
/// `Debug` never prints literal values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    /// Inline value. Numbers and booleans are kept in their textual form.
    Literal(#[serde(deserialize_with = "scalar_literal")] String),
    /// Named value supplied by the resolver
    Reference {
        #[serde(rename = "ref")]
        reference: String,
    },
    /// Random value produced at execution time
    Generate { generate: GeneratorSpec },
}

impl fmt::Debug for ValueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "Literal(<{} bytes>)", value.len()),
            Self::Reference { reference } => f
                .debug_struct("Reference")
                .field("reference", reference)
                .finish(),
            Self::Generate { generate } => f
                .debug_struct("Generate")
                .field("generate", generate)
                .finish(),
        }
    }
}

/// Accept any scalar as a literal: `port: 5432` means the string `"5432"`.
fn scalar_literal<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScalarVisitor;

    impl<'de> de::Visitor<'de> for ScalarVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

/// Parameters of a generated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    #[serde(default)]
    pub charset: Charset,
    pub length: usize,
}

/// Alphabet of a generated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    #[default]
    Alphanumeric,
    Hex,
    Base64,
}

impl std::str::FromStr for Charset {
    type Err = BundleError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "alphanumeric" => Ok(Self::Alphanumeric),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(BundleError::InvalidArgument(format!("charset: {}", s))),
        }
    }
}

/// Which capability of the secret's scheme is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    #[default]
    Encrypt,
    Sign,
}

impl TransformMode {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Encrypt => Capability::Encrypt,
            Self::Sign => Capability::Sign,
        }
    }
}
