use crate::bundle::resolve::ValueResolver;
use crate::bundle::{Bundle, KeyValue, Package, SecretValue};
use crate::error::{BundleError, NodeFailures, Result};
use crate::key::KeyRing;
use crate::scheme::Transformers;
use crate::template::model::{PackageSpec, SecretSpec};
use crate::template::visitor::{NodePath, TemplateVisitor};
use std::collections::BTreeSet;

/// Visitor that materializes a template into a [`Bundle`].
///
/// Each secret value is resolved, then sealed under its scheme with the
/// scheme's key from the key ring; secrets without a scheme stay plain.
/// Failures are recorded against the node and the walk continues, so one
/// run reports every broken secret. A failed walk never yields a bundle.
pub struct BundleBuilder<'a> {
    transformers: &'a Transformers,
    keys: &'a KeyRing,
    resolver: &'a dyn ValueResolver,
    packages: Vec<Package>,
    package_names: BTreeSet<String>,
    current: Option<Current>,
    failures: NodeFailures,
    failed: usize,
    finished: bool,
}

/// Package receiving secrets
struct Current {
    index: usize,
    keys: BTreeSet<String>,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(
        transformers: &'a Transformers,
        keys: &'a KeyRing,
        resolver: &'a dyn ValueResolver,
    ) -> Self {
        Self {
            transformers,
            keys,
            resolver,
            packages: Vec::new(),
            package_names: BTreeSet::new(),
            current: None,
            failures: NodeFailures::default(),
            failed: 0,
            finished: false,
        }
    }

    /// Bundle built by a walk whose `finish` succeeded.
    pub fn into_bundle(self) -> Result<Bundle> {
        if self.failed > 0 {
            return Err(BundleError::IncompleteBundle {
                failed: self.failed,
            });
        }
        if !self.finished {
            return Err(BundleError::InvalidArgument(
                "bundle builder was not driven to completion".into(),
            ));
        }
        Ok(Bundle {
            template: None,
            packages: self.packages,
        })
    }

    fn record(&mut self, location: String, error: BundleError) {
        tracing::debug!(%location, %error, "secret not produced");
        self.failed += 1;
        self.failures.push(location, error);
    }

    fn produce(&self, secret: &SecretSpec) -> Result<SecretValue> {
        let scheme = match &secret.scheme {
            Some(scheme) => scheme,
            None => return Ok(SecretValue::Plain(self.resolver.resolve(&secret.value)?)),
        };

        let capability = secret.mode.capability();
        self.transformers.registry().resolve(scheme, capability)?;
        let key = self.keys.require_for(scheme, capability)?;
        let plaintext = self.resolver.resolve(&secret.value)?;
        let sealed = self
            .transformers
            .seal(scheme, capability, key, &plaintext)?;
        Ok(SecretValue::Sealed(sealed))
    }
}

impl TemplateVisitor for BundleBuilder<'_> {
    fn visit_package(&mut self, path: &NodePath, package: &PackageSpec) {
        self.current = None;
        let name = path.package_name(&package.name);

        if package.name.is_empty() {
            self.record(
                name,
                BundleError::InvalidArgument("package name must not be empty".into()),
            );
            return;
        }
        if !self.package_names.insert(name.clone()) {
            self.record(name.clone(), BundleError::DuplicatePackage(name));
            return;
        }

        self.packages.push(Package {
            name,
            labels: package.labels.clone(),
            annotations: package.annotations.clone(),
            secrets: Vec::with_capacity(package.secrets.len()),
        });
        self.current = Some(Current {
            index: self.packages.len() - 1,
            keys: BTreeSet::new(),
        });
    }

    fn visit_secret(&mut self, path: &NodePath, package: &PackageSpec, secret: &SecretSpec) {
        // secrets of a rejected package are not materialized
        let Some(index) = self.current.as_ref().map(|c| c.index) else {
            return;
        };
        let package_name = path.package_name(&package.name);
        let location = format!("{}#{}", package_name, secret.key);

        let fresh = self
            .current
            .as_mut()
            .is_some_and(|c| c.keys.insert(secret.key.clone()));
        if !fresh {
            self.record(
                location,
                BundleError::DuplicateSecret {
                    package: package_name,
                    key: secret.key.clone(),
                },
            );
            return;
        }

        match self.produce(secret) {
            Ok(value) => self.packages[index].secrets.push(KeyValue {
                key: secret.key.clone(),
                value,
            }),
            Err(error) => self.record(location, error),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(BundleError::VisitorReported {
            failures: std::mem::take(&mut self.failures),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::resolve::StaticResolver;
    use crate::key::KeyMaterial;
    use crate::scheme::builtin::default_registry;
    use crate::scheme::Capability;
    use crate::template::executor::execute;
    use crate::template::model::{Meta, Namespace, Template, ValueSpec};

    fn transformers() -> Transformers {
        Transformers::new(default_registry().unwrap())
    }

    fn run(template: &Template, keys: &KeyRing) -> (Result<()>, Result<Bundle>) {
        let t = transformers();
        let resolver = StaticResolver::new().with_value("db_user", "admin");
        let mut builder = BundleBuilder::new(&t, keys, &resolver);
        let outcome = execute(template, &mut builder);
        (outcome, builder.into_bundle())
    }

    fn single(secret: SecretSpec) -> Template {
        Template::new(
            Meta::named("t"),
            Namespace::default().with_package(PackageSpec::new("app").with_secret(secret)),
        )
    }

    #[test]
    fn test_builds_sealed_and_plain_values() {
        let keys = KeyRing::new()
            .with("aead", KeyMaterial::generate(32))
            .with("dae", KeyMaterial::generate(32));
        let template = Template::new(
            Meta::named("t"),
            Namespace::default().with_namespace(
                Namespace::new("infra").with_package(
                    PackageSpec::new("db")
                        .with_secret(SecretSpec::literal("password", "pw").with_scheme("aead"))
                        .with_secret(SecretSpec::literal("host", "db.local").with_scheme("dae"))
                        .with_secret(SecretSpec::new(
                            "user",
                            ValueSpec::Reference {
                                reference: "db_user".into(),
                            },
                        )),
                ),
            ),
        );

        let (outcome, bundle) = run(&template, &keys);
        outcome.unwrap();
        let bundle = bundle.unwrap();
        let package = bundle.package("infra/db").unwrap();
        // visited in key order
        let keys_in_order: Vec<_> = package.secrets.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys_in_order, vec!["host", "password", "user"]);
        assert_eq!(package.get("password").unwrap().scheme(), Some("aead"));
        assert_eq!(package.get("host").unwrap().scheme(), Some("dae"));
        assert_eq!(package.get("user").unwrap().as_plain(), Some(&b"admin"[..]));
    }

    #[test]
    fn test_unknown_scheme_is_reported_before_missing_key() {
        let (outcome, bundle) = run(
            &single(SecretSpec::literal("k", "v").with_scheme("fernet")),
            &KeyRing::new(),
        );
        let err = outcome.unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].location, "app#k");
        assert!(matches!(
            err.failures()[0].error,
            BundleError::UnknownScheme { ref scheme, capability: Capability::Encrypt } if scheme == "fernet"
        ));
        assert!(matches!(
            bundle,
            Err(BundleError::IncompleteBundle { failed: 1 })
        ));
    }

    #[test]
    fn test_missing_key() {
        let (outcome, _) = run(
            &single(SecretSpec::literal("k", "v").with_scheme("secretbox")),
            &KeyRing::new(),
        );
        let err = outcome.unwrap_err();
        assert!(matches!(
            err.failures()[0].error,
            BundleError::MissingKey(ref s) if s == "secretbox"
        ));
    }

    #[test]
    fn test_failures_accumulate_to_end() {
        let keys = KeyRing::new().with("aead", KeyMaterial::generate(32));
        let template = Template::new(
            Meta::named("t"),
            Namespace::default()
                .with_package(
                    PackageSpec::new("a")
                        .with_secret(SecretSpec::literal("bad", "v").with_scheme("jwe"))
                        .with_secret(SecretSpec::literal("good", "v").with_scheme("aead")),
                )
                .with_package(PackageSpec::new("b").with_secret(SecretSpec::new(
                    "missing",
                    ValueSpec::Reference {
                        reference: "nope".into(),
                    },
                ))),
        );

        let (outcome, bundle) = run(&template, &keys);
        let err = outcome.unwrap_err();
        let locations: Vec<_> = err.failures().iter().map(|f| f.location.as_str()).collect();
        assert_eq!(locations, vec!["a#bad", "b#missing"]);
        assert!(err.to_string().starts_with("Visitor reported 2 errors, first at a#bad"));
        assert!(matches!(
            bundle,
            Err(BundleError::IncompleteBundle { failed: 2 })
        ));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let template = Template::new(
            Meta::named("t"),
            Namespace::default()
                .with_package(PackageSpec::new("app").with_secret(SecretSpec::literal("k", "1")))
                .with_package(PackageSpec::new("app").with_secret(SecretSpec::literal("k", "2")))
                .with_package(
                    PackageSpec::new("other")
                        .with_secret(SecretSpec::literal("k", "1"))
                        .with_secret(SecretSpec::literal("k", "2")),
                ),
        );
        let (outcome, _) = run(&template, &KeyRing::new());
        let err = outcome.unwrap_err();
        assert_eq!(err.failures().len(), 2);
        assert!(matches!(err.failures()[0].error, BundleError::DuplicatePackage(ref p) if p == "app"));
        assert!(matches!(
            err.failures()[1].error,
            BundleError::DuplicateSecret { ref package, ref key } if package == "other" && key == "k"
        ));
    }

    #[test]
    fn test_failure_text_never_contains_values() {
        let (outcome, _) = run(
            &single(SecretSpec::literal("k", "topsecret").with_scheme("missing-scheme")),
            &KeyRing::new(),
        );
        let err = outcome.unwrap_err();
        assert!(!err.to_string().contains("topsecret"));
        assert!(!format!("{:?}", err).contains("topsecret"));
    }

    #[test]
    fn test_unfinished_builder_has_no_bundle() {
        let t = transformers();
        let keys = KeyRing::new();
        let resolver = StaticResolver::new();
        let builder = BundleBuilder::new(&t, &keys, &resolver);
        assert!(matches!(
            builder.into_bundle(),
            Err(BundleError::InvalidArgument(_))
        ));
    }
}
