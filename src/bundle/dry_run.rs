use crate::error::{BundleError, NodeFailures, Result};
use crate::scheme::SchemeRegistry;
use crate::template::model::{Namespace, PackageSpec, SecretSpec, ValueSpec};
use crate::template::visitor::{NodePath, TemplateVisitor};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What a render of the template would touch, without resolving or sealing
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub namespaces: usize,
    pub packages: Vec<String>,
    pub secrets: usize,
    /// Secrets left unsealed.
    pub plain: usize,
    /// Secrets per scheme identifier.
    pub schemes: BTreeMap<String, usize>,
    /// Named values the template refers to.
    pub references: BTreeSet<String>,
    pub generated: usize,
}

/// Inspecting visitor.
///
/// With a registry attached, secrets whose scheme is not registered for
/// their mode are reported from `finish`, as a render would.
#[derive(Debug, Default)]
pub struct DryRun<'a> {
    registry: Option<&'a SchemeRegistry>,
    report: DryRunReport,
    failures: NodeFailures,
}

impl<'a> DryRun<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: &'a SchemeRegistry) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    pub fn report(&self) -> &DryRunReport {
        &self.report
    }

    pub fn into_report(self) -> DryRunReport {
        self.report
    }
}

impl TemplateVisitor for DryRun<'_> {
    fn visit_namespace(&mut self, _path: &NodePath, _namespace: &Namespace) {
        self.report.namespaces += 1;
    }

    fn visit_package(&mut self, path: &NodePath, package: &PackageSpec) {
        self.report.packages.push(path.package_name(&package.name));
    }

    fn visit_secret(&mut self, path: &NodePath, package: &PackageSpec, secret: &SecretSpec) {
        self.report.secrets += 1;

        match &secret.value {
            ValueSpec::Reference { reference } => {
                self.report.references.insert(reference.clone());
            }
            ValueSpec::Generate { .. } => self.report.generated += 1,
            ValueSpec::Literal(_) => {}
        }

        let Some(scheme) = &secret.scheme else {
            self.report.plain += 1;
            return;
        };
        *self.report.schemes.entry(scheme.clone()).or_default() += 1;

        if let Some(registry) = self.registry {
            if let Err(error) = registry.resolve(scheme, secret.mode.capability()) {
                let location = format!("{}#{}", path.package_name(&package.name), secret.key);
                self.failures.push(location, error);
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
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
    use crate::scheme::builtin::default_registry;
    use crate::template::executor::execute;
    use crate::template::model::{Charset, GeneratorSpec, Meta, Template};

    fn template() -> Template {
        Template::new(
            Meta::named("dry"),
            Namespace::default()
                .with_package(
                    PackageSpec::new("db")
                        .with_secret(SecretSpec::literal("password", "pw").with_scheme("secretbox"))
                        .with_secret(SecretSpec::new(
                            "user",
                            ValueSpec::Reference {
                                reference: "db_user".into(),
                            },
                        )),
                )
                .with_namespace(Namespace::new("ci").with_package(
                    PackageSpec::new("deploy").with_secret(
                        SecretSpec::new(
                            "token",
                            ValueSpec::Generate {
                                generate: GeneratorSpec {
                                    charset: Charset::Hex,
                                    length: 32,
                                },
                            },
                        )
                        .with_scheme("age"),
                    ),
                )),
        )
    }

    #[test]
    fn test_report_counts() {
        let mut dry_run = DryRun::new();
        execute(&template(), &mut dry_run).unwrap();
        let report = dry_run.into_report();

        assert_eq!(report.namespaces, 2);
        assert_eq!(report.packages, vec!["db", "ci/deploy"]);
        assert_eq!(report.secrets, 3);
        assert_eq!(report.plain, 1);
        assert_eq!(report.generated, 1);
        assert_eq!(report.schemes["secretbox"], 1);
        assert_eq!(report.schemes["age"], 1);
        assert!(report.references.contains("db_user"));
    }

    #[test]
    fn test_unregistered_schemes_are_reported() {
        let registry = default_registry().unwrap();
        let mut dry_run = DryRun::with_registry(&registry);
        let err = execute(&template(), &mut dry_run).unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].location, "ci/deploy#token");
        assert!(matches!(
            err.failures()[0].error,
            BundleError::UnknownScheme { ref scheme, .. } if scheme == "age"
        ));
        // the report is complete regardless
        assert_eq!(dry_run.report().secrets, 3);
    }
}
