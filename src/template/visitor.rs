use crate::error::Result;
use crate::template::model::{Namespace, PackageSpec, SecretSpec};
use std::fmt;

/// Separator between namespace names and the package name.
pub const PATH_SEPARATOR: char = '/';

/// Names of the namespaces leading to a node, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Full name of `package` below this path; unnamed namespaces are skipped.
    pub fn package_name(&self, package: &str) -> String {
        let mut name = String::new();
        for segment in self.segments.iter().filter(|s| !s.is_empty()) {
            name.push_str(segment);
            name.push(PATH_SEPARATOR);
        }
        name.push_str(package);
        name
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let named: Vec<&str> = self
            .segments
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if named.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&named.join("/"))
        }
    }
}

/// Callbacks driven by the executor over a template tree.
///
/// Node callbacks cannot fail: a visitor records problems internally and
/// reports them once from [`finish`](TemplateVisitor::finish), which the
/// executor calls exactly once after the walk. A visitor that prefers to
/// stop at the first problem may simply ignore the nodes that follow it.
pub trait TemplateVisitor {
    /// Called when entering a namespace, before its packages.
    fn visit_namespace(&mut self, _path: &NodePath, _namespace: &Namespace) {}

    /// Called for each package, before its secrets.
    fn visit_package(&mut self, path: &NodePath, package: &PackageSpec);

    fn visit_secret(&mut self, path: &NodePath, package: &PackageSpec, secret: &SecretSpec);

    /// Outcome of the whole walk.
    fn finish(&mut self) -> Result<()>;
}

impl<V: TemplateVisitor + ?Sized> TemplateVisitor for &mut V {
    fn visit_namespace(&mut self, path: &NodePath, namespace: &Namespace) {
        (**self).visit_namespace(path, namespace)
    }

    fn visit_package(&mut self, path: &NodePath, package: &PackageSpec) {
        (**self).visit_package(path, package)
    }

    fn visit_secret(&mut self, path: &NodePath, package: &PackageSpec, secret: &SecretSpec) {
        (**self).visit_secret(path, package, secret)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
