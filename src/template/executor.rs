use crate::error::{BundleError, Result, ValidationError};
use crate::template::checksum::canonical_form;
use crate::template::model::{Namespace, Template};
use crate::template::validate::validate;
use crate::template::visitor::{NodePath, TemplateVisitor};

/// Lifecycle of one template execution
///
/// ```text
/// NotStarted -> Validating -> Failed
///                          -> Walking -> Walked -> ReportedOk
///                                               -> ReportedError
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    Validating,
    Failed,
    Walking,
    Walked,
    ReportedOk,
    ReportedError,
}

impl ExecutionState {
    fn can_advance_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (NotStarted, Validating)
                | (Validating, Failed)
                | (Validating, Walking)
                | (Walking, Walked)
                | (Walked, ReportedOk)
                | (Walked, ReportedError)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::ReportedOk | Self::ReportedError)
    }
}

/// Number of nodes handed to the visitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub namespaces: usize,
    pub packages: usize,
    pub secrets: usize,
}

/// A single run of a template against a visitor.
///
/// Holds no state beyond its own run; separate executions never share
/// anything but the read-only template.
#[derive(Debug)]
pub struct Execution<'t> {
    template: &'t Template,
    state: ExecutionState,
    stats: WalkStats,
}

impl<'t> Execution<'t> {
    pub fn new(template: &'t Template) -> Self {
        Self {
            template,
            state: ExecutionState::NotStarted,
            stats: WalkStats::default(),
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Validate, walk, then return the visitor's terminal result verbatim.
    pub fn run<V: TemplateVisitor + ?Sized>(&mut self, visitor: &mut V) -> Result<()> {
        if self.state != ExecutionState::NotStarted {
            return Err(BundleError::InvalidArgument(
                "an execution can only be run once".into(),
            ));
        }

        self.advance(ExecutionState::Validating);
        let template = self.template;
        let spec = match validate(template)
            .and_then(|_| canonical_form(template))
            .and_then(|canonical| {
                canonical
                    .spec
                    .ok_or_else(|| ValidationError::MissingSpec.into())
            }) {
            Ok(spec) => spec,
            Err(err) => {
                self.advance(ExecutionState::Failed);
                tracing::debug!(error = %err, "template rejected before walk");
                return Err(err);
            }
        };

        self.advance(ExecutionState::Walking);
        walk_namespace(&spec, &NodePath::root().child(&spec.name), visitor, &mut self.stats);
        self.advance(ExecutionState::Walked);

        let outcome = visitor.finish();
        self.advance(if outcome.is_ok() {
            ExecutionState::ReportedOk
        } else {
            ExecutionState::ReportedError
        });

        tracing::debug!(
            namespaces = self.stats.namespaces,
            packages = self.stats.packages,
            secrets = self.stats.secrets,
            ok = outcome.is_ok(),
            "template executed"
        );
        outcome
    }

    fn advance(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal execution transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "execution state");
        self.state = next;
    }
}

/// Execute `template`, driving `visitor` over its namespace tree.
pub fn execute<V: TemplateVisitor + ?Sized>(template: &Template, visitor: &mut V) -> Result<()> {
    Execution::new(template).run(visitor)
}

/// Depth-first over a canonical tree: namespace, its packages (each
/// followed by its secrets), then its child namespaces. Canonical order
/// sorts by name and breaks ties on content, so storage order never leaks
/// into the walk.
fn walk_namespace<V: TemplateVisitor + ?Sized>(
    namespace: &Namespace,
    path: &NodePath,
    visitor: &mut V,
    stats: &mut WalkStats,
) {
    visitor.visit_namespace(path, namespace);
    stats.namespaces += 1;

    for package in &namespace.packages {
        visitor.visit_package(path, package);
        stats.packages += 1;

        for secret in &package.secrets {
            visitor.visit_secret(path, package, secret);
            stats.secrets += 1;
        }
    }

    for child in &namespace.namespaces {
        walk_namespace(child, &path.child(&child.name), visitor, stats);
    }
}
