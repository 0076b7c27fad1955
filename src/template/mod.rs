//! Bundle templates: the document model, its validation and checksum, and
//! the executor that walks a template tree with a visitor.

pub mod checksum;
pub mod executor;
pub mod model;
pub mod validate;
pub mod visitor;

pub use checksum::{canonical_bytes, canonical_form, checksum, CHECKSUM_LENGTH};
pub use executor::{execute, Execution, ExecutionState, WalkStats};
pub use model::{
    Charset, GeneratorSpec, Meta, Namespace, PackageSpec, SecretSpec, Template, TransformMode,
    ValueSpec, API_VERSION, KIND,
};
pub use validate::validate;
pub use visitor::{NodePath, TemplateVisitor};
