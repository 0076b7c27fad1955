use crate::scheme::Capability;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Unknown scheme '{scheme}' for {capability}")]
    UnknownScheme {
        scheme: String,
        capability: Capability,
    },

    #[error("Scheme '{scheme}' is already registered for {capability}")]
    DuplicateScheme {
        scheme: String,
        capability: Capability,
    },

    #[error("Malformed wrapped value: {0}")]
    MalformedValue(&'static str),

    #[error("Unable to initialize scheme '{scheme}' for {capability}")]
    SchemeInitFailed {
        scheme: String,
        capability: Capability,
        #[source]
        cause: SchemeFailure,
    },

    #[error("Scheme '{scheme}' failed to {capability} a {input_len} byte value")]
    TransformFailed {
        scheme: String,
        capability: Capability,
        input_len: usize,
        #[source]
        cause: SchemeFailure,
    },

    #[error("No key material configured for scheme '{0}'")]
    MissingKey(String),

    #[error("Unable to resolve value reference '{0}'")]
    UnresolvedReference(String),

    #[error("Package '{0}' is declared more than once")]
    DuplicatePackage(String),

    #[error("Secret '{key}' is declared more than once in '{package}'")]
    DuplicateSecret { package: String, key: String },

    #[error("{failures}")]
    VisitorReported { failures: NodeFailures },

    #[error("Bundle is incomplete: {failed} secret(s) could not be produced")]
    IncompleteBundle { failed: usize },
}

impl BundleError {
    /// Per-node failures when the error was accumulated by a visitor.
    pub fn failures(&self) -> &[NodeFailure] {
        match self {
            BundleError::VisitorReported { failures } => &failures.0,
            _ => &[],
        }
    }
}

/// A failure recorded by a visitor against one template node.
#[derive(Debug)]
pub struct NodeFailure {
    /// Location of the node, `package` or `package#key`.
    pub location: String,
    pub error: BundleError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// Failures accumulated over a whole template walk, in visit order.
#[derive(Debug, Default)]
pub struct NodeFailures(pub Vec<NodeFailure>);

impl NodeFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, location: impl Into<String>, error: BundleError) {
        self.0.push(NodeFailure {
            location: location.into(),
            error,
        });
    }
}

impl fmt::Display for NodeFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "Visitor reported an error"),
            [only] => write!(f, "Visitor reported an error at {}", only),
            [first, rest @ ..] => write!(
                f,
                "Visitor reported {} errors, first at {}",
                rest.len() + 1,
                first
            ),
        }
    }
}

/// Structural template defects, checked in declaration order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("apiVersion should be '{expected}', got '{found}'")]
    ApiVersion { expected: &'static str, found: String },

    #[error("kind should be '{expected}', got '{found}'")]
    Kind { expected: &'static str, found: String },

    #[error("meta should not be empty")]
    MissingMeta,

    #[error("spec should not be empty")]
    MissingSpec,
}

/// Opaque reason reported by a scheme implementation.
///
/// Only static reasons and lengths are carried so that a failure can never
/// echo plaintext or key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeFailure {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid key material")]
    InvalidKey,

    #[error("input too short: need at least {minimum} bytes, got {actual}")]
    Truncated { minimum: usize, actual: usize },

    #[error("message authentication failed")]
    AuthenticationFailed,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("{0}")]
    Primitive(&'static str),
}

pub type Result<T> = std::result::Result<T, BundleError>;
