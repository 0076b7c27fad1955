//! Bundlekit - secret bundle templates and pluggable encryption schemes
//!
//! A bundle template describes namespaces of packages, each holding
//! secrets together with the scheme that should protect them. Rendering a
//! template resolves every value and seals it under its scheme, producing a
//! bundle whose values carry their scheme identifier:
//!
//! ```text
//! Template → Validate → Walk (namespace → packages → secrets) → Visitor → Bundle
//! ```
//!
//! - **Schemes**: explicit registry of encryption and signature families
//!   keyed by identifier and capability (`aead`, `secretbox`, `xchacha`,
//!   `dae`, `raw`)
//! - **Wrapped values**: `<identifier>:<base64url payload>`
//! - **Checksum**: BLAKE3 over the canonical template, base64url encoded
//! - **Visitors**: bundle building, dry runs, or any caller-supplied walk
//!
//! ## Example
//!
//! ```no_run
//! use bundlekit::bundle::{render, StaticResolver};
//! use bundlekit::key::{KeyMaterial, KeyRing};
//! use bundlekit::scheme::{builtin::default_registry, Transformers};
//! use bundlekit::template::Template;
//! use std::path::Path;
//!
//! let template = Template::from_path(Path::new("template.yaml")).unwrap();
//! let transformers = Transformers::new(default_registry().unwrap());
//! let keys = KeyRing::new().with("secretbox", KeyMaterial::generate(32));
//!
//! let bundle = render(&template, &transformers, &keys, &StaticResolver::new()).unwrap();
//! let opened = bundle.unseal(&transformers, &keys).unwrap();
//! ```

pub mod bundle;
pub mod cli;
pub mod config;
pub mod cso;
pub mod error;
pub mod key;
pub mod scheme;
pub mod template;

pub use bundle::{render, Bundle};
pub use error::{BundleError, Result};
pub use key::{KeyMaterial, KeyRing};
pub use scheme::{SchemeRegistry, Transformers, WrappedValue};
pub use template::{checksum, execute, validate, Template, TemplateVisitor};
