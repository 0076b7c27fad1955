pub mod builtin;
pub mod codec;
pub mod invoke;
pub mod registry;

pub use codec::{unwrap, wrap, WrappedValue, SEPARATOR};
pub use invoke::Transformers;
pub use registry::{Capability, RegistryBuilder, SchemeRegistry, Transformer, TransformerFactory};
