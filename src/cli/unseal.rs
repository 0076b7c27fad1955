use crate::bundle::Bundle;
use crate::config::UnsealOptions;
use crate::error::Result;
use crate::scheme::builtin::default_registry;
use crate::scheme::Transformers;
use std::path::Path;

/// Open every sealed value of a bundle file and return the plain bundle JSON.
pub fn unseal_bundle(path: &Path, options: &UnsealOptions) -> Result<String> {
    let bundle = Bundle::from_path(path)?;
    let transformers = Transformers::new(default_registry()?);
    let keys = options.key_ring()?;

    let mut json = bundle.unseal(&transformers, &keys)?.to_json()?;
    json.push('\n');
    Ok(json)
}
