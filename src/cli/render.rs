use crate::bundle::render;
use crate::config::RenderOptions;
use crate::error::Result;
use crate::scheme::builtin::default_registry;
use crate::scheme::Transformers;
use crate::template::Template;
use std::path::Path;

/// Render a template file into bundle JSON.
pub fn render_template(path: &Path, options: &RenderOptions) -> Result<String> {
    let template = Template::from_path(path)?;
    let transformers = Transformers::new(default_registry()?);
    let keys = options.key_ring()?;
    let resolver = options.resolver()?;

    let bundle = render(&template, &transformers, &keys, &resolver)?;
    let mut json = bundle.to_json()?;
    json.push('\n');
    Ok(json)
}
