use crate::error::{Result, ValidationError};
use crate::template::model::{Template, API_VERSION, KIND};

/// Check the structural requirements of a template.
///
/// Checks run in order and stop at the first failure: apiVersion, kind,
/// meta, spec. Secret values and scheme identifiers are not inspected here;
/// scheme resolution is a registry lookup and belongs to execution.
pub fn validate(template: &Template) -> Result<()> {
    if template.api_version != API_VERSION {
        return Err(ValidationError::ApiVersion {
            expected: API_VERSION,
            found: template.api_version.clone(),
        }
        .into());
    }

    if template.kind != KIND {
        return Err(ValidationError::Kind {
            expected: KIND,
            found: template.kind.clone(),
        }
        .into());
    }

    if template.meta.is_none() {
        return Err(ValidationError::MissingMeta.into());
    }

    if template.spec.is_none() {
        return Err(ValidationError::MissingSpec.into());
    }

    Ok(())
}
