use crate::bundle::DryRun;
use crate::cso::{PathValidator, RuleValidator, ValidateRequest};
use crate::error::{BundleError, Result};
use crate::scheme::builtin::default_registry;
use crate::template::{checksum, execute, validate, Template};
use std::path::Path;

/// Validate a template file
pub fn validate_template(path: &Path) -> Result<String> {
    let template = Template::from_path(path)?;
    validate(&template)?;

    let name = template.meta.as_ref().map(|m| m.name.as_str()).unwrap_or("");
    Ok(format!("{}: valid template '{}'\n", path.display(), name))
}

/// Compute the checksum of a template file
pub fn checksum_template(path: &Path) -> Result<String> {
    let template = Template::from_path(path)?;
    Ok(format!("{}\n", checksum(&template)?))
}

/// Describe what rendering a template would do
pub fn dry_run_template(path: &Path) -> Result<String> {
    let template = Template::from_path(path)?;
    let registry = default_registry()?;
    let mut dry_run = DryRun::with_registry(&registry);
    let outcome = execute(&template, &mut dry_run);
    let report = dry_run.into_report();

    let mut output = String::new();
    output.push_str("Bundle Template Dry Run\n");
    output.push_str("=======================\n\n");
    output.push_str(&format!("File: {}\n", path.display()));
    output.push_str(&format!("Checksum: {}\n\n", checksum(&template)?));

    output.push_str(&format!("Namespaces: {}\n", report.namespaces));
    output.push_str(&format!("Packages: {}\n", report.packages.len()));
    for package in &report.packages {
        output.push_str(&format!("  {}\n", package));
    }
    output.push_str(&format!("Secrets: {}\n", report.secrets));
    output.push_str(&format!("  Plain: {}\n", report.plain));
    output.push_str(&format!("  Generated: {}\n", report.generated));
    output.push('\n');

    output.push_str("Schemes:\n");
    if report.schemes.is_empty() {
        output.push_str("  (none)\n");
    }
    for (scheme, count) in &report.schemes {
        output.push_str(&format!("  {}: {}\n", scheme, count));
    }

    if !report.references.is_empty() {
        output.push_str("\nReferences:\n");
        for reference in &report.references {
            output.push_str(&format!("  {}\n", reference));
        }
    }

    if let Err(err) = outcome {
        output.push_str("\nProblems:\n");
        for failure in err.failures() {
            output.push_str(&format!("  {}\n", failure));
        }
        if err.failures().is_empty() {
            output.push_str(&format!("  {}\n", err));
        }
    }

    Ok(output)
}

/// Check a secret path against the ring layout rules
pub fn check_path(path: &str) -> Result<String> {
    let response = RuleValidator.validate(&ValidateRequest::new(path))?;
    if response.valid {
        Ok(format!("{}: valid\n", path))
    } else {
        Err(BundleError::InvalidArgument(format!(
            "{}: {}",
            path,
            response.error.unwrap_or_default()
        )))
    }
}
