use crate::error::Result;
use crate::key::public_entry;
use crate::scheme::builtin::generate_key;

/// Generate key material for a built-in scheme.
///
/// Output lines are `scheme=base64` assignments, usable as `--key`
/// arguments or joined with commas for `BUNDLEKIT_KEYS`.
pub fn keygen(scheme: &str) -> Result<String> {
    let generated = generate_key(scheme)?;

    let mut output = format!("{}={}\n", scheme, generated.secret.to_base64());
    if let Some(public) = &generated.public {
        output.push_str(&format!("{}={}\n", public_entry(scheme), public.to_base64()));
    }

    tracing::debug!(scheme, key = %generated.secret.fingerprint(), "key generated");
    Ok(output)
}
