//! Content identifier of a template.
//!
//! The template is validated, rewritten into canonical form and serialized
//! to JSON. Struct fields serialize in declaration order and free-form maps
//! are `BTreeMap`s, so the only order left to fix is that of the collections:
//! secrets by key, packages and namespaces by name, ties broken by their own
//! canonical bytes. The BLAKE3-256 digest of that encoding is returned as
//! unpadded base64url.

use crate::error::Result;
use crate::template::model::{Namespace, Template};
use crate::template::validate::validate;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

/// Length of the textual checksum (32 bytes, base64url without padding).
pub const CHECKSUM_LENGTH: usize = 43;

/// Compute the checksum of a valid template.
pub fn checksum(template: &Template) -> Result<String> {
    validate(template)?;

    let payload = canonical_bytes(template)?;
    let digest = blake3::hash(&payload);
    let encoded = URL_SAFE_NO_PAD.encode(digest.as_bytes());

    tracing::debug!(
        template = template.meta.as_ref().map(|m| m.name.as_str()).unwrap_or_default(),
        canonical_len = payload.len(),
        checksum = %encoded,
        "template checksum computed"
    );
    Ok(encoded)
}

/// Canonical serialization hashed by [`checksum`].
pub fn canonical_bytes(template: &Template) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&canonical_form(template)?)?)
}

/// Copy of `template` with every collection in canonical order.
///
/// Templates with the same checksum have identical canonical forms, which
/// is also the order the executor walks them in.
pub fn canonical_form(template: &Template) -> Result<Template> {
    let mut canonical = template.clone();
    if let Some(spec) = canonical.spec.as_mut() {
        canonicalize_namespace(spec)?;
    }
    Ok(canonical)
}

fn canonicalize_namespace(namespace: &mut Namespace) -> Result<()> {
    for package in &mut namespace.packages {
        sort_canonical(&mut package.secrets, |s| s.key.clone())?;
    }
    sort_canonical(&mut namespace.packages, |p| p.name.clone())?;

    for child in &mut namespace.namespaces {
        canonicalize_namespace(child)?;
    }
    sort_canonical(&mut namespace.namespaces, |n| n.name.clone())?;
    Ok(())
}

/// Sort by name, then by serialized form. Children must already be canonical.
fn sort_canonical<T, F>(items: &mut Vec<T>, name: F) -> Result<()>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    let mut keyed = std::mem::take(items)
        .into_iter()
        .map(|item| {
            let bytes = serde_json::to_vec(&item)?;
            Ok(((name(&item), bytes), item))
        })
        .collect::<Result<Vec<_>>>()?;

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;
    use crate::template::model::{Meta, PackageSpec, SecretSpec};

    fn template(packages: Vec<PackageSpec>) -> Template {
        let mut root = Namespace::default();
        root.packages = packages;
        Template::new(Meta::named("x"), root)
    }

    fn db() -> PackageSpec {
        PackageSpec::new("app/db")
            .with_secret(SecretSpec::literal("password", "s3cr3t").with_scheme("secretbox"))
            .with_secret(SecretSpec::literal("user", "admin"))
    }

    fn cache() -> PackageSpec {
        PackageSpec::new("app/cache").with_secret(SecretSpec::literal("url", "redis://cache"))
    }

    #[test]
    fn test_checksum_is_stable() {
        let t = template(vec![db(), cache()]);
        let first = checksum(&t).unwrap();
        assert_eq!(first, checksum(&t).unwrap());
        assert_eq!(first.len(), CHECKSUM_LENGTH);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_collection_order_is_irrelevant() {
        let a = template(vec![db(), cache()]);

        let mut reordered = db();
        reordered.secrets.reverse();
        let b = template(vec![cache(), reordered]);

        assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }

    #[test]
    fn test_namespace_order_is_irrelevant() {
        let left = Namespace::new("left").with_package(db());
        let right = Namespace::new("right").with_package(cache());

        let a = Template::new(
            Meta::named("x"),
            Namespace::default()
                .with_namespace(left.clone())
                .with_namespace(right.clone()),
        );
        let b = Template::new(
            Meta::named("x"),
            Namespace::default().with_namespace(right).with_namespace(left),
        );
        assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }

    #[test]
    fn test_any_field_change_alters_checksum() {
        let base = checksum(&template(vec![db()])).unwrap();

        let mut changed = db();
        changed.secrets[0].value = crate::template::model::ValueSpec::Literal("other".into());
        assert_ne!(base, checksum(&template(vec![changed])).unwrap());

        let mut changed = db();
        changed.secrets[0].scheme = Some("aead".into());
        assert_ne!(base, checksum(&template(vec![changed])).unwrap());

        let mut t = template(vec![db()]);
        t.meta.as_mut().unwrap().name = "y".into();
        assert_ne!(base, checksum(&t).unwrap());

        let labelled = db().with_label("team", "platform");
        assert_ne!(base, checksum(&template(vec![labelled])).unwrap());
    }

    #[test]
    fn test_json_and_yaml_hash_identically() {
        let json = r#"{"apiVersion":"harp.elastic.co/v1","kind":"BundleTemplate",
            "meta":{"name":"x","owner":"ops"},
            "spec":{"packages":[{"name":"b","secrets":[{"key":"k","value":"v"}]},{"name":"a"}]}}"#;
        let yaml = "apiVersion: harp.elastic.co/v1\nkind: BundleTemplate\nmeta:\n  owner: ops\n  name: x\nspec:\n  packages:\n    - name: a\n    - name: b\n      secrets:\n        - value: v\n          key: k\n";
        let a = Template::from_json(json.as_bytes()).unwrap();
        let b = Template::from_yaml(yaml).unwrap();
        assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }

    #[test]
    fn test_duplicate_names_are_ordered_by_content() {
        let one = PackageSpec::new("dup").with_secret(SecretSpec::literal("k", "1"));
        let two = PackageSpec::new("dup").with_secret(SecretSpec::literal("k", "2"));
        let a = template(vec![one.clone(), two.clone()]);
        let b = template(vec![two, one]);
        assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }

    #[test]
    fn test_invalid_template_is_not_hashed() {
        let mut t = template(vec![db()]);
        t.kind = "Bundle".into();
        assert!(matches!(checksum(&t), Err(BundleError::ValidationFailed(_))));
    }

    #[test]
    fn test_canonical_bytes_do_not_mutate_template() {
        let t = template(vec![db(), cache()]);
        let before = t.clone();
        canonical_bytes(&t).unwrap();
        assert_eq!(t, before);
    }
}
