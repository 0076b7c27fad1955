use bundlekit::bundle::{render, BundleBuilder, SecretValue, StaticResolver};
use bundlekit::key::{KeyMaterial, KeyRing};
use bundlekit::scheme::builtin::default_registry;
use bundlekit::scheme::{unwrap, Capability, RegistryBuilder, Transformer, Transformers};
use bundlekit::template::{checksum, execute, validate, PackageSpec, SecretSpec, Template};
use bundlekit::BundleError;
use proptest::prelude::*;
use std::error::Error;

const TEMPLATE: &str = r#"{
    "apiVersion": "harp.elastic.co/v1",
    "kind": "BundleTemplate",
    "meta": {"name": "x"},
    "spec": {"packages": [{"name": "app/db", "secrets": [
        {"key": "password", "value": "s3cr3t", "scheme": "secretbox"}
    ]}]}
}"#;

fn fixed_key() -> KeyMaterial {
    KeyMaterial::from_bytes((0u8..32).collect::<Vec<_>>())
}

#[test]
fn secretbox_template_end_to_end() -> Result<(), Box<dyn Error>> {
    let template = Template::from_json(TEMPLATE.as_bytes())?;
    validate(&template)?;

    let digest = checksum(&template)?;
    assert_eq!(digest, checksum(&template)?);

    let transformers = Transformers::new(default_registry()?);
    let keys = KeyRing::new().with("secretbox", fixed_key());
    let resolver = StaticResolver::new();
    let mut builder = BundleBuilder::new(&transformers, &keys, &resolver);
    execute(&template, &mut builder)?;
    let bundle = builder.into_bundle()?;

    let wrapped: Vec<_> = bundle
        .entries()
        .filter_map(|(_, _, value)| value.as_sealed())
        .collect();
    assert_eq!(wrapped.len(), 1);

    let parsed = unwrap(&wrapped[0].to_string())?;
    assert_eq!(parsed.scheme(), "secretbox");
    let plaintext = transformers.decrypt("secretbox", &fixed_key(), parsed.payload())?;
    assert_eq!(plaintext, b"s3cr3t");
    Ok(())
}

#[test]
fn render_stamps_checksum_and_unseals() -> Result<(), Box<dyn Error>> {
    let template = Template::from_json(TEMPLATE.as_bytes())?;
    let transformers = Transformers::new(default_registry()?);
    let keys = KeyRing::new().with("secretbox", fixed_key());

    let bundle = render(&template, &transformers, &keys, &StaticResolver::new())?;
    assert_eq!(bundle.template.as_deref(), Some(checksum(&template)?.as_str()));

    let opened = bundle.unseal(&transformers, &keys)?;
    assert_eq!(
        opened.get("app/db", "password").and_then(SecretValue::as_plain),
        Some(&b"s3cr3t"[..])
    );
    Ok(())
}

struct AlwaysFails;

impl Transformer for AlwaysFails {
    fn apply(&self, _: &[u8]) -> Result<Vec<u8>, bundlekit::error::SchemeFailure> {
        Err(bundlekit::error::SchemeFailure::AuthenticationFailed)
    }
}

#[test]
fn failing_decrypt_never_leaks_plaintext_or_key() -> Result<(), Box<dyn Error>> {
    let key_bytes = b"KEYBYTES-KEYBYTES-KEYBYTES-KEYBY".to_vec();
    let key = KeyMaterial::from_bytes(key_bytes.clone());

    let mut builder = RegistryBuilder::new();
    builder.register("failing", Capability::Decrypt, |_: &KeyMaterial| {
        Ok(Box::new(AlwaysFails) as Box<dyn Transformer>)
    })?;
    let transformers = Transformers::new(builder.build());

    let err = transformers
        .decrypt("failing", &key, b"topsecret")
        .unwrap_err();
    let texts = [err.to_string(), format!("{:?}", err), format!("{:#?}", err)];
    for text in &texts {
        assert!(!text.contains("topsecret"));
        assert!(!text.contains("KEYBYTES"));
    }

    // a real scheme rejecting a tampered payload behaves the same way
    let builtin = Transformers::new(default_registry()?);
    let mut sealed = builtin.encrypt("secretbox", &fixed_key(), b"topsecret")?;
    let last = sealed.len() - 1;
    sealed[last] ^= 1;
    let err = builtin.decrypt("secretbox", &fixed_key(), &sealed).unwrap_err();
    assert!(matches!(err, BundleError::TransformFailed { .. }));
    assert!(!err.to_string().contains("topsecret"));
    assert!(!format!("{:?}", err).contains("topsecret"));
    Ok(())
}

#[test]
fn unregistered_scheme_surfaces_from_finish() -> Result<(), Box<dyn Error>> {
    let template = Template::from_json(TEMPLATE.replace("secretbox", "age").as_bytes())?;
    let transformers = Transformers::new(default_registry()?);
    let keys = KeyRing::new().with("age", fixed_key());
    let resolver = StaticResolver::new();
    let mut builder = BundleBuilder::new(&transformers, &keys, &resolver);

    let err = execute(&template, &mut builder).unwrap_err();
    assert!(matches!(
        err.failures()[0].error,
        BundleError::UnknownScheme { ref scheme, .. } if scheme == "age"
    ));
    assert!(builder.into_bundle().is_err());
    Ok(())
}

fn packages(names: &[String]) -> Vec<PackageSpec> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            PackageSpec::new(name.clone())
                .with_secret(SecretSpec::literal(format!("k{}", i), format!("v{}", i)))
                .with_secret(SecretSpec::literal("shared", name.clone()).with_scheme("aead"))
        })
        .collect()
}

proptest! {
    #[test]
    fn checksum_ignores_collection_order(
        names in proptest::collection::btree_set("[a-z]{1,8}", 1..6),
        seed in any::<u64>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let mut shuffled = packages(&names);
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        for package in shuffled.iter_mut() {
            package.secrets.reverse();
        }

        let mut a = Template::from_json(TEMPLATE.as_bytes()).unwrap();
        let mut b = a.clone();
        a.spec.as_mut().unwrap().packages = packages(&names);
        b.spec.as_mut().unwrap().packages = shuffled;

        prop_assert_eq!(checksum(&a).unwrap(), checksum(&b).unwrap());
    }
}
