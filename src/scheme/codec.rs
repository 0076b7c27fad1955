//! Canonical text form of a scheme-tagged value.
//!
//! ```text
//! <identifier>:<payload, base64url without padding>
//! ```
//!
//! The identifier selects the registry entry able to reverse the payload.
//! The codec never looks inside the payload.

use crate::error::{BundleError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the identifier and the encoded payload.
pub const SEPARATOR: char = ':';

/// Payload tagged with the scheme that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedValue {
    scheme: String,
    payload: Vec<u8>,
}

impl WrappedValue {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.scheme, self.payload)
    }
}

/// Ensure `identifier` can be used as a wrapped value prefix.
pub(crate) fn check_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(BundleError::InvalidArgument(
            "scheme identifier must not be empty".into(),
        ));
    }
    if identifier
        .chars()
        .any(|c| c == SEPARATOR || c.is_whitespace() || c.is_control())
    {
        return Err(BundleError::InvalidArgument(format!(
            "scheme identifier '{}' contains a separator or whitespace",
            identifier.escape_debug()
        )));
    }
    Ok(())
}

/// Tag `payload` with `identifier`.
pub fn wrap(identifier: &str, payload: impl Into<Vec<u8>>) -> Result<WrappedValue> {
    check_identifier(identifier)?;
    Ok(WrappedValue {
        scheme: identifier.to_string(),
        payload: payload.into(),
    })
}

/// Parse the text form back into identifier and payload.
pub fn unwrap(text: &str) -> Result<WrappedValue> {
    let (scheme, encoded) = text
        .split_once(SEPARATOR)
        .ok_or(BundleError::MalformedValue("missing scheme separator"))?;

    if scheme.is_empty() {
        return Err(BundleError::MalformedValue("empty scheme identifier"));
    }
    if check_identifier(scheme).is_err() {
        return Err(BundleError::MalformedValue("invalid scheme identifier"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| BundleError::MalformedValue("payload is not base64url"))?;

    Ok(WrappedValue {
        scheme: scheme.to_string(),
        payload,
    })
}

impl fmt::Display for WrappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.scheme,
            SEPARATOR,
            URL_SAFE_NO_PAD.encode(&self.payload)
        )
    }
}

impl FromStr for WrappedValue {
    type Err = BundleError;
    fn from_str(s: &str) -> Result<Self> {
        unwrap(s)
    }
}

impl Serialize for WrappedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WrappedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        unwrap(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_text_form() {
        let value = wrap("secretbox", vec![0xfb, 0xff, 0x00]).unwrap();
        assert_eq!(value.to_string(), "secretbox:-_8A");
    }

    #[test]
    fn test_unwrap_malformed() {
        assert!(matches!(
            unwrap("no-separator"),
            Err(BundleError::MalformedValue("missing scheme separator"))
        ));
        assert!(matches!(
            unwrap(":AAAA"),
            Err(BundleError::MalformedValue("empty scheme identifier"))
        ));
        assert!(matches!(
            unwrap("aead:not base64!"),
            Err(BundleError::MalformedValue("payload is not base64url"))
        ));
        assert!(matches!(
            unwrap("bad id:AAAA"),
            Err(BundleError::MalformedValue("invalid scheme identifier"))
        ));
    }

    #[test]
    fn test_unwrap_empty_payload() {
        let value = unwrap("raw:").unwrap();
        assert_eq!(value.scheme(), "raw");
        assert!(value.payload().is_empty());
    }

    #[test]
    fn test_payload_may_contain_separator_bytes() {
        let value = wrap("aead", b"a:b:c".to_vec()).unwrap();
        let restored = unwrap(&value.to_string()).unwrap();
        assert_eq!(restored.payload(), b"a:b:c");
    }

    #[test]
    fn test_wrap_rejects_bad_identifier() {
        assert!(wrap("", vec![1]).is_err());
        assert!(wrap("a:b", vec![1]).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let value = wrap("dae", vec![1, 2, 3]).unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"dae:AQID\"");
        let back: WrappedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert!(serde_json::from_str::<WrappedValue>("\"oops\"").is_err());
    }

    proptest! {
        #[test]
        fn wrap_unwrap_roundtrip(
            id in "[A-Za-z0-9._+-]{1,24}",
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let wrapped = wrap(&id, payload.clone()).unwrap();
            let restored = unwrap(&wrapped.to_string()).unwrap();
            prop_assert_eq!(restored.scheme(), id.as_str());
            prop_assert_eq!(restored.payload(), payload.as_slice());
        }
    }
}
