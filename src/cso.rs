//! Secret path layout rules.
//!
//! A secret path is a `/`-separated list of segments whose first segment
//! names a ring. Each ring fixes the meaning of the segments that follow:
//!
//! ```text
//! meta/<owner>/<name>/...
//! infra/<provider>/<account>/<region>/<service>/<key>...
//! platform/<stage>/<name>/<region>/<service>/<key>...
//! product/<name>/<version>/<component>/<key>...
//! app/<stage>/<platform>/<product>/<version>/<component>/<key>...
//! artifact/<type>/<id>/<key>...
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ring {
    Meta,
    Infra,
    Platform,
    Product,
    App,
    Artifact,
}

impl Ring {
    pub const ALL: [Ring; 6] = [
        Ring::Meta,
        Ring::Infra,
        Ring::Platform,
        Ring::Product,
        Ring::App,
        Ring::Artifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ring::Meta => "meta",
            Ring::Infra => "infra",
            Ring::Platform => "platform",
            Ring::Product => "product",
            Ring::App => "app",
            Ring::Artifact => "artifact",
        }
    }

    /// Segment layout, ring name included.
    pub fn layout(&self) -> &'static str {
        match self {
            Ring::Meta => "meta/<owner>/<name>",
            Ring::Infra => "infra/<provider>/<account>/<region>/<service>/<key>",
            Ring::Platform => "platform/<stage>/<name>/<region>/<service>/<key>",
            Ring::Product => "product/<name>/<version>/<component>/<key>",
            Ring::App => "app/<stage>/<platform>/<product>/<version>/<component>/<key>",
            Ring::Artifact => "artifact/<type>/<id>/<key>",
        }
    }

    pub fn min_segments(&self) -> usize {
        self.layout().split('/').count()
    }

    /// Index of the stage segment for staged rings
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Ring::Platform | Ring::App => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ring {
    type Err = PathError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ring::ALL
            .into_iter()
            .find(|ring| ring.as_str() == s)
            .ok_or_else(|| PathError::UnknownRing(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dev,
    Qa,
    Staging,
    Production,
}

impl FromStr for Stage {
    type Err = PathError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Stage::Dev),
            "qa" => Ok(Stage::Qa),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            _ => Err(PathError::InvalidStage(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("unknown ring '{0}'")]
    UnknownRing(String),

    #[error("{ring} paths need at least {expected} segments ({layout}), got {actual}")]
    TooShort {
        ring: Ring,
        expected: usize,
        actual: usize,
        layout: &'static str,
    },

    #[error("segment {index} '{segment}' must match [A-Za-z0-9._-]+")]
    InvalidSegment { index: usize, segment: String },

    #[error("stage must be one of dev, qa, staging, production, got '{0}'")]
    InvalidStage(String),
}

/// A path that satisfies its ring's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPath {
    ring: Ring,
    segments: Vec<String>,
}

impl SecretPath {
    pub fn parse(path: &str) -> std::result::Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<&str> = path.split('/').collect();
        for (index, segment) in segments.iter().enumerate() {
            if !is_valid_segment(segment) {
                return Err(PathError::InvalidSegment {
                    index,
                    segment: segment.to_string(),
                });
            }
        }

        let ring: Ring = segments[0].parse()?;
        if segments.len() < ring.min_segments() {
            return Err(PathError::TooShort {
                ring,
                expected: ring.min_segments(),
                actual: segments.len(),
                layout: ring.layout(),
            });
        }
        if let Some(index) = ring.stage_index() {
            segments[index].parse::<Stage>()?;
        }

        Ok(Self {
            ring,
            segments: segments.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    pub fn stage(&self) -> Option<Stage> {
        self.ring
            .stage_index()
            .and_then(|index| self.segments[index].parse().ok())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub path: String,
}

impl ValidateRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Path validation service.
///
/// An `Err` means the service could not answer; a rejected path is an `Ok`
/// response with `valid == false`.
pub trait PathValidator {
    fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse>;
}

/// Local validator applying the ring layout rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl PathValidator for RuleValidator {
    fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse> {
        let response = match SecretPath::parse(&request.path) {
            Ok(_) => ValidateResponse {
                valid: true,
                error: None,
            },
            Err(e) => ValidateResponse {
                valid: false,
                error: Some(e.to_string()),
            },
        };
        tracing::trace!(path = %request.path, valid = response.valid, "path validated");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(path: &str) -> ValidateResponse {
        RuleValidator.validate(&ValidateRequest::new(path)).unwrap()
    }

    #[test]
    fn test_valid_paths() {
        for path in [
            "meta/security/bundlekit",
            "meta/security/bundlekit/signing/key",
            "infra/aws/security/eu-central-1/ec2/ssh/default/ec2-user/private_key",
            "platform/production/customer1/us-east-1/postgresql/admin_credentials",
            "product/ece/v1.0.0/server/database/credentials",
            "app/qa/customer1/ece/v1.0.0/adminconsole/authentication/otp/okta_api_key",
            "artifact/docker/sha256.5d3b/attestations",
        ] {
            let response = check(path);
            assert!(response.valid, "{}: {:?}", path, response.error);
            assert!(response.error.is_none());
        }
    }

    #[test]
    fn test_unknown_ring() {
        let response = check("secrets/app/key");
        assert!(!response.valid);
        assert_eq!(response.error.as_deref(), Some("unknown ring 'secrets'"));
    }

    #[test]
    fn test_too_short() {
        let err = SecretPath::parse("infra/aws/security").unwrap_err();
        assert_eq!(
            err,
            PathError::TooShort {
                ring: Ring::Infra,
                expected: 6,
                actual: 3,
                layout: Ring::Infra.layout(),
            }
        );
    }

    #[test]
    fn test_stage_is_checked() {
        assert_eq!(
            SecretPath::parse("app/prod/customer1/ece/v1/console/key").unwrap_err(),
            PathError::InvalidStage("prod".into())
        );
        let path = SecretPath::parse("platform/staging/p/r/s/k").unwrap();
        assert_eq!(path.stage(), Some(Stage::Staging));
        assert_eq!(path.ring(), Ring::Platform);
    }

    #[test]
    fn test_segment_rules() {
        assert_eq!(SecretPath::parse(""), Err(PathError::Empty));
        for bad in [
            "/meta/a/b",
            "meta/a/b/",
            "meta//b",
            "meta/a b/c",
            "meta/../b",
            "meta/a/ü",
        ] {
            assert!(
                matches!(SecretPath::parse(bad), Err(PathError::InvalidSegment { .. })),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let text = "product/ece/v1.0.0/server/key";
        assert_eq!(SecretPath::parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn test_min_segments() {
        assert_eq!(Ring::Meta.min_segments(), 3);
        assert_eq!(Ring::App.min_segments(), 7);
        assert_eq!(Ring::Artifact.min_segments(), 4);
    }
}
