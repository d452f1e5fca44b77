//! Process-wide compaction configuration
//!
//! Built once at startup and shared as `Arc<CompactionConfig>` by every
//! interceptor. Nothing in this crate reads the environment per call.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Base64url of `{"alg":"RS256","typ":"JWT"}`
pub const DEFAULT_HEADER_SEGMENT: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";

/// Component encoding used for decomposed credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    /// Raw JSON payload + signature; header is the configured constant
    #[default]
    #[serde(alias = "2-way", alias = "2")]
    TwoWay,
    /// Header + raw JSON payload + signature
    #[serde(alias = "3-way", alias = "3")]
    ThreeWay,
    /// Static / session / dynamic claim subsets + signature
    #[serde(alias = "4-way", alias = "4")]
    FourWay,
}

impl Scheme {
    /// Value carried in `x-jwt-scheme`
    pub fn wire_tag(self) -> &'static str {
        match self {
            Self::TwoWay => "2",
            Self::ThreeWay => "3",
            Self::FourWay => "4",
        }
    }

    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "2" => Some(Self::TwoWay),
            "3" => Some(Self::ThreeWay),
            "4" => Some(Self::FourWay),
            _ => None,
        }
    }

    /// Whether reassembly substitutes the configured header constant
    pub fn elides_header(self) -> bool {
        !matches!(self, Self::ThreeWay)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TwoWay => "2-way",
            Self::ThreeWay => "3-way",
            Self::FourWay => "4-way",
        })
    }
}

/// What to do when a credential's header differs from the configured
/// constant under a header-eliding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderMismatchPolicy {
    /// Decompose anyway; receivers reassemble with the constant
    #[default]
    Reassemble,
    /// Send the whole credential under `authorization` instead
    Fallback,
}

/// Immutable compaction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Decompose credentials on outbound calls (`ENABLE_JWT_COMPRESSION`)
    pub enabled: bool,

    /// Active component encoding (`JWT_COMPRESSION_SCHEME`)
    pub scheme: Scheme,

    /// Header segment assumed by 2-way and 4-way reassembly (`JWT_HEADER_SEGMENT`)
    pub header_segment: Arc<str>,

    /// Behaviour on header mismatch (`JWT_HEADER_MISMATCH`)
    pub header_mismatch: HeaderMismatchPolicy,

    /// Services that never receive a credential (`JWT_ANONYMOUS_SERVICES`)
    pub anonymous_services: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CompactionEnv {
    enable_jwt_compression: Option<String>,
    jwt_compression_scheme: Option<Scheme>,
    jwt_header_segment: Option<String>,
    jwt_header_mismatch: Option<HeaderMismatchPolicy>,
    #[serde(default)]
    jwt_anonymous_services: Vec<String>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: Scheme::default(),
            header_segment: Arc::from(DEFAULT_HEADER_SEGMENT),
            header_mismatch: HeaderMismatchPolicy::default(),
            anonymous_services: Vec::new(),
        }
    }
}

impl CompactionConfig {
    /// Load configuration from environment variables
    ///
    /// Call once at process start; unset variables fall back to defaults
    /// (compaction disabled, 2-way scheme, RS256 header constant).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of key/value pairs
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: CompactionEnv = envy::from_iter(vars)?;

        let header_segment = match env.jwt_header_segment {
            Some(segment) => validate_header_segment(segment)?,
            None => DEFAULT_HEADER_SEGMENT.to_string(),
        };

        Ok(Self {
            enabled: env
                .enable_jwt_compression
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            scheme: env.jwt_compression_scheme.unwrap_or_default(),
            header_segment: Arc::from(header_segment),
            header_mismatch: env.jwt_header_mismatch.unwrap_or_default(),
            anonymous_services: env
                .jwt_anonymous_services
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Compaction enabled with the given scheme and default header constant
    pub fn compressed(scheme: Scheme) -> Self {
        Self {
            enabled: true,
            scheme,
            ..Self::default()
        }
    }

    pub fn with_header_segment(mut self, header_segment: impl Into<Arc<str>>) -> Self {
        self.header_segment = header_segment.into();
        self
    }

    pub fn with_header_mismatch(mut self, policy: HeaderMismatchPolicy) -> Self {
        self.header_mismatch = policy;
        self
    }

    pub fn with_anonymous_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.anonymous_services = services.into_iter().map(Into::into).collect();
        self
    }

    /// Whether calls to `service` are made without a credential
    ///
    /// Matches by substring so that either a bare service name or a fully
    /// qualified gRPC path can be passed.
    pub fn is_anonymous_service(&self, service: &str) -> bool {
        self.anonymous_services
            .iter()
            .any(|anonymous| service.contains(anonymous.as_str()))
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn validate_header_segment(segment: String) -> Result<String, ConfigError> {
    let segment = segment.trim().to_string();
    let valid = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if valid {
        Ok(segment)
    } else {
        Err(ConfigError::InvalidHeaderSegment(segment))
    }
}
