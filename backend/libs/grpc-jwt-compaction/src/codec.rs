//! Credential decomposition and reassembly
//!
//! A credential is `header.payload.signature`. Decomposition decodes only the
//! payload segment into raw JSON text, which is roughly a quarter smaller than
//! its base64url form and stays byte-stable across calls of one session, so
//! HPACK can index it. Header and signature are never decoded.
//!
//! | scheme | carried on the wire                             | header on reassembly  |
//! |--------|-------------------------------------------------|-----------------------|
//! | 2-way  | payload JSON, signature                         | configured constant   |
//! | 3-way  | header, payload JSON, signature                 | carried header        |
//! | 4-way  | static / session / dynamic claim JSON, signature | configured constant   |
//!
//! The codec holds no state besides the immutable header constant and is
//! safe to share across any number of concurrent calls.

use crate::claims::CredentialClaims;
use crate::config::{CompactionConfig, Scheme};
use crate::error::CompactionError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Claims identical for every credential of an issuer
const STATIC_CLAIMS: &[&str] = &["iss", "aud", "azp"];

/// Claims that change on every issuance
const DYNAMIC_CLAIMS: &[&str] = &["iat", "exp", "nbf", "jti", "auth_time"];

/// Decomposed representation of a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Components {
    TwoWay {
        payload: String,
        signature: String,
    },
    ThreeWay {
        header: String,
        payload: String,
        signature: String,
    },
    FourWay {
        static_claims: String,
        session_claims: String,
        dynamic_claims: String,
        signature: String,
    },
}

impl Components {
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::TwoWay { .. } => Scheme::TwoWay,
            Self::ThreeWay { .. } => Scheme::ThreeWay,
            Self::FourWay { .. } => Scheme::FourWay,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Self::TwoWay { signature, .. }
            | Self::ThreeWay { signature, .. }
            | Self::FourWay { signature, .. } => signature,
        }
    }

    /// Header segment, when the scheme carries one
    pub fn header(&self) -> Option<&str> {
        match self {
            Self::ThreeWay { header, .. } => Some(header),
            _ => None,
        }
    }

    /// Total bytes of field values put on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Self::TwoWay { payload, signature } => payload.len() + signature.len(),
            Self::ThreeWay {
                header,
                payload,
                signature,
            } => header.len() + payload.len() + signature.len(),
            Self::FourWay {
                static_claims,
                session_claims,
                dynamic_claims,
                signature,
            } => static_claims.len() + session_claims.len() + dynamic_claims.len() + signature.len(),
        }
    }

    /// Parse claims straight from the carried JSON, no base64 pass
    pub fn claims(&self) -> Result<CredentialClaims, CompactionError> {
        match self {
            Self::TwoWay { payload, .. } | Self::ThreeWay { payload, .. } => {
                CredentialClaims::from_json(payload)
            }
            Self::FourWay {
                static_claims,
                session_claims,
                dynamic_claims,
                ..
            } => {
                let merged = merge_claims(static_claims, session_claims, dynamic_claims)?;
                Ok(CredentialClaims::from_map(merged))
            }
        }
    }
}

/// Stateless decompose/reassemble transform
#[derive(Debug, Clone)]
pub struct TokenCodec {
    scheme: Scheme,
    header_segment: Arc<str>,
}

impl TokenCodec {
    pub fn new(scheme: Scheme, header_segment: impl Into<Arc<str>>) -> Self {
        Self {
            scheme,
            header_segment: header_segment.into(),
        }
    }

    pub fn from_config(config: &CompactionConfig) -> Self {
        Self::new(config.scheme, Arc::clone(&config.header_segment))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn header_segment(&self) -> &str {
        &self.header_segment
    }

    /// Decompose with the codec's own scheme
    pub fn decompose(&self, credential: &str) -> Result<Components, CompactionError> {
        self.decompose_as(self.scheme, credential)
    }

    /// Decompose into an explicit scheme
    pub fn decompose_as(
        &self,
        scheme: Scheme,
        credential: &str,
    ) -> Result<Components, CompactionError> {
        let (header, payload, signature) = split_segments(credential)?;
        let payload = decode_payload(payload)?;

        Ok(match scheme {
            Scheme::TwoWay => Components::TwoWay {
                payload,
                signature: signature.to_string(),
            },
            Scheme::ThreeWay => Components::ThreeWay {
                header: header.to_string(),
                payload,
                signature: signature.to_string(),
            },
            Scheme::FourWay => {
                let (static_claims, session_claims, dynamic_claims) = partition_claims(&payload)?;
                Components::FourWay {
                    static_claims,
                    session_claims,
                    dynamic_claims,
                    signature: signature.to_string(),
                }
            }
        })
    }

    /// Rebuild `header.payload.signature`
    ///
    /// 2-way and 4-way components use the configured header constant. If the
    /// original credential was issued with a different header the result is
    /// a well-formed credential that no longer matches the original; this is
    /// not detected here.
    pub fn reassemble(&self, components: &Components) -> Result<String, CompactionError> {
        let (header, payload) = match components {
            Components::TwoWay { payload, .. } => (&*self.header_segment, encode_payload(payload)),
            Components::ThreeWay {
                header, payload, ..
            } => (header.as_str(), encode_payload(payload)),
            Components::FourWay {
                static_claims,
                session_claims,
                dynamic_claims,
                ..
            } => {
                let merged = merge_claims(static_claims, session_claims, dynamic_claims)?;
                let json = serde_json::to_string(&merged)
                    .map_err(|e| CompactionError::Decode(e.to_string()))?;
                (&*self.header_segment, encode_payload(&json))
            }
        };

        Ok(format!("{}.{}.{}", header, payload, components.signature()))
    }

    /// Whether the credential's header equals the configured constant
    pub fn header_matches(&self, credential: &str) -> bool {
        credential
            .split('.')
            .next()
            .is_some_and(|header| header == &*self.header_segment)
    }
}

/// Split into exactly three segments
pub(crate) fn split_segments(credential: &str) -> Result<(&str, &str, &str), CompactionError> {
    let mut parts = credential.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(CompactionError::Format {
            segments: credential.split('.').count(),
        }),
    }
}

pub(crate) fn decode_payload(segment: &str) -> Result<String, CompactionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CompactionError::Decode(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| CompactionError::Decode(e.to_string()))
}

pub(crate) fn encode_payload(json: &str) -> String {
    URL_SAFE_NO_PAD.encode(json.as_bytes())
}

fn parse_object(json: &str) -> Result<Map<String, Value>, CompactionError> {
    serde_json::from_str(json)
        .map_err(|e| CompactionError::Decode(format!("claims are not a JSON object: {}", e)))
}

/// Split payload claims into static, session and dynamic subsets,
/// each keeping the original claim order
///
/// Fails with `Decode` unless merging the subsets back reproduces `payload`
/// byte for byte. Interleaved groups, whitespace, non-canonical numbers and
/// duplicate names all change the bytes and would leave the signature
/// covering a different payload.
fn partition_claims(payload: &str) -> Result<(String, String, String), CompactionError> {
    let claims = parse_object(payload)?;

    let mut static_claims = Map::new();
    let mut session_claims = Map::new();
    let mut dynamic_claims = Map::new();

    for (name, value) in claims {
        if STATIC_CLAIMS.contains(&name.as_str()) {
            static_claims.insert(name, value);
        } else if DYNAMIC_CLAIMS.contains(&name.as_str()) {
            dynamic_claims.insert(name, value);
        } else {
            session_claims.insert(name, value);
        }
    }

    let encode = |map: &Map<String, Value>| {
        serde_json::to_string(map).map_err(|e| CompactionError::Decode(e.to_string()))
    };

    let parts = (
        encode(&static_claims)?,
        encode(&session_claims)?,
        encode(&dynamic_claims)?,
    );

    let merged = merge_claims(&parts.0, &parts.1, &parts.2)?;
    if encode(&merged)? != payload {
        return Err(CompactionError::Decode(
            "payload is not compact JSON grouped as static, session, dynamic claims".to_string(),
        ));
    }

    Ok(parts)
}

fn merge_claims(
    static_claims: &str,
    session_claims: &str,
    dynamic_claims: &str,
) -> Result<Map<String, Value>, CompactionError> {
    let mut merged = parse_object(static_claims)?;
    merged.extend(parse_object(session_claims)?);
    merged.extend(parse_object(dynamic_claims)?);
    Ok(merged)
}
