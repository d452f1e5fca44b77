//! Mapping between codec output and gRPC metadata fields
//!
//! | scheme   | fields                                                         |
//! |----------|----------------------------------------------------------------|
//! | 4-way    | `x-jwt-static`, `x-jwt-session`, `x-jwt-dynamic`, `x-jwt-sig`  |
//! | 3-way    | `x-jwt-header`, `x-jwt-payload`, `x-jwt-sig`                   |
//! | 2-way    | `x-jwt-payload`, `x-jwt-sig`                                   |
//! | fallback | `authorization: Bearer <credential>`                           |
//!
//! Decomposed fields are accompanied by `x-jwt-scheme` so receivers never
//! have to guess which encoding a peer used. Peers that omit it are read by
//! field presence.

use crate::codec::Components;
use crate::config::Scheme;
use crate::context::{CallContext, Credential};
use crate::error::CompactionError;
use crate::metrics::CompactionMetrics;
use std::fmt;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tracing::warn;

/// Metadata field names
pub mod fields {
    pub const AUTHORIZATION: &str = "authorization";
    pub const SCHEME: &str = "x-jwt-scheme";
    pub const HEADER: &str = "x-jwt-header";
    pub const PAYLOAD: &str = "x-jwt-payload";
    pub const SIGNATURE: &str = "x-jwt-sig";
    pub const STATIC: &str = "x-jwt-static";
    pub const SESSION: &str = "x-jwt-session";
    pub const DYNAMIC: &str = "x-jwt-dynamic";

    /// Every field that can carry a credential or part of one
    pub const ALL: &[&str] = &[
        AUTHORIZATION,
        SCHEME,
        HEADER,
        PAYLOAD,
        SIGNATURE,
        STATIC,
        SESSION,
        DYNAMIC,
    ];
}

const BEARER_PREFIX: &str = "Bearer ";

/// Credential fields for one outbound call, validated up front
#[derive(Clone, Default)]
pub struct WireFields {
    entries: Vec<(&'static str, AsciiMetadataValue)>,
}

impl WireFields {
    /// No credential fields (anonymous call)
    pub fn none() -> Self {
        Self::default()
    }

    /// Whole credential under `authorization`
    pub fn bearer(credential: &str) -> Result<Self, CompactionError> {
        let value = ascii_value(fields::AUTHORIZATION, &format!("{}{}", BEARER_PREFIX, credential))?;
        Ok(Self {
            entries: vec![(fields::AUTHORIZATION, value)],
        })
    }

    /// Decomposed fields for the components' own scheme
    pub fn decomposed(components: &Components) -> Result<Self, CompactionError> {
        let scheme = ascii_value(fields::SCHEME, components.scheme().wire_tag())?;
        let mut entries = vec![(fields::SCHEME, scheme)];

        let parts: Vec<(&'static str, &str)> = match components {
            Components::TwoWay { payload, signature } => {
                vec![(fields::PAYLOAD, payload.as_str()), (fields::SIGNATURE, signature.as_str())]
            }
            Components::ThreeWay {
                header,
                payload,
                signature,
            } => vec![
                (fields::HEADER, header.as_str()),
                (fields::PAYLOAD, payload.as_str()),
                (fields::SIGNATURE, signature.as_str()),
            ],
            Components::FourWay {
                static_claims,
                session_claims,
                dynamic_claims,
                signature,
            } => vec![
                (fields::STATIC, static_claims.as_str()),
                (fields::SESSION, session_claims.as_str()),
                (fields::DYNAMIC, dynamic_claims.as_str()),
                (fields::SIGNATURE, signature.as_str()),
            ],
        };

        for (name, value) in parts {
            entries.push((name, ascii_value(name, value)?));
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_decomposed(&self) -> bool {
        self.entries.iter().any(|(name, _)| *name == fields::SCHEME)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.to_str().ok())
    }

    /// Bytes of field values, excluding names
    pub fn wire_len(&self) -> usize {
        self.entries.iter().map(|(_, value)| value.len()).sum()
    }

    /// Replace any credential fields already present with these
    pub fn apply(&self, metadata: &mut MetadataMap) {
        strip_credential_fields(metadata);
        for (name, value) in &self.entries {
            metadata.insert(*name, value.clone());
        }
    }
}

impl fmt::Debug for WireFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireFields")
            .field("names", &self.names().collect::<Vec<_>>())
            .field("wire_len", &self.wire_len())
            .finish()
    }
}

/// Remove every credential-bearing field
pub fn strip_credential_fields(metadata: &mut MetadataMap) {
    for name in fields::ALL {
        metadata.remove(*name);
    }
}

/// Read whichever credential form the call carries
///
/// ## Errors
///
/// - `MissingField` if the call indicates a decomposed scheme but lacks one
///   of its fields
/// - `InvalidMetadata` if a field is not readable text or the scheme tag is
///   unknown
pub fn read_inbound(metadata: &MetadataMap) -> Result<CallContext, CompactionError> {
    match detect_scheme(metadata)? {
        Some(scheme) => read_components(metadata, scheme).map(CallContext::Decomposed),
        None => Ok(read_bearer(metadata)
            .map(CallContext::Whole)
            .unwrap_or_default()),
    }
}

/// `read_inbound` with local recovery
///
/// Unusable decomposed fields fall back to the `authorization` field, and
/// to an anonymous context when that is absent too.
pub fn capture(metadata: &MetadataMap) -> CallContext {
    match read_inbound(metadata) {
        Ok(context) => context,
        Err(err) => {
            warn!(
                error = %err,
                "Unusable decomposed credential on inbound call, falling back to authorization"
            );
            CompactionMetrics::record_fallback(err.kind());
            read_bearer(metadata)
                .map(CallContext::Whole)
                .unwrap_or_default()
        }
    }
}

/// Whole credential from `authorization: Bearer <credential>`
pub fn read_bearer(metadata: &MetadataMap) -> Option<Credential> {
    let value = metadata.get(fields::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| value.strip_prefix("bearer "))?;

    if token.trim().is_empty() {
        None
    } else {
        Some(Credential::new(token))
    }
}

fn detect_scheme(metadata: &MetadataMap) -> Result<Option<Scheme>, CompactionError> {
    if let Some(tag) = metadata.get(fields::SCHEME) {
        let tag = tag
            .to_str()
            .map_err(|_| CompactionError::InvalidMetadata(fields::SCHEME))?;
        return Scheme::from_wire_tag(tag.trim())
            .map(Some)
            .ok_or(CompactionError::InvalidMetadata(fields::SCHEME));
    }

    let scheme = if metadata.contains_key(fields::STATIC) {
        Some(Scheme::FourWay)
    } else if metadata.contains_key(fields::HEADER) {
        Some(Scheme::ThreeWay)
    } else if metadata.contains_key(fields::PAYLOAD) {
        Some(Scheme::TwoWay)
    } else {
        None
    };

    Ok(scheme)
}

fn read_components(metadata: &MetadataMap, scheme: Scheme) -> Result<Components, CompactionError> {
    let field = |name: &'static str| -> Result<String, CompactionError> {
        metadata
            .get(name)
            .ok_or(CompactionError::MissingField(name))?
            .to_str()
            .map(str::to_string)
            .map_err(|_| CompactionError::InvalidMetadata(name))
    };

    Ok(match scheme {
        Scheme::TwoWay => Components::TwoWay {
            payload: field(fields::PAYLOAD)?,
            signature: field(fields::SIGNATURE)?,
        },
        Scheme::ThreeWay => Components::ThreeWay {
            header: field(fields::HEADER)?,
            payload: field(fields::PAYLOAD)?,
            signature: field(fields::SIGNATURE)?,
        },
        Scheme::FourWay => Components::FourWay {
            static_claims: field(fields::STATIC)?,
            session_claims: field(fields::SESSION)?,
            dynamic_claims: field(fields::DYNAMIC)?,
            signature: field(fields::SIGNATURE)?,
        },
    })
}

/// gRPC ASCII metadata only admits visible characters and spaces
fn ascii_value(field: &'static str, value: &str) -> Result<AsciiMetadataValue, CompactionError> {
    if !value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        return Err(CompactionError::InvalidMetadata(field));
    }

    AsciiMetadataValue::try_from(value).map_err(|_| CompactionError::InvalidMetadata(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    fn two_way() -> Components {
        Components::TwoWay {
            payload: r#"{"sub":"u1"}"#.to_string(),
            signature: "c2ln".to_string(),
        }
    }

    #[test]
    fn test_bearer_fields() {
        let fields = WireFields::bearer("a.b.c").unwrap();

        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["authorization"]);
        assert_eq!(fields.get("authorization"), Some("Bearer a.b.c"));
        assert!(!fields.is_decomposed());
    }

    #[test]
    fn test_bearer_rejects_control_characters() {
        assert_eq!(
            WireFields::bearer("a.b\n.c").unwrap_err(),
            CompactionError::InvalidMetadata("authorization")
        );
    }

    #[test]
    fn test_decomposed_fields_per_scheme() {
        let three = Components::ThreeWay {
            header: "aGVhZGVy".to_string(),
            payload: "{}".to_string(),
            signature: "c2ln".to_string(),
        };
        let four = Components::FourWay {
            static_claims: "{}".to_string(),
            session_claims: r#"{"sub":"u1"}"#.to_string(),
            dynamic_claims: "{}".to_string(),
            signature: "c2ln".to_string(),
        };

        let names = |c: &Components| WireFields::decomposed(c).unwrap().names().collect::<Vec<_>>();

        assert_eq!(names(&two_way()), vec!["x-jwt-scheme", "x-jwt-payload", "x-jwt-sig"]);
        assert_eq!(
            names(&three),
            vec!["x-jwt-scheme", "x-jwt-header", "x-jwt-payload", "x-jwt-sig"]
        );
        assert_eq!(
            names(&four),
            vec![
                "x-jwt-scheme",
                "x-jwt-static",
                "x-jwt-session",
                "x-jwt-dynamic",
                "x-jwt-sig"
            ]
        );
    }

    #[test]
    fn test_non_ascii_payload_cannot_be_carried() {
        let components = Components::TwoWay {
            payload: r#"{"name":"José"}"#.to_string(),
            signature: "c2ln".to_string(),
        };

        assert_eq!(
            WireFields::decomposed(&components).unwrap_err(),
            CompactionError::InvalidMetadata("x-jwt-payload")
        );
    }

    #[test]
    fn test_apply_replaces_existing_credential_fields() {
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", MetadataValue::from_static("Bearer stale"));
        metadata.insert("x-request-id", MetadataValue::from_static("req-1"));

        WireFields::decomposed(&two_way()).unwrap().apply(&mut metadata);

        assert!(metadata.get("authorization").is_none());
        assert_eq!(metadata.get("x-jwt-payload").unwrap().to_str().unwrap(), r#"{"sub":"u1"}"#);
        assert_eq!(metadata.get("x-jwt-sig").unwrap().to_str().unwrap(), "c2ln");
        assert_eq!(metadata.get("x-jwt-scheme").unwrap().to_str().unwrap(), "2");
        assert_eq!(metadata.get("x-request-id").unwrap().to_str().unwrap(), "req-1");
    }

    #[test]
    fn test_read_inbound_round_trips_outbound_fields() {
        let mut metadata = MetadataMap::new();
        WireFields::decomposed(&two_way()).unwrap().apply(&mut metadata);

        assert_eq!(
            read_inbound(&metadata).unwrap(),
            CallContext::Decomposed(two_way())
        );
    }

    #[test]
    fn test_read_inbound_detects_legacy_peers_by_presence() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-header", MetadataValue::from_static("aGVhZGVy"));
        metadata.insert("x-jwt-payload", MetadataValue::from_static("{}"));
        metadata.insert("x-jwt-sig", MetadataValue::from_static("c2ln"));

        let context = read_inbound(&metadata).unwrap();
        match context {
            CallContext::Decomposed(components) => {
                assert_eq!(components.scheme(), Scheme::ThreeWay)
            }
            other => panic!("expected decomposed context, got {:?}", other),
        }
    }

    #[test]
    fn test_read_inbound_missing_signature() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-payload", MetadataValue::from_static("{}"));

        assert_eq!(
            read_inbound(&metadata).unwrap_err(),
            CompactionError::MissingField("x-jwt-sig")
        );
    }

    #[test]
    fn test_read_inbound_unknown_scheme_tag() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-scheme", MetadataValue::from_static("9"));

        assert_eq!(
            read_inbound(&metadata).unwrap_err(),
            CompactionError::InvalidMetadata("x-jwt-scheme")
        );
    }

    #[test]
    fn test_capture_falls_back_to_authorization() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-payload", MetadataValue::from_static("{}"));
        metadata.insert("authorization", MetadataValue::from_static("Bearer a.b.c"));

        assert_eq!(capture(&metadata), CallContext::Whole("a.b.c".into()));
    }

    #[test]
    fn test_capture_falls_back_to_anonymous() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-payload", MetadataValue::from_static("{}"));

        assert_eq!(capture(&metadata), CallContext::Anonymous);
    }

    #[test]
    fn test_read_bearer_variants() {
        let read = |value: &'static str| {
            let mut metadata = MetadataMap::new();
            metadata.insert("authorization", MetadataValue::from_static(value));
            read_bearer(&metadata)
        };

        assert_eq!(read("Bearer a.b.c"), Some(Credential::new("a.b.c")));
        assert_eq!(read("bearer a.b.c"), Some(Credential::new("a.b.c")));
        assert_eq!(read("Bearer "), None);
        assert_eq!(read("Bearer    "), None);
        assert_eq!(read("Bearer  a.b.c "), Some(Credential::new(" a.b.c ")));
        assert_eq!(read("Basic dXNlcjpwYXNz"), None);
        assert_eq!(read_bearer(&MetadataMap::new()), None);
    }

    #[test]
    fn test_debug_does_not_print_values() {
        let printed = format!("{:?}", WireFields::bearer("secret.token.value").unwrap());
        assert!(!printed.contains("secret"));
        assert!(printed.contains("authorization"));
    }
}
