//! Per-call credential state

use crate::claims::CredentialClaims;
use crate::codec::{decode_payload, split_segments, Components, TokenCodec};
use crate::error::CompactionError;
use std::fmt;

/// Whole three-segment credential
///
/// `Debug` prints only the length so credentials never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment, if the credential is well formed
    pub fn header_segment(&self) -> Option<&str> {
        split_segments(&self.0).ok().map(|(header, _, _)| header)
    }

    /// Decode the payload segment and parse its claims
    pub fn claims(&self) -> Result<CredentialClaims, CompactionError> {
        let (_, payload, _) = split_segments(&self.0)?;
        CredentialClaims::from_json(&decode_payload(payload)?)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("len", &self.0.len())
            .finish()
    }
}

impl AsRef<str> for Credential {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// What the current hop knows about the caller's credential
///
/// Created when a call is received, consulted when nested calls are made,
/// dropped with the call. Each in-flight call owns its own value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CallContext {
    /// No credential arrived with the call
    #[default]
    Anonymous,
    /// Credential arrived whole under `authorization`
    Whole(Credential),
    /// Credential arrived decomposed; kept verbatim for pass-through
    Decomposed(Components),
}

impl CallContext {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Short label for logs and metrics
    pub fn form(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Whole(_) => "whole",
            Self::Decomposed(_) => "decomposed",
        }
    }

    /// Rebuild the whole credential
    ///
    /// This is the slow path for hops that need to read or rewrite the
    /// credential; pass-through forwarding never calls it.
    pub fn resolve(&self, codec: &TokenCodec) -> Result<Option<Credential>, CompactionError> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Whole(credential) => Ok(Some(credential.clone())),
            Self::Decomposed(components) => codec.reassemble(components).map(|t| Some(t.into())),
        }
    }

    /// Parse claims for local inspection
    ///
    /// Decomposed components are parsed straight from their raw JSON.
    pub fn claims(&self) -> Result<Option<CredentialClaims>, CompactionError> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Whole(credential) => credential.claims().map(Some),
            Self::Decomposed(components) => components.claims().map(Some),
        }
    }
}
