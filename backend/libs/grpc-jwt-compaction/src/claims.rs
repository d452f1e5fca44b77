//! Read-only view over credential claims
//!
//! Claims are only parsed when local logic asks for them: a leaf service that
//! needs the caller, or a relay that must inspect claims before forwarding.
//! Pass-through relays never touch this module.

use crate::error::CompactionError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat claim-name → value mapping, in payload order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialClaims(Map<String, Value>);

impl CredentialClaims {
    /// Parse a raw JSON payload
    ///
    /// ## Errors
    ///
    /// Returns `CompactionError::Decode` if the text is not a JSON object
    pub fn from_json(json: &str) -> Result<Self, CompactionError> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| CompactionError::Decode(format!("claims are not a JSON object: {}", e)))
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// `sub` claim
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// `iss` claim
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Session identifier (`session_id`, or the OIDC `sid`)
    pub fn session_id(&self) -> Option<&str> {
        self.get_str("session_id").or_else(|| self.get_str("sid"))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("iat")
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("exp")
    }

    /// Whether `exp` lies at or before `now`
    ///
    /// A credential without `exp` never expires from this view's standpoint;
    /// expiry enforcement belongs to the issuer's verifier.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    /// Check if the subject matches a given identifier
    ///
    /// Useful for resource ownership checks in leaf services.
    pub fn is_subject(&self, subject: &str) -> bool {
        self.subject() == Some(subject)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let secs = self.0.get(name)?.as_i64()?;
        Utc.timestamp_opt(secs, 0).single()
    }
}
