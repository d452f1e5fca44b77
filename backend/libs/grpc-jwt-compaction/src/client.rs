//! Originating-side interceptor
//!
//! Attaches the caller's credential to every outgoing call, decomposed when
//! compaction is enabled and whole otherwise.

use crate::codec::TokenCodec;
use crate::config::{CompactionConfig, HeaderMismatchPolicy};
use crate::error::CompactionError;
use crate::metrics::CompactionMetrics;
use crate::wire::WireFields;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};

/// Client-side interceptor for the first hop of a call chain
///
/// The credential is decomposed once at construction and the resulting
/// metadata values are cloned into each request, so a client built for one
/// end-user request can issue any number of calls without re-encoding.
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_compaction::{CompactionConfig, OriginatingInterceptor};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CompactionConfig::from_env()?;
/// let token = "eyJhbGc..."; // From the session cookie
///
/// let interceptor = OriginatingInterceptor::new(&config, Some(token));
/// // let client = CartServiceClient::with_interceptor(channel, interceptor);
/// # Ok(())
/// # }
/// ```
///
/// Encoding failures never fail the call: the credential is sent whole
/// under `authorization` instead.
#[derive(Clone, Debug)]
pub struct OriginatingInterceptor {
    fields: WireFields,
    form: &'static str,
}

impl OriginatingInterceptor {
    /// Create an interceptor carrying `credential`
    ///
    /// `None` or an empty credential produces anonymous calls.
    pub fn new(config: &CompactionConfig, credential: Option<&str>) -> Self {
        let codec = TokenCodec::from_config(config);
        let (fields, form) = encode_credential(config, &codec, credential, "edge");
        Self { fields, form }
    }

    /// Create an interceptor for calls to `service`
    ///
    /// Services listed in `JWT_ANONYMOUS_SERVICES` get no credential at all.
    pub fn for_service(config: &CompactionConfig, service: &str, credential: Option<&str>) -> Self {
        if config.is_anonymous_service(service) {
            debug!(service, "Service is configured as anonymous, omitting credential");
            return Self::anonymous();
        }
        Self::new(config, credential)
    }

    /// Interceptor that sends no credential
    pub fn anonymous() -> Self {
        Self {
            fields: WireFields::none(),
            form: ANONYMOUS,
        }
    }

    /// Credential form put on the wire: `decomposed`, `whole` or `anonymous`
    pub fn form(&self) -> &'static str {
        self.form
    }

    pub fn fields(&self) -> &WireFields {
        &self.fields
    }
}

impl Interceptor for OriginatingInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        self.fields.apply(request.metadata_mut());
        CompactionMetrics::record_outbound("edge", self.form, self.fields.wire_len());
        Ok(request)
    }
}

pub(crate) const ANONYMOUS: &str = "anonymous";
pub(crate) const WHOLE: &str = "whole";
pub(crate) const DECOMPOSED: &str = "decomposed";

/// Encode a whole credential for the outbound side of `role`
///
/// Shared by the originating and relay interceptors so both apply the same
/// fallback rules.
pub(crate) fn encode_credential(
    config: &CompactionConfig,
    codec: &TokenCodec,
    credential: Option<&str>,
    role: &'static str,
) -> (WireFields, &'static str) {
    let credential = match credential {
        Some(credential) if !credential.trim().is_empty() => credential,
        _ => return (WireFields::none(), ANONYMOUS),
    };

    if config.enabled {
        match decompose_for_wire(config, codec, credential) {
            Ok(fields) => {
                debug!(
                    role,
                    scheme = %codec.scheme(),
                    original_len = credential.len(),
                    wire_len = fields.wire_len(),
                    "Credential decomposed for outbound call"
                );
                return (fields, DECOMPOSED);
            }
            Err(err) => {
                warn!(
                    role,
                    error = %err,
                    "Credential cannot be decomposed, sending it whole"
                );
                CompactionMetrics::record_fallback(err.kind());
            }
        }
    }

    whole_fields(credential, role)
}

/// Whole credential under `authorization`, or nothing if it cannot be
/// carried as metadata
pub(crate) fn whole_fields(credential: &str, role: &'static str) -> (WireFields, &'static str) {
    match WireFields::bearer(credential) {
        Ok(fields) => (fields, WHOLE),
        Err(err) => {
            warn!(
                role,
                error = %err,
                "Credential cannot be carried as metadata, sending call without it"
            );
            CompactionMetrics::record_fallback(err.kind());
            (WireFields::none(), ANONYMOUS)
        }
    }
}

fn decompose_for_wire(
    config: &CompactionConfig,
    codec: &TokenCodec,
    credential: &str,
) -> Result<WireFields, CompactionError> {
    if config.header_mismatch == HeaderMismatchPolicy::Fallback
        && codec.scheme().elides_header()
        && !codec.header_matches(credential)
    {
        return Err(CompactionError::HeaderMismatch);
    }

    let components = codec.decompose(credential)?;
    WireFields::decomposed(&components)
}
