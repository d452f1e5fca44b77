//! Relay (intermediate hop) interceptors
//!
//! A relay neither reads nor rewrites the credential, so whatever form
//! arrives on the inbound call is re-emitted on nested calls. Decomposed
//! fields in the locally active scheme are forwarded byte-for-byte without
//! touching the codec.
//!
//! ```text
//! inbound metadata -> RelayServerInterceptor -> CallContext (extensions)
//!                                                    |
//!            nested call <- RelayClientInterceptor <-+
//! ```

use crate::client::{encode_credential, whole_fields, ANONYMOUS, DECOMPOSED};
use crate::codec::{Components, TokenCodec};
use crate::config::CompactionConfig;
use crate::context::{CallContext, Credential};
use crate::metrics::CompactionMetrics;
use crate::wire::{self, WireFields};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};

const ROLE: &str = "relay";

/// Server-side interceptor that captures the inbound credential
///
/// Stores a [`CallContext`] in the request extensions. Never rejects a call:
/// unusable decomposed fields fall back to `authorization`, and then to an
/// anonymous context.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelayServerInterceptor;

impl Interceptor for RelayServerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let context = wire::capture(request.metadata());
        debug!(form = context.form(), "Captured inbound credential");
        request.extensions_mut().insert(context);
        Ok(request)
    }
}

/// Client-side interceptor that forwards a captured credential
///
/// Built per inbound call from its [`CallContext`], then attached to every
/// nested client the handler creates.
///
/// ```rust,no_run
/// use grpc_jwt_compaction::{CompactionConfig, RelayClientInterceptor};
/// use tonic::{Request, Response, Status};
///
/// async fn place_order(
///     config: &CompactionConfig,
///     request: Request<()>,
/// ) -> Result<Response<()>, Status> {
///     let forward = RelayClientInterceptor::from_request(config, &request);
///     // let mut cart = CartServiceClient::with_interceptor(channel, forward.clone());
///     // let mut payment = PaymentServiceClient::with_interceptor(channel, forward);
///     Ok(Response::new(()))
/// }
/// ```
#[derive(Clone, Debug)]
pub struct RelayClientInterceptor {
    fields: WireFields,
    form: &'static str,
}

impl RelayClientInterceptor {
    /// Precompute outbound fields for a captured context
    pub fn from_context(config: &CompactionConfig, context: &CallContext) -> Self {
        let codec = TokenCodec::from_config(config);

        let (fields, form) = match context {
            CallContext::Anonymous => (WireFields::none(), ANONYMOUS),
            CallContext::Whole(credential) => {
                encode_credential(config, &codec, Some(credential.as_str()), ROLE)
            }
            CallContext::Decomposed(components) => forward_components(config, &codec, components),
        };

        Self { fields, form }
    }

    /// Forward the context captured by [`RelayServerInterceptor`]
    ///
    /// Reads the inbound metadata directly when the server interceptor was
    /// not installed.
    pub fn from_request<T>(config: &CompactionConfig, request: &Request<T>) -> Self {
        match request.extensions().get::<CallContext>() {
            Some(context) => Self::from_context(config, context),
            None => Self::from_context(config, &wire::capture(request.metadata())),
        }
    }

    /// Forward a credential the relay has read or rewritten
    ///
    /// This is the slow path: the credential is decomposed again.
    pub fn from_credential(config: &CompactionConfig, credential: Option<&Credential>) -> Self {
        let codec = TokenCodec::from_config(config);
        let (fields, form) = encode_credential(config, &codec, credential.map(Credential::as_str), ROLE);
        Self { fields, form }
    }

    /// Credential form put on the wire: `decomposed`, `whole` or `anonymous`
    pub fn form(&self) -> &'static str {
        self.form
    }

    pub fn fields(&self) -> &WireFields {
        &self.fields
    }
}

impl Interceptor for RelayClientInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        self.fields.apply(request.metadata_mut());
        CompactionMetrics::record_outbound(ROLE, self.form, self.fields.wire_len());
        Ok(request)
    }
}

fn forward_components(
    config: &CompactionConfig,
    codec: &TokenCodec,
    components: &Components,
) -> (WireFields, &'static str) {
    if config.enabled && components.scheme() == config.scheme {
        // Values came from ASCII metadata, so re-emitting them cannot fail
        if let Ok(fields) = WireFields::decomposed(components) {
            debug!(scheme = %config.scheme, "Forwarding decomposed credential unchanged");
            return (fields, DECOMPOSED);
        }
    }

    let credential = match codec.reassemble(components) {
        Ok(credential) => credential,
        Err(err) => {
            warn!(
                error = %err,
                scheme = %components.scheme(),
                "Inbound credential components cannot be reassembled, forwarding without credential"
            );
            CompactionMetrics::record_fallback(err.kind());
            return (WireFields::none(), ANONYMOUS);
        }
    };

    debug!(
        inbound_scheme = %components.scheme(),
        enabled = config.enabled,
        "Reassembled inbound credential for re-encoding"
    );

    if config.enabled {
        encode_credential(config, codec, Some(credential.as_str()), ROLE)
    } else {
        whole_fields(&credential, ROLE)
    }
}
