//! Terminal (leaf service) interceptor
//!
//! Rebuilds the caller's credential from whichever form the inbound call
//! carries and stores it in request extensions for handler access.

use crate::codec::TokenCodec;
use crate::config::CompactionConfig;
use crate::context::{CallContext, Credential};
use crate::metrics::CompactionMetrics;
use crate::wire;
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};

/// Server-side interceptor for leaf services
///
/// This interceptor:
/// 1. Reads decomposed fields or the `authorization` field from metadata
/// 2. Reassembles components with the configured header constant
/// 3. Stores the [`Credential`] and the raw [`CallContext`] in extensions
///
/// Signatures are not verified here. A call without a usable credential is
/// let through as anonymous; handlers that need a caller use
/// [`CredentialExt::require_credential`](crate::CredentialExt::require_credential).
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_compaction::{CompactionConfig, TerminalInterceptor};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CompactionConfig::from_env()?;
/// let interceptor = TerminalInterceptor::new(&config);
/// // let service = CartServiceServer::with_interceptor(CartService, interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TerminalInterceptor {
    codec: TokenCodec,
}

impl TerminalInterceptor {
    pub fn new(config: &CompactionConfig) -> Self {
        Self {
            codec: TokenCodec::from_config(config),
        }
    }

    /// Read the inbound credential, reassembling it if decomposed
    pub fn extract(&self, metadata: &MetadataMap) -> Option<Credential> {
        Self::resolve(&self.codec, &wire::capture(metadata))
    }

    fn resolve(codec: &TokenCodec, context: &CallContext) -> Option<Credential> {
        match context.resolve(codec) {
            Ok(credential) => credential,
            Err(err) => {
                warn!(
                    error = %err,
                    form = context.form(),
                    "Inbound credential cannot be reassembled, treating call as anonymous"
                );
                CompactionMetrics::record_fallback(err.kind());
                None
            }
        }
    }
}

impl Interceptor for TerminalInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let context = wire::capture(request.metadata());
        let credential = Self::resolve(&self.codec, &context);

        debug!(
            form = context.form(),
            credential_len = credential.as_ref().map(Credential::len),
            "Inbound credential resolved"
        );

        if let Some(credential) = credential {
            request.extensions_mut().insert(credential);
        }
        request.extensions_mut().insert(context);

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scheme;
    use tonic::metadata::MetadataValue;

    const TOKEN: &str = "aGVhZGVy.eyJzdWIiOiJ1MSJ9.c2ln";

    fn interceptor() -> TerminalInterceptor {
        TerminalInterceptor::new(
            &CompactionConfig::compressed(Scheme::TwoWay).with_header_segment("aGVhZGVy"),
        )
    }

    #[test]
    fn test_extract_reassembles_two_way() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-jwt-payload", MetadataValue::from_static(r#"{"sub":"u1"}"#));
        metadata.insert("x-jwt-sig", MetadataValue::from_static("c2ln"));

        assert_eq!(interceptor().extract(&metadata), Some(Credential::new(TOKEN)));
    }

    #[test]
    fn test_extract_reads_bearer() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "authorization",
            MetadataValue::from_static("Bearer aGVhZGVy.eyJzdWIiOiJ1MSJ9.c2ln"),
        );

        assert_eq!(interceptor().extract(&metadata), Some(Credential::new(TOKEN)));
    }

    #[test]
    fn test_no_credential_is_not_rejected() {
        let request = interceptor().call(Request::new(())).unwrap();

        assert!(request.extensions().get::<Credential>().is_none());
        assert_eq!(
            request.extensions().get::<CallContext>(),
            Some(&CallContext::Anonymous)
        );
    }

    #[test]
    fn test_interceptor_stores_credential_in_extensions() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("x-jwt-scheme", MetadataValue::from_static("3"));
        request
            .metadata_mut()
            .insert("x-jwt-header", MetadataValue::from_static("aGVhZGVy"));
        request
            .metadata_mut()
            .insert("x-jwt-payload", MetadataValue::from_static(r#"{"sub":"u1"}"#));
        request
            .metadata_mut()
            .insert("x-jwt-sig", MetadataValue::from_static("c2ln"));

        let request = interceptor().call(request).unwrap();
        assert_eq!(
            request.extensions().get::<Credential>(),
            Some(&Credential::new(TOKEN))
        );
    }

    #[test]
    fn test_corrupt_four_way_is_anonymous() {
        let mut request = Request::new(());
        for (name, value) in [
            ("x-jwt-static", "{}"),
            ("x-jwt-session", "not json"),
            ("x-jwt-dynamic", "{}"),
            ("x-jwt-sig", "c2ln"),
        ] {
            request
                .metadata_mut()
                .insert(name, MetadataValue::from_static(value));
        }

        let request = interceptor().call(request).unwrap();
        assert!(request.extensions().get::<Credential>().is_none());
    }
}
