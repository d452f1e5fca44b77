//! Request extension trait for credential access
//!
//! Provides ergonomic helpers for reading what the server-side interceptors
//! stored on a request.

use crate::claims::CredentialClaims;
use crate::context::{CallContext, Credential};
use crate::error::CompactionError;
use tonic::{Request, Status};

static ANONYMOUS: CallContext = CallContext::Anonymous;

/// Extension trait for accessing the caller's credential from gRPC requests
///
/// Implemented for all `Request<T>` types. Values are the ones stored by
/// [`TerminalInterceptor`](crate::TerminalInterceptor) and
/// [`RelayServerInterceptor`](crate::RelayServerInterceptor).
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_compaction::CredentialExt;
/// use tonic::{Request, Response, Status};
///
/// async fn get_cart(request: Request<()>) -> Result<Response<()>, Status> {
///     // Fails with `unauthenticated` for anonymous callers
///     let credential = request.require_credential()?;
///
///     let claims = credential
///         .claims()
///         .map_err(|e| Status::unauthenticated(e.to_string()))?;
///     let _user = claims.subject();
///
///     Ok(Response::new(()))
/// }
/// ```
pub trait CredentialExt {
    /// Whole credential stored by the terminal interceptor
    fn credential(&self) -> Option<&Credential>;

    /// Require a credential for handlers that need a caller
    ///
    /// ## Errors
    ///
    /// Returns `Status::unauthenticated` if the call carried no usable
    /// credential or no terminal interceptor was attached
    fn require_credential(&self) -> Result<&Credential, Status>;

    /// Inbound credential form as captured, anonymous if nothing was stored
    fn call_context(&self) -> &CallContext;

    /// Parse the caller's claims
    ///
    /// Prefers the reassembled credential; otherwise parses the captured
    /// context, which avoids a base64 pass for decomposed credentials.
    fn credential_claims(&self) -> Result<Option<CredentialClaims>, CompactionError>;
}

impl<T> CredentialExt for Request<T> {
    fn credential(&self) -> Option<&Credential> {
        self.extensions().get::<Credential>()
    }

    fn require_credential(&self) -> Result<&Credential, Status> {
        self.credential()
            .ok_or_else(|| Status::unauthenticated("Missing credential"))
    }

    fn call_context(&self) -> &CallContext {
        self.extensions().get::<CallContext>().unwrap_or(&ANONYMOUS)
    }

    fn credential_claims(&self) -> Result<Option<CredentialClaims>, CompactionError> {
        match self.credential() {
            Some(credential) => credential.claims().map(Some),
            None => self.call_context().claims(),
        }
    }
}
