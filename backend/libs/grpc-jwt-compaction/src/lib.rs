//! JWT Credential Compaction for gRPC Microservices
//!
//! Propagates the end-user credential across a chain of gRPC services while
//! keeping per-call metadata small and stable enough for HPACK to index.
//! Instead of sending `authorization: Bearer <jwt>` on every hop, the credential
//! is split into components and the payload is carried as raw JSON.
//!
//! ## Core Components
//!
//! - **TokenCodec**: Stateless decompose / reassemble transform (2-, 3- and 4-way schemes)
//! - **WireFields**: Mapping between components and gRPC metadata fields
//! - **OriginatingInterceptor**: Attaches the credential on the first hop
//! - **RelayServerInterceptor / RelayClientInterceptor**: Capture and forward
//!   the credential at intermediate hops without re-encoding it
//! - **TerminalInterceptor**: Rebuilds the credential in leaf services
//! - **CredentialExt**: Request extension trait for handler access
//!
//! ## Fallback
//!
//! Compaction never fails a call. Whenever a credential cannot be decomposed
//! (compaction disabled, malformed credential, non-ASCII claims) the whole
//! credential travels under `authorization` instead, and a leaf that cannot
//! rebuild a credential treats the call as anonymous.
//!
//! ## Usage Example
//!
//! ### Edge (originating service)
//!
//! ```rust,no_run
//! use grpc_jwt_compaction::{CompactionConfig, OriginatingInterceptor};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Read once at startup
//! let config = CompactionConfig::from_env()?.into_shared();
//!
//! // Per end-user request
//! let token = "eyJhbGc...";
//! let interceptor = OriginatingInterceptor::new(&config, Some(token));
//! // let mut client = CheckoutServiceClient::with_interceptor(channel, interceptor);
//! # Ok(())
//! # }
//! ```
//!
//! ### Leaf (terminal service)
//!
//! ```rust,no_run
//! use grpc_jwt_compaction::{CompactionConfig, CredentialExt, TerminalInterceptor};
//! use tonic::{Request, Response, Status};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CompactionConfig::from_env()?;
//! let interceptor = TerminalInterceptor::new(&config);
//! // let service = CartServiceServer::with_interceptor(CartService, interceptor);
//! # Ok(())
//! # }
//!
//! async fn get_cart(request: Request<()>) -> Result<Response<()>, Status> {
//!     let credential = request.require_credential()?;
//!     let _claims = credential
//!         .claims()
//!         .map_err(|e| Status::unauthenticated(e.to_string()))?;
//!     Ok(Response::new(()))
//! }
//! ```
//!
//! ## Non-guarantees
//!
//! - Signatures are never verified here; leaves verify with their own keys
//! - 2-way and 4-way rebuild the header from `JWT_HEADER_SEGMENT`, so a
//!   credential issued with a different header is rebuilt with the wrong one
//!   unless `JWT_HEADER_MISMATCH=fallback`

mod claims;
mod client;
mod codec;
mod config;
mod context;
mod error;
mod extensions;
mod metrics;
mod relay;
mod server;

pub mod wire;

pub use claims::CredentialClaims;
pub use client::OriginatingInterceptor;
pub use codec::{Components, TokenCodec};
pub use config::{CompactionConfig, HeaderMismatchPolicy, Scheme, DEFAULT_HEADER_SEGMENT};
pub use context::{CallContext, Credential};
pub use error::{CompactionError, ConfigError};
pub use extensions::CredentialExt;
pub use relay::{RelayClientInterceptor, RelayServerInterceptor};
pub use server::TerminalInterceptor;
pub use wire::WireFields;

// Re-export tonic Status for convenience
pub use tonic::Status;
