/// Fault injection and retry for gRPC clients
///
/// This library provides the call-level resilience pieces used around the
/// credential interceptors:
/// - **Fault Injection**: Short-circuits a configurable share of calls with a transient status
/// - **Retry**: Linear backoff for transient failures (`Unavailable`, `DeadlineExceeded`, `Aborted`)
/// - **Interceptor Chain**: Runs the fault injector ahead of another interceptor on one client
///
/// None of these read or write credential metadata.
///
/// # Example: faulted client with retries
///
/// ```rust,no_run
/// use resilience::{with_retry, FaultInjectionConfig, FaultInjector, RetryConfig};
/// use tonic::Status;
///
/// #[tokio::main]
/// async fn main() {
///     let faults = FaultInjectionConfig::from_env();
///     let _injector = FaultInjector::for_service(&faults, "CartService");
///     // let mut client = CartServiceClient::with_interceptor(channel, injector);
///
///     let result = with_retry(&RetryConfig::default(), "/hipstershop.CartService/GetCart", || async {
///         // client.get_cart(request).await
///         Ok::<_, Status>(())
///     })
///     .await;
/// }
/// ```

pub mod chain;
pub mod fault_injection;
pub mod metrics;
pub mod retry;

// Re-export main types for convenience
pub use chain::InterceptorChain;
pub use fault_injection::{
    FaultInjectionConfig, FaultInjector, FaultKind, FaultTarget, INJECTED_ERROR_PREFIX,
};
pub use retry::{is_transient, with_retry, RetryConfig, RetryError};
