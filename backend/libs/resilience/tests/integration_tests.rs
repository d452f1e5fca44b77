/// Integration tests for resilience library
use grpc_jwt_compaction::{CompactionConfig, OriginatingInterceptor, Scheme};
use resilience::{
    is_transient, with_retry, FaultInjectionConfig, FaultInjector, FaultKind, FaultTarget,
    InterceptorChain, RetryConfig, RetryError, INJECTED_ERROR_PREFIX,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonic::service::Interceptor;
use tonic::{Code, Request, Status};

const TOKEN: &str = "aGVhZGVy.eyJzdWIiOiJ1MSJ9.c2ln";

fn credential_interceptor() -> OriginatingInterceptor {
    let config = CompactionConfig::compressed(Scheme::TwoWay).with_header_segment("aGVhZGVy");
    OriginatingInterceptor::new(&config, Some(TOKEN))
}

// ==================== Interceptor Chain Tests ====================

#[test]
fn test_injected_fault_stops_before_credential_interceptor() {
    let injector = FaultInjector::seeded(
        &FaultInjectionConfig::always(FaultKind::ConnectionRefused),
        "CartService",
        1,
    );
    let mut chain = InterceptorChain::new(injector, credential_interceptor());

    let status = chain.call(Request::new(())).unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().starts_with(INJECTED_ERROR_PREFIX));
    assert!(is_transient(&status));
}

#[test]
fn test_passing_call_keeps_credential_fields_intact() {
    let injector = FaultInjector::seeded(&FaultInjectionConfig::default(), "CartService", 1);
    let mut chain = InterceptorChain::new(injector, credential_interceptor());

    let request = chain.call(Request::new(())).unwrap();
    let metadata = request.metadata();

    assert_eq!(metadata.get("x-jwt-scheme").unwrap().to_str().unwrap(), "2");
    assert_eq!(
        metadata.get("x-jwt-payload").unwrap().to_str().unwrap(),
        r#"{"sub":"u1"}"#
    );
    assert_eq!(metadata.get("x-jwt-sig").unwrap().to_str().unwrap(), "c2ln");
    assert_eq!(metadata.len(), 3);
}

#[test]
fn test_untargeted_service_is_untouched() {
    let config = FaultInjectionConfig {
        target: FaultTarget::parse("CartService"),
        ..FaultInjectionConfig::always(FaultKind::Unavailable)
    };
    let injector = FaultInjector::seeded(&config, "/hipstershop.CurrencyService/Convert", 1);
    let mut chain = InterceptorChain::new(injector, credential_interceptor());

    for _ in 0..20 {
        assert!(chain.call(Request::new(())).is_ok());
    }
}

// ==================== Retry Tests ====================

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_injected_faults() {
    let config = FaultInjectionConfig {
        rate: 0.5,
        ..FaultInjectionConfig::always(FaultKind::Unavailable)
    };
    let chain = Arc::new(Mutex::new(InterceptorChain::new(
        FaultInjector::seeded(&config, "CartService", 3),
        credential_interceptor(),
    )));
    let attempts = Arc::new(AtomicU32::new(0));

    let mut successes = 0;
    for _ in 0..50 {
        let chain = Arc::clone(&chain);
        let attempts = Arc::clone(&attempts);

        let result = with_retry(&RetryConfig::default(), "/hipstershop.CartService/GetCart", move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            let outcome = chain
                .lock()
                .unwrap()
                .call(Request::new(()))
                .map(|request| request.metadata().len());
            async move { outcome }
        })
        .await;

        if let Ok(fields) = result {
            assert_eq!(fields, 3);
            successes += 1;
        }
    }

    // Four attempts at a 50% fault rate fail together about 6% of the time
    assert!(successes >= 40, "only {successes} of 50 calls succeeded");
    assert!(attempts.load(Ordering::SeqCst) > 50);
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_three_retries() {
    let mut injector = FaultInjector::seeded(
        &FaultInjectionConfig::always(FaultKind::DeadlineExceeded),
        "CartService",
        9,
    );
    let start = tokio::time::Instant::now();

    let result: Result<(), RetryError> =
        with_retry(&RetryConfig::default(), "/hipstershop.CartService/AddItem", || {
            let outcome = injector.call(Request::new(())).map(|_| ());
            async move { outcome }
        })
        .await;

    match result {
        Err(RetryError::Exhausted { attempts, status, method }) => {
            assert_eq!(attempts, 4);
            assert_eq!(status.code(), Code::DeadlineExceeded);
            assert_eq!(method, "/hipstershop.CartService/AddItem");
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_millis(600));
}

#[tokio::test]
async fn test_internal_injected_fault_is_not_retried() {
    let mut injector = FaultInjector::seeded(
        &FaultInjectionConfig::always(FaultKind::Internal),
        "CartService",
        9,
    );
    let calls = AtomicU32::new(0);

    let result: Result<(), RetryError> =
        with_retry(&RetryConfig::default(), "/hipstershop.CartService/EmptyCart", || {
            calls.fetch_add(1, Ordering::SeqCst);
            let outcome = injector.call(Request::new(())).map(|_| ());
            async move { outcome }
        })
        .await;

    let status = Status::from(result.unwrap_err());
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
