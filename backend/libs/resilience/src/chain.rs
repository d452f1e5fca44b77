/// Sequential composition of tonic interceptors
///
/// tonic accepts a single interceptor per client; this runs two in order and
/// stops at the first rejection.
///
/// ```rust,no_run
/// use resilience::{FaultInjectionConfig, FaultInjector, InterceptorChain};
/// # use tonic::service::Interceptor;
///
/// # fn example<C: Interceptor>(credential_interceptor: C) {
/// let injector = FaultInjector::for_service(&FaultInjectionConfig::from_env(), "CartService");
/// let chain = InterceptorChain::new(injector, credential_interceptor);
/// // let client = CartServiceClient::with_interceptor(channel, chain);
/// # }
/// ```
use tonic::service::Interceptor;
use tonic::{Request, Status};

#[derive(Debug, Clone)]
pub struct InterceptorChain<A, B> {
    first: A,
    second: B,
}

impl<A, B> InterceptorChain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Append another interceptor to the end of the chain
    pub fn then<C>(self, next: C) -> InterceptorChain<Self, C> {
        InterceptorChain::new(self, next)
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A, B> Interceptor for InterceptorChain<A, B>
where
    A: Interceptor,
    B: Interceptor,
{
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let request = self.first.call(request)?;
        self.second.call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    fn tag(value: &'static str) -> impl Interceptor + Clone {
        move |mut request: Request<()>| {
            request
                .metadata_mut()
                .append("x-order", MetadataValue::from_static(value));
            Ok(request)
        }
    }

    #[test]
    fn test_runs_in_order() {
        let mut chain = InterceptorChain::new(tag("first"), tag("second")).then(tag("third"));
        let request = chain.call(Request::new(())).unwrap();

        let order: Vec<&str> = request
            .metadata()
            .get_all("x-order")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_stops_at_first_rejection() {
        let reject = |_request: Request<()>| -> Result<Request<()>, Status> {
            Err(Status::unavailable("rejected"))
        };
        let mut chain = InterceptorChain::new(reject, tag("never"));

        let status = chain.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
