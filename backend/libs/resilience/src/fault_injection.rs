/// Probabilistic fault injection for outgoing gRPC calls
///
/// Sits in front of the credential interceptors on a client and
/// short-circuits a configurable share of calls with a transient `Status`,
/// so the retry path can be exercised under load. It never reads or writes
/// request metadata.
use crate::metrics::FaultInjectionMetrics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::fmt;
use tonic::service::Interceptor;
use tonic::{Code, Request, Status};
use tracing::{info, warn};

/// Prefix of every injected status message
pub const INJECTED_ERROR_PREFIX: &str = "INJECTED_ERROR:";

const DEFAULT_RATE: f64 = 0.1;
const DEFAULT_TARGET: &str = "CartService";

/// Error classification returned by an injected fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    Unavailable,
    Timeout,
    Internal,
    DeadlineExceeded,
    ConnectionRefused,
    PacketLoss,
    /// One of `Unavailable`, `Timeout`, `Internal`, `DeadlineExceeded` per call
    Random,
    /// Unrecognized name, injected as `Unavailable`
    Other(String),
}

impl FaultKind {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "unavailable" => Self::Unavailable,
            "timeout" => Self::Timeout,
            "internal" => Self::Internal,
            "deadline_exceeded" => Self::DeadlineExceeded,
            "connection_refused" => Self::ConnectionRefused,
            "packet_loss" => Self::PacketLoss,
            "random" => Self::Random,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ConnectionRefused => "connection_refused",
            Self::PacketLoss => "packet_loss",
            Self::Random => "random",
            Self::Other(name) => name,
        }
    }

    /// Status returned to the caller for a concrete (non-random) kind
    pub fn status(&self) -> Status {
        let (code, detail) = match self {
            Self::Unavailable => (Code::Unavailable, "simulated service unavailable".to_string()),
            // Interceptors are synchronous, so no delay is simulated here
            Self::Timeout => (Code::DeadlineExceeded, "simulated timeout".to_string()),
            Self::Internal => (Code::Internal, "simulated internal error".to_string()),
            Self::DeadlineExceeded => {
                (Code::DeadlineExceeded, "simulated deadline exceeded".to_string())
            }
            Self::ConnectionRefused => {
                (Code::Unavailable, "simulated connection refused".to_string())
            }
            Self::PacketLoss => (Code::Unavailable, "simulated packet loss".to_string()),
            Self::Random => (Code::Unavailable, "simulated random error".to_string()),
            Self::Other(name) => (Code::Unavailable, format!("simulated error type: {}", name)),
        };

        Status::new(
            code,
            format!("{} {} (error injection)", INJECTED_ERROR_PREFIX, detail),
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RANDOM_KINDS: [FaultKind; 4] = [
    FaultKind::Unavailable,
    FaultKind::Timeout,
    FaultKind::Internal,
    FaultKind::DeadlineExceeded,
];

/// Services whose calls may be faulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTarget {
    All,
    Services(Vec<String>),
}

impl FaultTarget {
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "all" {
            return Self::All;
        }
        Self::Services(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Substring match, so bare names and full method paths both work
    pub fn matches(&self, service: &str) -> bool {
        match self {
            Self::All => true,
            Self::Services(services) => services.iter().any(|s| service.contains(s.as_str())),
        }
    }
}

/// Raw variables, parsed leniently below so a bad value never fails startup
#[derive(Debug, Default, Deserialize)]
struct FaultInjectionEnv {
    enable_error_injection: Option<String>,
    error_injection_rate: Option<String>,
    error_injection_type: Option<String>,
    error_injection_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultInjectionConfig {
    /// `ENABLE_ERROR_INJECTION`
    pub enabled: bool,
    /// Share of targeted calls to fault, 0.0 - 1.0 (`ERROR_INJECTION_RATE`)
    pub rate: f64,
    /// `ERROR_INJECTION_TYPE`
    pub kind: FaultKind,
    /// `ERROR_INJECTION_TARGET`
    pub target: FaultTarget,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: DEFAULT_RATE,
            kind: FaultKind::Unavailable,
            target: FaultTarget::parse(DEFAULT_TARGET),
        }
    }
}

impl FaultInjectionConfig {
    /// Load configuration from environment variables
    /// Falls back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of key/value pairs
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: FaultInjectionEnv = match envy::from_iter(vars) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "Failed to read error injection variables, using defaults");
                FaultInjectionEnv::default()
            }
        };

        let enabled = env
            .enable_error_injection
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        if !enabled {
            info!("Error injection is disabled");
            return Self::default();
        }

        let rate = match env.error_injection_rate {
            None => DEFAULT_RATE,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
                Ok(rate) => {
                    warn!(rate, "Error injection rate out of range, using default 0.1");
                    DEFAULT_RATE
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse error injection rate, using default 0.1");
                    DEFAULT_RATE
                }
            },
        };

        let config = Self {
            enabled,
            rate,
            kind: env
                .error_injection_type
                .filter(|v| !v.trim().is_empty())
                .map(|v| FaultKind::parse(&v))
                .unwrap_or(FaultKind::Unavailable),
            target: FaultTarget::parse(
                &env
                    .error_injection_target
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TARGET.to_string()),
            ),
        };

        info!(
            rate_percent = config.rate * 100.0,
            kind = %config.kind,
            target = ?config.target,
            "Error injection is enabled"
        );

        config
    }

    /// Always fault every targeted call
    pub fn always(kind: FaultKind) -> Self {
        Self {
            enabled: true,
            rate: 1.0,
            kind,
            target: FaultTarget::All,
        }
    }
}

/// Client interceptor that faults a share of calls to one service
///
/// A tonic interceptor does not see the method path, so the injector is
/// built per client for the service it talks to.
///
/// ```rust,no_run
/// use resilience::{FaultInjectionConfig, FaultInjector};
///
/// let config = FaultInjectionConfig::from_env();
/// let injector = FaultInjector::for_service(&config, "hipstershop.CartService");
/// // let client = CartServiceClient::with_interceptor(channel, injector);
/// ```
#[derive(Debug)]
pub struct FaultInjector {
    active: bool,
    rate: f64,
    kind: FaultKind,
    service: String,
    rng: StdRng,
}

impl FaultInjector {
    pub fn for_service(config: &FaultInjectionConfig, service: &str) -> Self {
        Self::with_rng(config, service, StdRng::from_entropy())
    }

    /// Deterministic injector for tests and load replays
    pub fn seeded(config: &FaultInjectionConfig, service: &str, seed: u64) -> Self {
        Self::with_rng(config, service, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &FaultInjectionConfig, service: &str, rng: StdRng) -> Self {
        Self {
            active: config.enabled && config.rate > 0.0 && config.target.matches(service),
            rate: config.rate,
            kind: config.kind.clone(),
            service: service.to_string(),
            rng,
        }
    }

    /// Whether calls from this injector can be faulted at all
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Draw for one call; `Some` carries the status to fail it with
    pub fn next_fault(&mut self) -> Option<Status> {
        if !self.active || self.rng.gen::<f64>() >= self.rate {
            return None;
        }

        let kind = match &self.kind {
            FaultKind::Random => RANDOM_KINDS[self.rng.gen_range(0..RANDOM_KINDS.len())].clone(),
            kind => kind.clone(),
        };

        warn!(kind = %kind, service = %self.service, "Injecting error");
        FaultInjectionMetrics::record_injected(kind.as_str());
        Some(kind.status())
    }
}

impl Clone for FaultInjector {
    /// Clones draw from a fresh seed so they do not replay the same faults
    fn clone(&self) -> Self {
        Self {
            active: self.active,
            rate: self.rate,
            kind: self.kind.clone(),
            service: self.service.clone(),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Interceptor for FaultInjector {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        match self.next_fault() {
            Some(status) => Err(status),
            None => Ok(request),
        }
    }
}
