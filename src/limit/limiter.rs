//! Core admission limiter implementation.

use serde::Serialize;
use std::time::Duration;
use tracing::{error, trace, warn};

use crate::error::{ConfigError, Result};
use crate::request::RequestSnapshot;

use super::key::RateKey;
use super::store::CounterStore;

/// Machine-readable status code carried in the 429 rejection body.
pub const TOO_MANY_REQUESTS_CODE: u32 = 42900;

/// Immutable limiter configuration.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Dot-notation paths of the identifying properties, in order
    properties: Vec<String>,
    /// Window duration
    window: Duration,
    /// Maximum admitted units per window
    max: u64,
}

impl LimiterConfig {
    /// Create a validated configuration.
    ///
    /// `properties` is an ordered list of dot-notation paths resolved
    /// against the request snapshot; every path is mandatory on every
    /// intercepted request. `window_ms` is the window length in
    /// milliseconds and `max` the number of admission units permitted per
    /// window; both must be positive.
    pub fn new(properties: Vec<String>, window_ms: u64, max: u64) -> Result<Self> {
        if window_ms == 0 {
            return Err(ConfigError::InvalidWindow(window_ms));
        }
        if max == 0 {
            return Err(ConfigError::InvalidMax(max));
        }
        if let Some(index) = properties.iter().position(|p| p.is_empty()) {
            return Err(ConfigError::EmptyProperty(index));
        }

        Ok(Self {
            properties,
            window: Duration::from_millis(window_ms),
            max,
        })
    }

    /// The configured identifying property paths.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// The configured window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The configured per-window maximum.
    pub fn max(&self) -> u64 {
        self.max
    }
}

/// Per-request admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request to the next pipeline stage.
    Admit,
    /// Terminate the request with a rejection response.
    Reject(Rejection),
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A configured identifying property did not resolve to a value.
    ///
    /// Maps to a 400 response with an empty body. Independent of the rate
    /// counters: nothing is consumed for the request.
    MissingProperty {
        /// The property path that failed to resolve
        property: String,
    },
    /// Consuming one more unit would exceed the per-window maximum.
    ///
    /// Maps to a 429 response with the structured rejection body.
    LimitExceeded {
        /// The computed rate key
        key: RateKey,
        /// Time until the key's window resets
        retry_after: Duration,
    },
}

/// JSON body returned on a 429 rejection.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub status: RejectionStatus,
}

/// Machine-readable status inside the rejection body.
#[derive(Debug, Serialize)]
pub struct RejectionStatus {
    pub code: u32,
    pub message: &'static str,
}

impl RejectionBody {
    /// The fixed Too Many Requests body.
    pub fn too_many_requests() -> Self {
        Self {
            status: RejectionStatus {
                code: TOO_MANY_REQUESTS_CODE,
                message: "Too Many Requests",
            },
        }
    }
}

/// The core admission limiter.
///
/// This struct is thread-safe; one instance is shared across in-flight
/// requests and owns its counter store exclusively.
pub struct InputRateLimiter {
    config: LimiterConfig,
    store: CounterStore,
}

impl InputRateLimiter {
    /// Create a new limiter from a validated configuration.
    pub fn new(config: LimiterConfig) -> Self {
        let store = CounterStore::new(config.max(), config.window());
        Self { config, store }
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Decide whether to admit the request described by the snapshot.
    ///
    /// Resolves every configured identifying property, builds the rate key,
    /// and consumes one admission unit for it. A missing property rejects
    /// the request before any counter is touched.
    pub fn decide(&self, request: &RequestSnapshot) -> Decision {
        let mut pairs = Vec::with_capacity(self.config.properties.len());
        for property in &self.config.properties {
            match request.value_at(property) {
                Some(value) => pairs.push((property.clone(), value)),
                None => {
                    error!(
                        property = %property,
                        method = %request.method(),
                        route = %request.route(),
                        "No value for identifying property found in request"
                    );
                    return Decision::Reject(Rejection::MissingProperty {
                        property: property.clone(),
                    });
                }
            }
        }

        let key = RateKey::new(request.method(), request.route(), pairs);
        let consumption = self.store.try_consume(&key);

        if consumption.admitted {
            trace!(
                key = %key,
                remaining = consumption.remaining,
                "Request admitted"
            );
            Decision::Admit
        } else {
            warn!(
                key = %key,
                window_ms = self.config.window.as_millis() as u64,
                max = self.config.max,
                "Too Many Requests"
            );
            Decision::Reject(Rejection::LimitExceeded {
                key,
                retry_after: consumption.retry_after,
            })
        }
    }

    /// Get the number of active counters.
    ///
    /// This is primarily useful for testing.
    pub fn counter_count(&self) -> usize {
        self.store.counter_count()
    }
}
