//! Admission decision logic and per-key window state.

mod counter;
mod key;
mod limiter;
mod store;

pub use counter::{Consumption, WindowCounter};
pub use key::RateKey;
pub use limiter::{
    Decision, InputRateLimiter, LimiterConfig, Rejection, RejectionBody, RejectionStatus,
    TOO_MANY_REQUESTS_CODE,
};
pub use store::CounterStore;
