//! Turnstile - Request Admission Rate Limiting
//!
//! This crate implements a keyed request-admission rate limiter for HTTP
//! request pipelines. Requests are identified by configurable dot-notation
//! properties resolved from a request snapshot (headers, query, params); at
//! most `max` requests per key are admitted within each time window. The
//! decision core is a pure function over a snapshot, with a thin tower
//! layer adapting it to an axum/http service stack.

pub mod error;
pub mod limit;
pub mod middleware;
pub mod request;
