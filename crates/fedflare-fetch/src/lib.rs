//! HTTP requests with bounded retry and a file-backed response cache.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and response types
//! - [`core`] - Pure transformations (backoff, cache-control freshness)
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **Drained Bodies**: every [`HttpClient::get`] reads the body to the end so
//!   pooled connections are always released for reuse
//! - **Bounded Retry**: [`RetryingClient`] retries connection failures and
//!   5xx statuses with exponential backoff
//! - **Validator Cache**: [`CachingClient`] revalidates through ETag and
//!   Last-Modified and reports whether a response came from the local cache

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use core::{CacheControl, is_retryable_status, retry_delay};
pub use data::{FetchOptions, Headers, Response};
pub use effects::{CachedResponse, CachingClient, HttpClient, ResponseCache, RetryingClient};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

#[cfg(any(test, feature = "mock"))]
pub use effects::mock;

pub use error::{FetchError, Result};
