//! I/O operations for HTTP fetching.
//!
//! Everything that touches the network or the filesystem lives here, behind
//! the [`HttpClient`] trait so the layers above can be exercised with a
//! scripted client.

mod cache;
mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod retry;

pub use cache::{CacheEntry, CachedResponse, CachingClient, ResponseCache};
pub use http::HttpClient;
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use retry::RetryingClient;
