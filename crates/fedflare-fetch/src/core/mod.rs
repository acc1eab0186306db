//! Pure transformations for HTTP fetching.
//!
//! Nothing in this module performs I/O; the effectful layers call into it
//! to decide when and how long to back off, and whether a stored response
//! may still be served.

mod cache_control;
mod retry;

pub use cache_control::CacheControl;
pub use retry::{is_retryable_status, retry_delay};
