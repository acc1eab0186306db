//! Immutable data types for HTTP requests.
//!
//! This module contains the request configuration and the fully-read
//! response type passed between the layers of the crate.

pub mod options;
pub mod response;

pub use options::FetchOptions;
pub use response::{Headers, Response};
