//! HTTP fetch layer
//!
//! Streaming downloads with retry, backoff and progress reporting. All
//! provisioners share one [`HttpFetcher`] so retry policy and user agent are
//! configured in a single place.

pub mod error;
pub mod http;

pub use error::{FetchError, Result};
pub use http::HttpFetcher;

#[cfg(test)]
mod tests;
