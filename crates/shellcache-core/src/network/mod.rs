//! Network access for the controller.
//!
//! The controller only talks to the network through the `Fetcher` trait, so
//! hosts can plug in their own transport and tests can script responses.
//! `HttpFetcher` is the reqwest-backed implementation.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{Request, Response};

pub use client::HttpFetcher;
pub use error::FetchError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Any HTTP status is a successful fetch; only
    /// transport failures are errors.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
