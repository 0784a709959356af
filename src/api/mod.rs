//! Flickr REST API access.
//!
//! - [`transport`]: the blocking HTTP GET seam ([`Transport`]) and its
//!   reqwest implementation. Tests swap in a mock.
//! - [`methods`]: one typed variant per REST method we call, so parameter
//!   names are fixed at compile time instead of living in string maps.
//! - [`types`]: serde schemas for the JSON responses.
//! - [`client`]: [`FlickrClient`], which signs, executes, checks `stat` and decodes.

pub mod client;
pub mod methods;
pub mod transport;
pub mod types;

use crate::oauth::SignError;
use thiserror::Error;

pub use client::{FlickrClient, OAUTH_BASE_URL, REST_ENDPOINT};
pub use methods::ApiMethod;
pub use transport::{HttpResponse, HttpTransport, Transport};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("{method} failed: {message} (code {code})")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request signing failed: {0}")]
    Sign(#[from] SignError),
}
