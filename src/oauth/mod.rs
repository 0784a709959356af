//! OAuth 1.0a for the Flickr API.
//!
//! Flickr authorizes third-party access with the three-legged OAuth 1.0a
//! handshake and requires every authenticated REST call to carry an
//! HMAC-SHA1 signature. This module is split the same way the protocol is:
//!
//! | Module | Role |
//! |--------|------|
//! | [`signature`] | HMAC-SHA1 + base64, the only cryptographic primitive |
//! | [`signer`] | Canonical base string, signing key, signed URL |
//! | [`callback`] | One-shot `127.0.0.1` listener that captures the redirect |
//! | [`flow`] | Request token → browser grant → verifier → access token |
//!
//! Nothing here holds global state. The consumer key/secret and any token
//! pair are plain values handed to constructors, so several signers (e.g.
//! one per handshake leg) can coexist.

pub mod callback;
pub mod flow;
pub mod signature;
pub mod signer;

use crate::api::ApiError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use callback::CallbackListener;
pub use flow::{
    AccessGrant, AuthorizationFlow, BrowserLauncher, FlowState, SystemBrowser, VerifierSource,
};
pub use signature::SignError;
pub use signer::{RequestSigner, SignedRequest};

/// The application's identity, issued by Flickr when the API key is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerKey {
    pub key: String,
    pub secret: String,
}

impl ConsumerKey {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// A token together with its secret. Used for both the temporary request
/// token and the long-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

impl TokenPair {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("signing failed: {0}")]
    Sign(#[from] SignError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("OAuth protocol error: {0}")]
    Protocol(String),
    #[error("no authorization callback received within {0:?}")]
    Timeout(Duration),
    #[error("authorization callback listener closed before a verifier arrived")]
    CallbackClosed,
    #[error("callback listener error: {0}")]
    Listener(std::io::Error),
    #[error("failed to open browser: {0}")]
    Browser(std::io::Error),
}
