//! Three-legged authorization handshake.
//!
//! ```text
//! Idle ─► RequestingToken ─► AwaitingUserGrant ─► ExchangingToken ─► Authorized
//!              │                    │                    │
//!              └────────────────────┴────────────────────┴──► Failed
//! ```
//!
//! 1. `request_token`, signed with the consumer secret only, announces the
//!    local callback URL. Flickr must echo `oauth_callback_confirmed=true`.
//! 2. The user grants read access in a browser; Flickr redirects to the
//!    callback with `oauth_verifier`.
//! 3. `access_token`, signed with the request token, trades the verifier for
//!    the long-lived access token.
//!
//! A failed handshake leaves nothing behind: the caller only ever sees an
//! [`AccessGrant`] on success. There is no automatic retry.

use super::callback::CallbackListener;
use super::signer::{RequestSigner, decode_query, percent_encode};
use super::{AuthError, ConsumerKey, TokenPair};
use crate::api::{OAUTH_BASE_URL, Transport};
use std::io;
use std::time::Duration;

pub const DEFAULT_VERIFIER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    RequestingToken,
    AwaitingUserGrant,
    ExchangingToken,
    Authorized,
    Failed,
}

/// Opens the authorization page for the user.
pub trait BrowserLauncher {
    fn launch(&self, url: &str) -> io::Result<()>;
}

/// Hands the URL to the desktop's default browser.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> io::Result<()> {
        open::that(url)
    }
}

/// Where the verifier comes from once the user has granted access.
pub trait VerifierSource {
    /// Sent to the provider as `oauth_callback`.
    fn callback_url(&self) -> String;
    fn await_verifier(&self, timeout: Duration) -> Result<String, AuthError>;
}

impl VerifierSource for CallbackListener {
    fn callback_url(&self) -> String {
        CallbackListener::callback_url(self)
    }

    fn await_verifier(&self, timeout: Duration) -> Result<String, AuthError> {
        CallbackListener::await_verifier(self, timeout)
    }
}

/// The outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub token: TokenPair,
    pub user_nsid: String,
    pub username: String,
}

pub struct AuthorizationFlow<'a, T, B> {
    signer: RequestSigner,
    transport: &'a T,
    browser: &'a B,
    verifier_timeout: Duration,
    state: FlowState,
}

impl<'a, T: Transport, B: BrowserLauncher> AuthorizationFlow<'a, T, B> {
    pub fn new(consumer: ConsumerKey, transport: &'a T, browser: &'a B) -> Self {
        Self {
            signer: RequestSigner::new(consumer),
            transport,
            browser,
            verifier_timeout: DEFAULT_VERIFIER_TIMEOUT,
            state: FlowState::Idle,
        }
    }

    pub fn with_verifier_timeout(mut self, timeout: Duration) -> Self {
        self.verifier_timeout = timeout;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Run the handshake with a fresh loopback callback listener.
    pub fn run(&mut self) -> Result<AccessGrant, AuthError> {
        let listener = match CallbackListener::start() {
            Ok(listener) => listener,
            Err(e) => {
                self.enter(FlowState::Failed);
                return Err(AuthError::Listener(e));
            }
        };
        self.authorize(&listener)
    }

    /// Run the handshake, taking the verifier from `source`.
    pub fn authorize<S: VerifierSource>(&mut self, source: &S) -> Result<AccessGrant, AuthError> {
        let result = self.handshake(source);
        match &result {
            Ok(grant) => {
                self.enter(FlowState::Authorized);
                tracing::info!(user = %grant.username, nsid = %grant.user_nsid, "authorized");
            }
            Err(e) => {
                self.enter(FlowState::Failed);
                tracing::debug!(error = %e, "authorization failed");
            }
        }
        result
    }

    fn handshake<S: VerifierSource>(&mut self, source: &S) -> Result<AccessGrant, AuthError> {
        self.enter(FlowState::RequestingToken);
        let request_token = self.request_token(&source.callback_url())?;

        self.enter(FlowState::AwaitingUserGrant);
        let url = authorize_url(&request_token.token);
        tracing::info!("opening {url} to authorize read access");
        self.browser.launch(&url).map_err(AuthError::Browser)?;
        let verifier = source.await_verifier(self.verifier_timeout)?;
        if verifier.is_empty() {
            return Err(AuthError::Protocol(
                "callback carried no oauth_verifier (access denied?)".into(),
            ));
        }

        self.enter(FlowState::ExchangingToken);
        self.access_token(&request_token, &verifier)
    }

    fn request_token(&self, callback_url: &str) -> Result<TokenPair, AuthError> {
        let params = [("oauth_callback".to_string(), callback_url.to_string())];
        let form = self.form_call("request_token", &params, None)?;

        if field(&form, "oauth_callback_confirmed") != Some("true") {
            return Err(AuthError::Protocol(
                "request_token response did not confirm the callback".into(),
            ));
        }
        Ok(TokenPair::new(
            required(&form, "oauth_token")?,
            required(&form, "oauth_token_secret")?,
        ))
    }

    fn access_token(
        &self,
        request_token: &TokenPair,
        verifier: &str,
    ) -> Result<AccessGrant, AuthError> {
        let params = [("oauth_verifier".to_string(), verifier.to_string())];
        let form = self.form_call("access_token", &params, Some(request_token))?;

        Ok(AccessGrant {
            token: TokenPair::new(
                required(&form, "oauth_token")?,
                required(&form, "oauth_token_secret")?,
            ),
            user_nsid: required(&form, "user_nsid")?,
            username: field(&form, "username").unwrap_or_default().to_string(),
        })
    }

    /// Signed GET to an OAuth endpoint; the reply is form-encoded.
    fn form_call(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        token: Option<&TokenPair>,
    ) -> Result<Vec<(String, String)>, AuthError> {
        let base_url = format!("{OAUTH_BASE_URL}{endpoint}");
        let url = self
            .signer
            .build_signed_url(&base_url, "GET", params, token)?;
        let body = self.transport.get(&url)?.success_body(&url)?;
        Ok(decode_query(body.trim())?)
    }

    fn enter(&mut self, next: FlowState) {
        tracing::debug!(from = ?self.state, to = ?next, "oauth flow");
        self.state = next;
    }
}

pub fn authorize_url(request_token: &str) -> String {
    format!(
        "{OAUTH_BASE_URL}authorize?oauth_token={}&perms=read",
        percent_encode(request_token)
    )
}

fn field<'f>(form: &'f [(String, String)], key: &str) -> Option<&'f str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn required(form: &[(String, String)], key: &str) -> Result<String, AuthError> {
    match field(form, key) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(AuthError::Protocol(format!("response is missing {key}"))),
    }
}
