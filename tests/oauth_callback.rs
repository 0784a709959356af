//! Authorization handshake over the real loopback callback listener.
//!
//! The provider is faked at the transport seam; the "browser" plays
//! Flickr's redirect by issuing a plain HTTP GET to the `oauth_callback`
//! URL announced in the request-token call.

use flickrank::api::{ApiError, HttpResponse, Transport};
use flickrank::oauth::signer::decode_query;
use flickrank::oauth::{
    AuthError, AuthorizationFlow, BrowserLauncher, CallbackListener, ConsumerKey, FlowState,
    TokenPair,
};
use std::io::{self, Read as _, Write as _};
use std::net::TcpStream;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

// ===========================================================================
// Fake provider
// ===========================================================================

#[derive(Default)]
struct FakeProvider {
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// The `oauth_callback` announced in the request-token call.
    fn callback_url(&self) -> Option<String> {
        self.calls()
            .iter()
            .find_map(|url| param(url, "oauth_callback"))
    }
}

fn param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    decode_query(query)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

impl Transport for FakeProvider {
    fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = if url.contains("/oauth/request_token?") {
            "oauth_callback_confirmed=true&oauth_token=reqtok&oauth_token_secret=reqsecret"
                .to_string()
        } else if url.contains("/oauth/access_token?")
            && param(url, "oauth_verifier").as_deref() == Some("VER-42")
            && param(url, "oauth_token").as_deref() == Some("reqtok")
        {
            "fullname=Jane&oauth_token=acctok&oauth_token_secret=accsecret\
             &user_nsid=21207597%40N07&username=jane"
                .to_string()
        } else {
            return Ok(HttpResponse {
                status: 401,
                body: "oauth_problem=token_rejected".into(),
            });
        };
        Ok(HttpResponse { status: 200, body })
    }
}

// ===========================================================================
// Fake browser
// ===========================================================================

/// Redirects to the announced callback with `query`, like Flickr does after
/// the user clicks through. `None` never redirects.
struct RedirectingBrowser<'a> {
    provider: &'a FakeProvider,
    query: Option<&'static str>,
    launched: Mutex<Vec<String>>,
}

impl<'a> RedirectingBrowser<'a> {
    fn new(provider: &'a FakeProvider, query: Option<&'static str>) -> Self {
        Self {
            provider,
            query,
            launched: Mutex::new(Vec::new()),
        }
    }
}

impl BrowserLauncher for RedirectingBrowser<'_> {
    fn launch(&self, url: &str) -> io::Result<()> {
        self.launched.lock().unwrap().push(url.to_string());
        let Some(query) = self.query else {
            return Ok(());
        };
        let callback = self
            .provider
            .callback_url()
            .ok_or_else(|| io::Error::other("no callback announced"))?;
        thread::spawn(move || {
            let _ = http_get(&format!("{callback}?{query}"));
        });
        Ok(())
    }
}

/// Minimal HTTP GET returning the raw response.
fn http_get(url: &str) -> io::Result<String> {
    let rest = url.strip_prefix("http://").unwrap_or(url);
    let (authority, target) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let mut stream = TcpStream::connect(authority)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    write!(stream, "GET {target} HTTP/1.1\r\nHost: {authority}\r\n\r\n")?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

fn consumer() -> ConsumerKey {
    ConsumerKey::new("ckey", "csecret")
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn handshake_completes_through_loopback_callback() {
    let provider = FakeProvider::default();
    let browser = RedirectingBrowser::new(
        &provider,
        Some("oauth_token=reqtok&oauth_verifier=VER-42"),
    );
    let mut flow = AuthorizationFlow::new(consumer(), &provider, &browser)
        .with_verifier_timeout(Duration::from_secs(10));

    let grant = flow.run().unwrap();
    assert_eq!(grant.token, TokenPair::new("acctok", "accsecret"));
    assert_eq!(grant.user_nsid, "21207597@N07");
    assert_eq!(grant.username, "jane");
    assert_eq!(flow.state(), FlowState::Authorized);

    let callback = provider.callback_url().unwrap();
    assert!(callback.starts_with("http://127.0.0.1:"));
    assert!(callback.ends_with("/oauth"));

    let launched = browser.launched.lock().unwrap().clone();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].contains("oauth_token=reqtok"));
    assert!(launched[0].ends_with("&perms=read"));

    // The listener is gone once the flow returns.
    assert!(http_get(&format!("{callback}?oauth_verifier=again")).is_err());
}

#[test]
fn denied_grant_is_protocol_error() {
    let provider = FakeProvider::default();
    let browser = RedirectingBrowser::new(&provider, Some("oauth_problem=user_refused"));
    let mut flow = AuthorizationFlow::new(consumer(), &provider, &browser)
        .with_verifier_timeout(Duration::from_secs(10));

    let err = flow.run().unwrap_err();
    assert!(matches!(err, AuthError::Protocol(_)));
    assert_eq!(flow.state(), FlowState::Failed);
    // No access-token exchange was attempted.
    assert_eq!(provider.calls().len(), 1);
}

#[test]
fn no_redirect_times_out() {
    let provider = FakeProvider::default();
    let browser = RedirectingBrowser::new(&provider, None);
    let mut flow = AuthorizationFlow::new(consumer(), &provider, &browser)
        .with_verifier_timeout(Duration::from_millis(100));

    let err = flow.run().unwrap_err();
    assert!(matches!(err, AuthError::Timeout(_)));
    assert_eq!(flow.state(), FlowState::Failed);
}

#[test]
fn listener_serves_one_callback_then_refuses() {
    let listener = CallbackListener::start().unwrap();
    let url = listener.callback_url();

    let favicon = http_get(&url.replace("/oauth", "/favicon.ico")).unwrap();
    assert!(favicon.starts_with("HTTP/1.1 404"));

    let page = http_get(&format!("{url}?oauth_token=t&oauth_verifier=ABC123")).unwrap();
    assert!(page.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(
        listener.await_verifier(Duration::from_secs(5)).unwrap(),
        "ABC123"
    );
    assert!(http_get(&format!("{url}?oauth_verifier=XYZ")).is_err());
}
