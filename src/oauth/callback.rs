//! Local listener for the OAuth authorization redirect.
//!
//! Flickr finishes the user-grant step by redirecting the browser to the
//! `oauth_callback` URL given in the request-token call. [`CallbackListener`]
//! binds `127.0.0.1` on an OS-assigned port, serves on a background thread,
//! and hands the `oauth_verifier` from the first `GET /oauth` to whoever is
//! blocked in [`CallbackListener::await_verifier`].
//!
//! The listener is single-use. Once the callback arrives the socket is closed
//! before the browser gets its confirmation page, so any later request is
//! refused at the TCP level. Requests for other paths (browsers like to ask
//! for `/favicon.ico`) get a 404 and do not consume the one-shot.

use super::AuthError;
use super::signer::decode_query;
use std::io::{self, Read as _, Write as _};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Path the provider redirects to.
pub const CALLBACK_PATH: &str = "/oauth";

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// The callback connection, still open for the reply, and its verifier.
type Callback = (TcpStream, String);

const CONFIRMATION_PAGE: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>flickrank</title></head>\
<body><h1>Authorization received</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

pub struct CallbackListener {
    addr: SocketAddr,
    verifier: Receiver<String>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind an ephemeral loopback port and start serving in the background.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let (tx, rx) = mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("oauth-callback".into())
            .spawn(move || serve(listener, tx, &thread_stop))?;

        tracing::debug!(%addr, "oauth callback listener started");
        Ok(Self {
            addr,
            verifier: rx,
            stop,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL to pass to the provider as `oauth_callback`.
    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.addr, CALLBACK_PATH)
    }

    /// Block until the redirect delivers a verifier or `timeout` elapses.
    ///
    /// The verifier is delivered once. A second call after a successful one
    /// returns [`AuthError::CallbackClosed`].
    pub fn await_verifier(&self, timeout: Duration) -> Result<String, AuthError> {
        match self.verifier.recv_timeout(timeout) {
            Ok(verifier) => Ok(verifier),
            Err(RecvTimeoutError::Timeout) => Err(AuthError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AuthError::CallbackClosed),
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(listener: TcpListener, tx: SyncSender<String>, stop: &AtomicBool) {
    let Some((stream, verifier)) = wait_for_callback(&listener, stop) else {
        return;
    };
    drop(listener);
    tracing::debug!("oauth callback received, listener closed");

    // Capacity 1 and a single send: never blocks. The waiter may be gone.
    let _ = tx.send(verifier);
    respond(
        stream,
        "200 OK",
        "text/html; charset=utf-8",
        CONFIRMATION_PAGE,
    );
}

/// Accept until a connection thread reports the callback. Each connection is
/// read on its own thread; an idle socket never holds up the redirect.
fn wait_for_callback(listener: &TcpListener, stop: &AtomicBool) -> Option<Callback> {
    let (found_tx, found_rx) = mpsc::channel::<Callback>();
    loop {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        if let Ok(found) = found_rx.try_recv() {
            return Some(found);
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::trace!(%peer, "callback connection");
                let found_tx = found_tx.clone();
                let spawned = thread::Builder::new()
                    .name("oauth-callback-conn".into())
                    .spawn(move || {
                        if let Some(found) = handle_connection(stream)
                            && let Err(mpsc::SendError((late, _))) = found_tx.send(found)
                        {
                            respond(late, "410 Gone", "text/plain", "Gone");
                        }
                    });
                if let Err(e) = spawned {
                    tracing::warn!(error = %e, "could not serve callback connection");
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                tracing::warn!(error = %e, "oauth callback listener failed");
                return None;
            }
        }
    }
}

/// Returns the stream and verifier when this was the callback request;
/// anything else is answered here and dropped.
fn handle_connection(mut stream: TcpStream) -> Option<Callback> {
    if stream.set_nonblocking(false).is_err() {
        return None;
    }
    let _ = stream.set_read_timeout(Some(READ_TIMEOUT));

    let head = match read_request_head(&mut stream) {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable callback request");
            return None;
        }
    };
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path != CALLBACK_PATH {
        respond(stream, "404 Not Found", "text/plain", "Not Found");
        return None;
    }
    if method != "GET" {
        respond(
            stream,
            "405 Method Not Allowed",
            "text/plain",
            "Method Not Allowed",
        );
        return None;
    }

    let verifier = decode_query(query)
        .ok()
        .and_then(|pairs| {
            pairs
                .into_iter()
                .find(|(k, _)| k == "oauth_verifier")
                .map(|(_, v)| v)
        })
        .unwrap_or_default();
    Some((stream, verifier))
}

fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }
    if head.is_empty() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty request"));
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn respond(mut stream: TcpStream, status: &str, content_type: &str, body: &str) {
    let header = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    /// Send a raw GET and return the full response text.
    fn get(addr: SocketAddr, target: &str) -> io::Result<String> {
        let mut stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        write!(stream, "GET {target} HTTP/1.1\r\nHost: {addr}\r\n\r\n")?;
        let mut response = String::new();
        stream.read_to_string(&mut response)?;
        Ok(response)
    }

    #[test]
    fn callback_url_points_at_loopback() {
        let listener = CallbackListener::start().unwrap();
        let url = listener.callback_url();
        assert!(url.starts_with("http://127.0.0.1:"));
        assert!(url.ends_with("/oauth"));
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[test]
    fn delivers_verifier_once() {
        let listener = CallbackListener::start().unwrap();
        let addr = listener.local_addr();

        let response = get(addr, "/oauth?oauth_token=tok&oauth_verifier=ABC123").unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Authorization received"));

        assert_eq!(
            listener.await_verifier(Duration::from_secs(5)).unwrap(),
            "ABC123"
        );

        // The socket was closed before the confirmation page was written.
        assert!(get(addr, "/oauth?oauth_verifier=SECOND").is_err());
        assert!(matches!(
            listener.await_verifier(Duration::from_millis(50)),
            Err(AuthError::CallbackClosed)
        ));
    }

    #[test]
    fn other_paths_do_not_consume_the_callback() {
        let listener = CallbackListener::start().unwrap();
        let addr = listener.local_addr();

        let response = get(addr, "/favicon.ico").unwrap();
        assert!(response.starts_with("HTTP/1.1 404"));

        get(addr, "/oauth?oauth_verifier=XYZ").unwrap();
        assert_eq!(
            listener.await_verifier(Duration::from_secs(5)).unwrap(),
            "XYZ"
        );
    }

    #[test]
    fn idle_connection_does_not_block_the_callback() {
        let listener = CallbackListener::start().unwrap();
        let addr = listener.local_addr();

        let _idle = TcpStream::connect(addr).unwrap();
        let _also_idle = TcpStream::connect(addr).unwrap();
        let response = get(addr, "/oauth?oauth_verifier=ABC123").unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        assert_eq!(
            listener.await_verifier(Duration::from_secs(2)).unwrap(),
            "ABC123"
        );
    }

    #[test]
    fn missing_verifier_is_delivered_as_empty() {
        let listener = CallbackListener::start().unwrap();
        get(listener.local_addr(), "/oauth?oauth_problem=user_refused").unwrap();
        assert_eq!(
            listener.await_verifier(Duration::from_secs(5)).unwrap(),
            ""
        );
    }

    #[test]
    fn verifier_is_percent_decoded() {
        let listener = CallbackListener::start().unwrap();
        get(listener.local_addr(), "/oauth?oauth_verifier=a%2Bb%20c").unwrap();
        assert_eq!(
            listener.await_verifier(Duration::from_secs(5)).unwrap(),
            "a+b c"
        );
    }

    #[test]
    fn times_out_without_callback() {
        let listener = CallbackListener::start().unwrap();
        let err = listener
            .await_verifier(Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(d) if d == Duration::from_millis(30)));
    }

    #[test]
    fn drop_stops_the_listener() {
        let listener = CallbackListener::start().unwrap();
        let addr = listener.local_addr();
        drop(listener);
        assert!(TcpStream::connect(addr).is_err());
    }
}
