//! HTTP transport trait and the production reqwest implementation.
//!
//! All calls are blocking GETs. The [`Transport`] trait is `Sync` so a single
//! instance can be shared by every worker in the fetch pool.

use super::ApiError;
use std::time::Duration;

/// Status code and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`ApiError::Status`].
    pub fn success_body(self, url: &str) -> Result<String, ApiError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ApiError::Status {
                status: self.status,
                endpoint: endpoint_of(url).to_string(),
            })
        }
    }
}

pub trait Transport: Sync {
    /// Perform a GET. Transport failures are errors; HTTP error statuses are
    /// returned as responses for the caller to judge.
    fn get(&self, url: &str) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
        (**self).get(url)
    }
}

/// reqwest blocking client with a hard per-request timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("flickrank/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        let endpoint = endpoint_of(url);
        tracing::debug!(endpoint, status, bytes = body.len(), "GET");
        Ok(HttpResponse { status, body })
    }
}

/// The URL without its query string. Signed URLs carry tokens; this is what
/// goes into logs and error messages.
pub fn endpoint_of(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::oauth::signer::decode_query;
    use std::sync::Mutex;

    /// Canned transport. Each route matches when every listed `(key, value)`
    /// appears among the request's decoded query parameters; the first
    /// matching route answers. Unmatched requests get a 404.
    /// Uses Mutex so it is Sync and can be shared across the worker pool.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Vec<Route>,
        calls: Mutex<Vec<String>>,
    }

    struct Route {
        path: Option<String>,
        params: Vec<(String, String)>,
        response: HttpResponse,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer requests carrying all of `params`.
        pub fn route(
            mut self,
            params: &[(&str, &str)],
            status: u16,
            body: impl Into<String>,
        ) -> Self {
            self.routes.push(Route {
                path: None,
                params: owned(params),
                response: HttpResponse {
                    status,
                    body: body.into(),
                },
            });
            self
        }

        /// Answer requests to an endpoint ending in `path` carrying all of `params`.
        pub fn route_path(
            mut self,
            path: &str,
            params: &[(&str, &str)],
            status: u16,
            body: impl Into<String>,
        ) -> Self {
            self.routes.push(Route {
                path: Some(path.to_string()),
                params: owned(params),
                response: HttpResponse {
                    status,
                    body: body.into(),
                },
            });
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Number of recorded calls carrying `key=value`.
        pub fn count_with(&self, key: &str, value: &str) -> usize {
            self.calls()
                .iter()
                .filter(|url| {
                    query_params(url)
                        .iter()
                        .any(|(k, v)| k == key && v == value)
                })
                .count()
        }
    }

    fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn query_params(url: &str) -> Vec<(String, String)> {
        url.split_once('?')
            .map(|(_, q)| decode_query(q).unwrap())
            .unwrap_or_default()
    }

    impl Transport for MockTransport {
        fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
            self.calls.lock().unwrap().push(url.to_string());
            let params = query_params(url);
            let endpoint = endpoint_of(url);
            let found = self.routes.iter().find(|route| {
                route.path.as_deref().is_none_or(|p| endpoint.ends_with(p))
                    && route.params.iter().all(|want| params.contains(want))
            });
            Ok(match found {
                Some(route) => route.response.clone(),
                None => HttpResponse {
                    status: 404,
                    body: String::new(),
                },
            })
        }
    }

    #[test]
    fn endpoint_strips_query() {
        assert_eq!(
            endpoint_of("https://api.flickr.com/services/rest/?method=x&oauth_token=t"),
            "https://api.flickr.com/services/rest/"
        );
        assert_eq!(endpoint_of("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn success_body_passes_2xx() {
        let ok = HttpResponse {
            status: 200,
            body: "hi".into(),
        };
        assert_eq!(ok.success_body("https://x/").unwrap(), "hi");
    }

    #[test]
    fn success_body_rejects_other_statuses() {
        let err = HttpResponse {
            status: 401,
            body: "oauth_problem=signature_invalid".into(),
        }
        .success_body("https://x/y?oauth_token=secretish")
        .unwrap_err();
        match err {
            ApiError::Status { status, endpoint } => {
                assert_eq!(status, 401);
                assert_eq!(endpoint, "https://x/y");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mock_matches_on_decoded_params() {
        let mock = MockTransport::new().route(&[("photo_id", "1")], 200, "one");
        let hit = mock.get("https://x/?photo_id=1&a=b").unwrap();
        let miss = mock.get("https://x/?photo_id=10").unwrap();
        assert_eq!(hit.body, "one");
        assert_eq!(miss.status, 404);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.count_with("photo_id", "10"), 1);
    }
}
