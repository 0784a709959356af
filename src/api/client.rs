//! Signed REST client.

use super::ApiError;
use super::methods::ApiMethod;
use super::transport::{Transport, endpoint_of};
use super::types::{
    Envelope, FavoritesResponse, InfoResponse, PhotoRef, SearchResponse, User, UserResponse,
};
use crate::oauth::{ConsumerKey, RequestSigner, TokenPair};
use crate::types::PhotoDetail;
use serde::de::DeserializeOwned;

pub const REST_ENDPOINT: &str = "https://api.flickr.com/services/rest/";
pub const OAUTH_BASE_URL: &str = "https://www.flickr.com/services/oauth/";

/// Executes [`ApiMethod`]s against the REST endpoint.
///
/// Every call is signed. Without an access token the signature uses an
/// empty token secret, which Flickr accepts for public methods.
pub struct FlickrClient<T> {
    transport: T,
    signer: RequestSigner,
    token: Option<TokenPair>,
}

impl<T: Transport> FlickrClient<T> {
    pub fn new(transport: T, consumer: ConsumerKey, token: Option<TokenPair>) -> Self {
        Self {
            transport,
            signer: RequestSigner::new(consumer),
            token,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.token.is_some()
    }

    /// Sign, execute and decode one call.
    pub fn call<R: DeserializeOwned>(&self, method: &ApiMethod<'_>) -> Result<R, ApiError> {
        let api_key = self.signer.consumer_key().to_string();
        let mut params = vec![
            ("method".to_string(), method.name().to_string()),
            ("api_key".to_string(), api_key),
            ("format".to_string(), "json".to_string()),
            ("nojsoncallback".to_string(), "1".to_string()),
        ];
        params.extend(method.params());

        let url = self
            .signer
            .build_signed_url(REST_ENDPOINT, "GET", &params, self.token.as_ref())?;
        tracing::debug!(method = method.name(), "calling {}", endpoint_of(&url));

        let body = self.transport.get(&url)?.success_body(&url)?;
        decode_response(method.name(), &body)
    }

    /// `flickr.test.login`: confirms the stored access token still works.
    pub fn test_login(&self) -> Result<User, ApiError> {
        let resp: UserResponse = self.call(&ApiMethod::TestLogin)?;
        Ok(resp.user)
    }

    /// Resolve a screen name to an NSID.
    pub fn find_user_nsid(&self, username: &str) -> Result<String, ApiError> {
        let resp: UserResponse = self.call(&ApiMethod::FindByUsername { username })?;
        Ok(resp.user.nsid().to_string())
    }

    /// Every photo of `user_id`, walking all result pages.
    pub fn search_all(&self, user_id: &str) -> Result<Vec<PhotoRef>, ApiError> {
        let mut photos = Vec::new();
        let mut page = 1u32;
        loop {
            let resp: SearchResponse = self.call(&ApiMethod::Search { user_id, page })?;
            let pages = resp.photos.pages;
            photos.extend(resp.photos.photo);
            tracing::debug!(page, pages, collected = photos.len(), "search page");
            if u64::from(page) >= pages {
                break;
            }
            page += 1;
        }
        Ok(photos)
    }

    /// getInfo plus the favorites total, as one record.
    pub fn photo_detail(&self, photo_id: &str) -> Result<PhotoDetail, ApiError> {
        let info: InfoResponse = self.call(&ApiMethod::GetInfo { photo_id })?;
        let favorites: FavoritesResponse = self.call(&ApiMethod::GetFavorites { photo_id })?;
        Ok(info.photo.into_detail(favorites.photo.total))
    }
}

/// Check `stat`, then decode the full body as `R`.
fn decode_response<R: DeserializeOwned>(method: &str, body: &str) -> Result<R, ApiError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.stat != "ok" {
        return Err(ApiError::Remote {
            method: method.to_string(),
            code: envelope.code.unwrap_or_default(),
            message: envelope
                .message
                .unwrap_or_else(|| format!("stat={}", envelope.stat)),
        });
    }
    Ok(serde_json::from_str(body)?)
}
