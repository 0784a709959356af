//! Shared types used across the fetch, cache and ranking stages.
//!
//! [`PhotoDetail`] is the cache payload and the ranking input, so it is
//! serialized into the cache file and must stay backwards compatible with
//! [`CACHE_VERSION`](crate::cache::CACHE_VERSION).

use serde::{Deserialize, Serialize};

/// Everything we know about one photo after a detail fetch.
///
/// Assembled from `flickr.photos.getInfo` plus the `total` of
/// `flickr.photos.getFavorites`. Both calls are always made, so a record
/// either has a real favorites count or does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDetail {
    pub id: String,
    pub title: String,
    pub views: u64,
    pub favorites: u64,
    /// Upload time, Unix seconds.
    pub posted: i64,
    /// Photo page URL (`urls.url[type=photopage]`), if the API returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
