//! Response schemas for `format=json&nojsoncallback=1`.
//!
//! Flickr's JSON is a mechanical translation of its XML: text nodes become
//! `{"_content": ...}` objects and numeric attributes arrive as either
//! strings or numbers depending on the method. [`flex_u64`] / [`flex_i64`]
//! accept both.

use crate::types::PhotoDetail;
use serde::{Deserialize, Deserializer};

/// The `stat`/`code`/`message` fields present on every response.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub stat: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(rename = "_content", default)]
    pub content: String,
}

// ============================================================================
// flickr.test.login / flickr.people.findByUsername
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
    /// Present on findByUsername; test.login only has `id`.
    #[serde(default)]
    pub nsid: Option<String>,
}

impl User {
    pub fn nsid(&self) -> &str {
        self.nsid.as_deref().unwrap_or(&self.id)
    }
}

// ============================================================================
// flickr.photos.search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub photos: PhotoPage,
}

#[derive(Debug, Deserialize)]
pub struct PhotoPage {
    #[serde(deserialize_with = "flex_u64")]
    pub pages: u64,
    #[serde(default)]
    pub photo: Vec<PhotoRef>,
}

/// One row of a search listing. Only the id is needed; details come from
/// getInfo.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRef {
    pub id: String,
}

// ============================================================================
// flickr.photos.getInfo
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InfoResponse {
    pub photo: PhotoInfo,
}

#[derive(Debug, Deserialize)]
pub struct PhotoInfo {
    pub id: String,
    #[serde(default)]
    pub title: Content,
    #[serde(default, deserialize_with = "flex_u64")]
    pub views: u64,
    pub dates: Dates,
    #[serde(default)]
    pub urls: Urls,
}

#[derive(Debug, Deserialize)]
pub struct Dates {
    #[serde(deserialize_with = "flex_i64")]
    pub posted: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Urls {
    #[serde(default)]
    pub url: Vec<TypedUrl>,
}

#[derive(Debug, Deserialize)]
pub struct TypedUrl {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "_content", default)]
    pub value: String,
}

impl PhotoInfo {
    /// The photo page URL, falling back to the first URL of any type.
    pub fn photo_page(&self) -> Option<&str> {
        self.urls
            .url
            .iter()
            .find(|u| u.kind == "photopage")
            .or_else(|| self.urls.url.first())
            .map(|u| u.value.as_str())
    }

    pub fn into_detail(self, favorites: u64) -> PhotoDetail {
        let url = self.photo_page().map(str::to_string);
        PhotoDetail {
            id: self.id,
            title: self.title.content,
            views: self.views,
            favorites,
            posted: self.dates.posted,
            url,
        }
    }
}

// ============================================================================
// flickr.photos.getFavorites
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FavoritesResponse {
    pub photo: FavoritesPage,
}

#[derive(Debug, Deserialize)]
pub struct FavoritesPage {
    #[serde(deserialize_with = "flex_u64")]
    pub total: u64,
}

// ============================================================================
// String-or-number helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Flex {
    Int(i64),
    Text(String),
}

fn flex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Flex::deserialize(deserializer)? {
        Flex::Int(n) => Ok(n),
        Flex::Text(s) if s.trim().is_empty() => Ok(0),
        Flex::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {s:?}"))),
    }
}

pub fn flex_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    flex(deserializer)
}

pub fn flex_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let n = flex(deserializer)?;
    u64::try_from(n).map_err(|_| serde::de::Error::custom(format!("negative count {n}")))
}
