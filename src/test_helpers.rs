//! Shared test utilities: canned Flickr JSON bodies and mock routes.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let mock = photo_routes(MockTransport::new(), "42", 1500, 12);
//! let client = FlickrClient::new(&mock, consumer(), None);
//! assert_eq!(client.photo_detail("42").unwrap().favorites, 12);
//! ```

use crate::api::transport::tests::MockTransport;
use crate::oauth::ConsumerKey;
use crate::types::PhotoDetail;

/// Upload time shared by the canned photos: 2020-01-01T00:00:00Z.
pub const POSTED: i64 = 1_577_836_800;

pub fn consumer() -> ConsumerKey {
    ConsumerKey::new("test-key", "test-secret")
}

pub fn photo_url(id: &str) -> String {
    format!("https://www.flickr.com/photos/tester/{id}/")
}

// =========================================================================
// Response bodies
// =========================================================================

pub fn info_body(id: &str, views: u64) -> String {
    format!(
        r#"{{"photo": {{"id": "{id}", "secret": "s", "server": "1", "farm": 1,
            "views": "{views}", "title": {{"_content": "Photo {id}"}},
            "dates": {{"posted": "{POSTED}", "taken": "2019-12-31 23:00:00",
                      "takengranularity": "0", "lastupdate": "{POSTED}"}},
            "urls": {{"url": [{{"type": "photopage", "_content": "{url}"}}]}}}},
            "stat": "ok"}}"#,
        url = photo_url(id)
    )
}

pub fn faves_body(id: &str, total: u64) -> String {
    format!(
        r#"{{"photo": {{"person": [], "id": "{id}", "page": 1, "pages": "{total}",
            "perpage": 1, "total": "{total}"}}, "stat": "ok"}}"#
    )
}

pub fn search_body(page: u32, pages: u32, ids: &[&str]) -> String {
    let photos: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"id": "{id}", "owner": "1@N00", "secret": "s", "server": "1", "farm": 1,
                    "title": "Photo {id}", "ispublic": 1, "isfriend": 0, "isfamily": 0}}"#
            )
        })
        .collect();
    format!(
        r#"{{"photos": {{"page": {page}, "pages": {pages}, "perpage": 500,
            "total": "{total}", "photo": [{list}]}}, "stat": "ok"}}"#,
        total = ids.len(),
        list = photos.join(",")
    )
}

// =========================================================================
// Mock routes
// =========================================================================

/// Add getInfo and getFavorites routes for one photo.
pub fn photo_routes(mock: MockTransport, id: &str, views: u64, faves: u64) -> MockTransport {
    mock.route(
        &[("method", "flickr.photos.getInfo"), ("photo_id", id)],
        200,
        info_body(id, views),
    )
    .route(
        &[("method", "flickr.photos.getFavorites"), ("photo_id", id)],
        200,
        faves_body(id, faves),
    )
}

/// The record [`photo_routes`] produces for `id`.
pub fn expected_detail(id: &str, views: u64, faves: u64) -> PhotoDetail {
    PhotoDetail {
        id: id.to_string(),
        title: format!("Photo {id}"),
        views,
        favorites: faves,
        posted: POSTED,
        url: Some(photo_url(id)),
    }
}

/// A detail record for ranking tests.
pub fn detail(id: &str, views: u64, favorites: u64, posted: i64) -> PhotoDetail {
    PhotoDetail {
        id: id.to_string(),
        title: format!("Photo {id}"),
        views,
        favorites,
        posted,
        url: Some(photo_url(id)),
    }
}
