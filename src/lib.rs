//! # flickrank
//!
//! Ranks a Flickr user's photos by popularity: total views, views per day,
//! favorites, and favorites per view.
//!
//! # Architecture
//!
//! A run is a short pipeline. Each stage is a plain function or type over
//! explicit inputs, so every stage is testable without the network:
//!
//! ```text
//! 1. Authorize   OAuth 1.0a handshake (only when no access token is stored)
//! 2. List        flickr.photos.search, every page          → Vec<PhotoRef>
//! 3. Detail      getInfo + getFavorites per photo, cached  → Vec<PhotoDetail>
//! 4. Rank        filter by age/views, union of top-N lists → table
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`oauth`] | Request signing, the loopback callback listener, and the authorization handshake |
//! | [`api`] | HTTP transport seam, typed REST methods, response schemas, [`api::FlickrClient`] |
//! | [`fetch`] | Bounded worker pool fetching photo details with a single cache writer |
//! | [`cache`] | Gzip JSON photo cache with per-entry freshness |
//! | [`rank`] | Age/view filter and the four ranking measures |
//! | [`config`] | `~/.flickrank.toml`: credential and tuning knobs |
//! | [`types`] | [`types::PhotoDetail`], shared by fetch, cache and rank |
//! | [`output`] | CLI output formatting for progress and the ranking table |
//!
//! # Design Decisions
//!
//! ## Everything Is Signed
//!
//! Every REST call goes through [`oauth::RequestSigner`], including the
//! anonymous ones. Without an access token the signing key simply ends in
//! `&`.
//!
//! ## No Global State
//!
//! The consumer key, the access token and the HTTP transport are values
//! handed to constructors. Tests build a [`api::FlickrClient`] over a mock
//! transport and run the real signing and decoding code against it.
//!
//! ## One Writer
//!
//! Detail fetches run on a dedicated rayon pool, but only the collector
//! thread in [`fetch`] mutates the [`cache::PhotoCache`]. Workers hand
//! results over a channel.

pub mod api;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod oauth;
pub mod output;
pub mod rank;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
