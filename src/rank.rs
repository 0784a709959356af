//! Filtering and ranking of fetched photos.
//!
//! Four measures are available:
//!
//! | Mode | Measure |
//! |------|---------|
//! | `views` | total views |
//! | `rate` | views per second of age (shown per day) |
//! | `faves` | total favorites |
//! | `fave-rate` | favorites per view |
//!
//! Each selected mode sorts the photos (stable, descending) and marks the
//! top N. The result is every photo marked by at least one mode, in the
//! order of the last sort. With no explicit mode the order is
//! views, faves, fave-rate, rate: the union of all four top lists, listed
//! by view rate.

use crate::types::PhotoDetail;
use clap::ValueEnum;
use std::cmp::Ordering;

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankBy {
    Views,
    Rate,
    Faves,
    FaveRate,
}

pub const DEFAULT_ORDER: [RankBy; 4] = [
    RankBy::Views,
    RankBy::Faves,
    RankBy::FaveRate,
    RankBy::Rate,
];

impl RankBy {
    /// Descending order for this measure.
    fn compare(self, a: &PhotoDetail, b: &PhotoDetail, now: i64) -> Ordering {
        match self {
            RankBy::Views => b.views.cmp(&a.views),
            RankBy::Faves => b.favorites.cmp(&a.favorites),
            RankBy::Rate => view_rate(b, now).total_cmp(&view_rate(a, now)),
            RankBy::FaveRate => fave_rate(b).total_cmp(&fave_rate(a)),
        }
    }
}

/// Photos outside these bounds are never ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub min_days: i64,
    pub max_days: i64,
    pub min_views: u64,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            min_days: 60,
            max_days: i64::MAX,
            min_views: 1000,
        }
    }
}

impl Filter {
    /// Age in whole days within `[min_days, max_days]` and at least
    /// `min_views` views.
    pub fn accepts(&self, photo: &PhotoDetail, now: i64) -> bool {
        let days = age_secs(photo, now) / SECONDS_PER_DAY;
        days >= self.min_days && days <= self.max_days && photo.views >= self.min_views
    }
}

pub fn age_secs(photo: &PhotoDetail, now: i64) -> i64 {
    now.saturating_sub(photo.posted)
}

/// Views per second since upload; 0 for a photo posted at `now`.
pub fn view_rate(photo: &PhotoDetail, now: i64) -> f64 {
    match age_secs(photo, now) {
        0 => 0.0,
        age => photo.views as f64 / age as f64,
    }
}

/// Favorites per view; 0 for an unviewed photo.
pub fn fave_rate(photo: &PhotoDetail) -> f64 {
    if photo.views == 0 {
        return 0.0;
    }
    photo.favorites as f64 / photo.views as f64
}

pub fn filter(photos: Vec<PhotoDetail>, filter: &Filter, now: i64) -> Vec<PhotoDetail> {
    photos
        .into_iter()
        .filter(|p| filter.accepts(p, now))
        .collect()
}

/// Union of the top `top` photos under each of `modes` (or
/// [`DEFAULT_ORDER`] when empty), in the order of the last mode.
pub fn select(
    photos: Vec<PhotoDetail>,
    modes: &[RankBy],
    top: usize,
    now: i64,
) -> Vec<PhotoDetail> {
    let modes = if modes.is_empty() {
        &DEFAULT_ORDER[..]
    } else {
        modes
    };

    let mut marked: Vec<(PhotoDetail, bool)> = photos.into_iter().map(|p| (p, false)).collect();
    for mode in modes {
        marked.sort_by(|a, b| mode.compare(&a.0, &b.0, now));
        for entry in marked.iter_mut().take(top) {
            entry.1 = true;
        }
    }
    marked
        .into_iter()
        .filter_map(|(photo, selected)| selected.then_some(photo))
        .collect()
}
