//! Concurrent photo-detail fetching.
//!
//! Given a list of photo ids, [`DetailFetchPipeline::fetch`] returns a
//! detail record (or the error that prevented one) for every id:
//!
//! 1. **Partition.** Ids with a fresh cache entry are answered from the
//!    cache. The rest become fetch jobs.
//! 2. **Fetch.** Jobs run on a dedicated rayon pool of exactly
//!    `concurrency` threads, one `scope` spawn per job. Each worker performs
//!    the two detail calls and sends the result over an mpsc channel.
//! 3. **Collect.** A single collector thread drains the channel and is the
//!    only code that writes to the [`PhotoCache`]. The borrow checker holds
//!    it to that: the collector owns the `&mut PhotoCache` for the duration.
//!
//! The pool scope returning means every job has run; joining the collector
//! means every result has been recorded. Only then does `fetch` return.
//!
//! A failed photo is recorded as an error for that id and never aborts the
//! others. Nothing is retried.

use crate::api::{ApiError, FlickrClient, Transport};
use crate::cache::{CacheEntry, PhotoCache};
use crate::types::PhotoDetail;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Anything that can produce a [`PhotoDetail`] for an id.
pub trait DetailSource: Sync {
    fn fetch_detail(&self, photo_id: &str) -> Result<PhotoDetail, ApiError>;
}

impl<T: Transport> DetailSource for FlickrClient<T> {
    fn fetch_detail(&self, photo_id: &str) -> Result<PhotoDetail, ApiError> {
        self.photo_detail(photo_id)
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("failed to start fetch workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("result collector panicked")]
    CollectorPanicked,
}

/// Some ids came back without a detail record.
#[derive(Error, Debug)]
#[error("{} of {total} photos could not be fetched", .failed.len())]
pub struct PartialFetchError {
    /// Failed ids in ascending order, never empty.
    pub failed: Vec<(String, ApiError)>,
    pub total: usize,
}

/// Progress events, sent in the order results are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Started {
        total: usize,
        cached: usize,
        to_fetch: usize,
    },
    Fetched {
        done: usize,
        to_fetch: usize,
        id: String,
        title: String,
    },
    Failed {
        done: usize,
        to_fetch: usize,
        id: String,
        error: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub hits: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl FetchStats {
    pub fn total(&self) -> usize {
        self.hits + self.fetched + self.failed
    }
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(f, "{} cached, {} fetched", self.hits, self.fetched)?;
        } else {
            write!(f, "{} fetched", self.fetched)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.hits > 0 || self.failed > 0 {
            write!(f, " ({} total)", self.total())?;
        }
        Ok(())
    }
}

/// Result of one [`DetailFetchPipeline::fetch`]: exactly one entry per
/// distinct requested id.
#[derive(Debug)]
pub struct FetchOutcome {
    pub results: HashMap<String, Result<PhotoDetail, ApiError>>,
    pub stats: FetchStats,
}

impl FetchOutcome {
    /// Every detail, ordered by id, or the list of ids that failed.
    pub fn into_complete(self) -> Result<Vec<PhotoDetail>, PartialFetchError> {
        let total = self.results.len();
        let mut details = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for (id, result) in self.results {
            match result {
                Ok(detail) => details.push(detail),
                Err(e) => failed.push((id, e)),
            }
        }
        if !failed.is_empty() {
            failed.sort_by(|a, b| a.0.cmp(&b.0));
            return Err(PartialFetchError { failed, total });
        }
        details.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(details)
    }
}

pub struct DetailFetchPipeline<'a, S> {
    source: &'a S,
    cache: &'a mut PhotoCache,
    ttl: Duration,
    events: Option<Sender<FetchEvent>>,
}

impl<'a, S: DetailSource> DetailFetchPipeline<'a, S> {
    pub fn new(source: &'a S, cache: &'a mut PhotoCache, ttl: Duration) -> Self {
        Self {
            source,
            cache,
            ttl,
            events: None,
        }
    }

    /// Report progress on `events`. The receiver may hang up at any time.
    pub fn with_events(mut self, events: Sender<FetchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn fetch(
        &mut self,
        ids: &[String],
        concurrency: usize,
    ) -> Result<FetchOutcome, FetchError> {
        if concurrency == 0 {
            return Err(FetchError::InvalidConcurrency);
        }

        let now = Utc::now();
        let unique: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        let mut results = HashMap::with_capacity(unique.len());
        let mut stats = FetchStats::default();
        let mut misses = Vec::new();
        for id in &unique {
            match self.cache.get_fresh(id, now, self.ttl) {
                Some(detail) => {
                    results.insert(id.to_string(), Ok(detail.clone()));
                    stats.hits += 1;
                }
                None => misses.push(id.to_string()),
            }
        }

        let to_fetch = misses.len();
        tracing::debug!(
            requested = unique.len(),
            cached = stats.hits,
            to_fetch,
            concurrency,
            "partitioned fetch jobs"
        );
        emit(
            self.events.as_ref(),
            FetchEvent::Started {
                total: unique.len(),
                cached: stats.hits,
                to_fetch,
            },
        );
        if misses.is_empty() {
            return Ok(FetchOutcome { results, stats });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("fetch-{i}"))
            .build()?;

        let source = self.source;
        let cache = &mut *self.cache;
        let events = self.events.as_ref();
        let (tx, rx) = mpsc::channel::<(String, Result<PhotoDetail, ApiError>)>();

        let fetched = thread::scope(|s| {
            let collector = s.spawn(move || {
                let mut recorded = HashMap::with_capacity(to_fetch);
                for (id, result) in rx {
                    let done = recorded.len() + 1;
                    let event = match &result {
                        Ok(detail) => {
                            cache.put(CacheEntry::new(detail.clone(), Utc::now()));
                            FetchEvent::Fetched {
                                done,
                                to_fetch,
                                id: id.clone(),
                                title: detail.title.clone(),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(photo = %id, error = %e, "detail fetch failed");
                            FetchEvent::Failed {
                                done,
                                to_fetch,
                                id: id.clone(),
                                error: e.to_string(),
                            }
                        }
                    };
                    emit(events, event);
                    recorded.insert(id, result);
                }
                recorded
            });

            pool.scope(|scope| {
                for id in &misses {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let result = source.fetch_detail(id);
                        // The collector outlives every job.
                        let _ = tx.send((id.clone(), result));
                    });
                }
            });
            drop(tx);
            collector.join()
        })
        .map_err(|_| FetchError::CollectorPanicked)?;

        for (id, result) in fetched {
            match result {
                Ok(_) => stats.fetched += 1,
                Err(_) => stats.failed += 1,
            }
            results.insert(id, result);
        }
        tracing::debug!(%stats, "fetch complete");
        Ok(FetchOutcome { results, stats })
    }
}

fn emit(events: Option<&Sender<FetchEvent>>, event: FetchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
