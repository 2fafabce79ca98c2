//! Crawl frontier and visited set
//!
//! This module handles:
//! - FIFO (breadth-first) queue of URLs waiting to be fetched
//! - The visited set keyed by canonical URL
//! - The max-depth cutoff for discovered links
//! - The asset ledger deduplicating asset fetches
//!
//! The frontier has no locking of its own; the coordinator keeps it inside
//! its single critical section.

use crate::storage::AssetType;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// Canonical URL to fetch
    pub url: Url,

    /// Link distance from the seed
    pub depth: u32,
}

/// What happened to a URL offered to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Newly visited and waiting in the queue
    Queued,

    /// Already visited (queued or fetched) earlier in the crawl
    AlreadySeen,

    /// Beyond the crawl's max depth; not marked visited
    DepthExceeded,
}

/// Queue plus dedup ledgers for one crawl
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    visited: HashSet<String>,
    recorded: HashSet<String>,
    assets: HashSet<(AssetType, String)>,
    max_depth: u32,
}

impl Frontier {
    /// Creates an empty frontier for a crawl with the given max depth
    pub fn new(max_depth: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            recorded: HashSet::new(),
            assets: HashSet::new(),
            max_depth,
        }
    }

    /// Offers a URL discovered at `depth`
    ///
    /// A URL is marked visited the moment it is queued, so two workers
    /// discovering the same link cannot both queue it.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> EnqueueOutcome {
        if depth > self.max_depth {
            return EnqueueOutcome::DepthExceeded;
        }

        if !self.mark_visited(&url) {
            return EnqueueOutcome::AlreadySeen;
        }

        self.queue.push_back(QueuedUrl { url, depth });
        EnqueueOutcome::Queued
    }

    /// Takes the oldest queued URL
    pub fn dequeue(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    /// Marks a canonical URL visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    /// Notes that a skip has been logged for `url`; returns false if it
    /// already was, so each skipped URL is logged once
    pub fn note_recorded(&mut self, url: &Url) -> bool {
        self.recorded.insert(url.as_str().to_string())
    }

    /// Claims an asset fetch; returns false if (kind, url) was claimed before
    pub fn claim_asset(&mut self, kind: AssetType, url: &Url) -> bool {
        self.assets.insert((kind, url.as_str().to_string()))
    }

    /// Number of queued URLs
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
