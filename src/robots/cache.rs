//! Per-crawl robots.txt cache
//!
//! Rules are fetched at most once per origin and then kept for the lifetime
//! of the crawl that owns the cache. Each origin has its own cell, so a slow
//! robots.txt only holds up requests to that origin.

use crate::robots::{fetch_robots, ParsedRobots, RobotsOutcome};
use crate::url::origin_key;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use url::Url;

/// Cached robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub rules: ParsedRobots,
    pub outcome: RobotsOutcome,
    pub fetched_at: DateTime<Utc>,
}

type Slot = Arc<OnceCell<CachedRobots>>;

/// Origin-keyed robots.txt cache
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the rules for the origin of `url`, fetching them on first use
    ///
    /// The second element is `Some` only for the call that performed the
    /// fetch, so callers can record the outcome exactly once. Concurrent
    /// callers for the same origin wait for that one fetch.
    pub async fn get_or_fetch(
        &self,
        client: &Client,
        url: &Url,
    ) -> (ParsedRobots, Option<RobotsOutcome>) {
        let origin = origin_key(url);
        let slot = Arc::clone(self.entries().entry(origin.clone()).or_default());

        let mut fetched_here = false;
        let performed = &mut fetched_here;
        let cached = slot
            .get_or_init(move || async move {
                *performed = true;
                tracing::debug!("Fetching robots.txt for origin: {}", origin);
                let (rules, outcome) = fetch_robots(client, url).await;
                CachedRobots {
                    rules,
                    outcome,
                    fetched_at: Utc::now(),
                }
            })
            .await;

        let outcome = fetched_here.then(|| cached.outcome.clone());
        (cached.rules.clone(), outcome)
    }

    /// Stores rules for an origin without fetching (tests, pre-seeded rules)
    pub fn insert(&self, url: &Url, rules: ParsedRobots) {
        let cached = CachedRobots {
            rules,
            outcome: RobotsOutcome::Loaded,
            fetched_at: Utc::now(),
        };
        self.entries()
            .insert(origin_key(url), Arc::new(OnceCell::from(cached)));
    }

    /// Number of origins with loaded rules
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
