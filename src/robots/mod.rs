//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// How a robots.txt fetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsOutcome {
    /// robots.txt was fetched and parsed
    Loaded,
    /// The origin answered with a 4xx; everything is allowed
    Missing(u16),
    /// 5xx or network failure; everything is allowed
    Unavailable(String),
}

/// Fetches robots.txt for the origin of `url`
///
/// Never fails: a missing or unreachable robots.txt yields allow-all rules,
/// and the outcome says which case applied.
pub async fn fetch_robots(client: &Client, url: &Url) -> (ParsedRobots, RobotsOutcome) {
    let mut robots_url = url.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    let response = match client.get(robots_url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("robots.txt unreachable at {}: {}", robots_url, e);
            return (
                ParsedRobots::allow_all(),
                RobotsOutcome::Unavailable(e.to_string()),
            );
        }
    };

    let status = response.status();
    if status.is_client_error() {
        return (ParsedRobots::allow_all(), RobotsOutcome::Missing(status.as_u16()));
    }
    if !status.is_success() {
        return (
            ParsedRobots::allow_all(),
            RobotsOutcome::Unavailable(format!("HTTP {}", status.as_u16())),
        );
    }

    match response.text().await {
        Ok(body) => (ParsedRobots::from_content(&body), RobotsOutcome::Loaded),
        Err(e) => (
            ParsedRobots::allow_all(),
            RobotsOutcome::Unavailable(e.to_string()),
        ),
    }
}
