//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives one crawl, including:
//! - Seeding the frontier and checking the seed against robots.txt
//! - Coordinating fetching, parsing, and link extraction across workers
//! - Persisting pages and assets and keeping the page counter
//! - Observing pause/cancel and the crawl deadline
//! - Deciding the final crawl status
//!
//! Frontier mutation, visited marking, page persistence and the page counter
//! share one critical section (`CrawlProgress`). It is never held across an
//! await point. Locks are taken in the order progress, control status,
//! storage.

use crate::config::Config;
use crate::crawler::control::CrawlControl;
use crate::crawler::fetcher::{FetchKind, Fetcher};
use crate::crawler::frontier::{EnqueueOutcome, Frontier, QueuedUrl};
use crate::crawler::log::CrawlLogger;
use crate::crawler::parser::parse_html;
use crate::robots::{RobotsCache, RobotsOutcome};
use crate::state::{CrawlOptions, CrawlStatus};
use crate::storage::{self, NewPage, SharedStorage, Storage};
use crate::url::{asset_path, is_allowed, normalize_url, page_path, same_origin};
use crate::{FerryError, Result};
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use url::Url;

/// How long an idle worker sleeps before re-checking the frontier
const IDLE_POLL: Duration = Duration::from_millis(50);

/// The immutable parameters of one crawl
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub crawl_id: i64,
    pub seed: Url,
    pub max_depth: u32,
    pub options: CrawlOptions,
}

/// State mutated by workers under the critical section
struct CrawlProgress {
    frontier: Frontier,
    page_count: u64,
    in_flight: usize,
    timed_out: bool,
}

struct Shared {
    job: CrawlJob,
    product_token: String,
    workers: usize,
    crawl_timeout: Option<Duration>,
    fetcher: Fetcher,
    robots: RobotsCache,
    progress: Mutex<CrawlProgress>,
    wake: Notify,
    control: Arc<CrawlControl>,
    storage: SharedStorage,
}

impl Shared {
    fn progress(&self) -> MutexGuard<'_, CrawlProgress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn logger(&self) -> &CrawlLogger {
        self.control.logger()
    }
}

/// Keeps a dequeued URL counted as in flight until the worker is done with it
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.progress().in_flight -= 1;
        self.shared.wake.notify_waiters();
    }
}

enum Next {
    Fetch(QueuedUrl),
    Wait,
    Done,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Creates a coordinator for a crawl already moved to `in_progress`
    ///
    /// # Arguments
    ///
    /// * `job` - The crawl to run
    /// * `config` - Crawler configuration (workers, politeness, retries)
    /// * `client` - HTTP client used for every request of this crawl
    /// * `control` - Status handle shared with the service
    /// * `storage` - Shared storage backend
    pub fn new(
        job: CrawlJob,
        config: &Config,
        client: Client,
        control: Arc<CrawlControl>,
        storage: SharedStorage,
    ) -> Self {
        let progress = CrawlProgress {
            frontier: Frontier::new(job.max_depth),
            page_count: 0,
            in_flight: 0,
            timed_out: false,
        };

        Self {
            shared: Arc::new(Shared {
                job,
                product_token: config.user_agent.crawler_name.clone(),
                workers: config.crawler.workers.max(1) as usize,
                crawl_timeout: config.crawler.crawl_timeout(),
                fetcher: Fetcher::new(client, config.crawler.clone()),
                robots: RobotsCache::new(),
                progress: Mutex::new(progress),
                wake: Notify::new(),
                control,
                storage,
            }),
        }
    }

    /// Runs the crawl to a terminal status and returns it
    pub async fn run(self) -> CrawlStatus {
        let shared = self.shared;
        let crawl_id = shared.job.crawl_id;

        match drive(&shared).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Crawl {} aborted: {}", crawl_id, e);
                let reason = e.to_string();
                if let Err(e) = shared.control.transition(CrawlStatus::Error, Some(&reason)) {
                    tracing::debug!("Crawl {} not moved to error: {}", crawl_id, e);
                }
                shared.control.status()
            }
        }
    }
}

async fn drive(shared: &Arc<Shared>) -> Result<CrawlStatus> {
    let job = &shared.job;
    let started = Instant::now();

    shared.logger().info(&format!(
        "Crawling {} to depth {} with {} workers",
        job.seed, job.max_depth, shared.workers
    ))?;

    if !robots_allow(shared, &job.seed).await? {
        let violation = FerryError::PolicyViolation {
            url: job.seed.to_string(),
            reason: "seed URL is disallowed by robots.txt".to_string(),
        };
        finish(shared, CrawlStatus::Error, Some(&violation.to_string()))?;
        return Ok(shared.control.status());
    }

    shared.progress().frontier.enqueue(job.seed.clone(), 0);

    let deadline = shared.crawl_timeout.map(|timeout| started + timeout);
    let mut workers = JoinSet::new();
    for worker_id in 0..shared.workers {
        let shared = Arc::clone(shared);
        workers.spawn(async move { (worker_id, worker(shared, deadline).await) });
    }

    let mut failures = 0;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((worker_id, Err(e))) => {
                failures += 1;
                shared
                    .logger()
                    .error(&format!("Worker {} failed: {}", worker_id, e))?;
                shared.wake.notify_waiters();
            }
            Err(e) => {
                failures += 1;
                shared.logger().error(&format!("Worker crashed: {}", e))?;
                shared.wake.notify_waiters();
            }
        }
    }

    let (page_count, drained, timed_out) = {
        let progress = shared.progress();
        (
            progress.page_count,
            progress.frontier.is_empty() && progress.in_flight == 0,
            progress.timed_out,
        )
    };

    if shared.control.status().is_terminal() {
        return Ok(shared.control.status());
    }

    if timed_out {
        let reason = format!(
            "Crawl timed out after {}s",
            shared.crawl_timeout.unwrap_or_default().as_secs()
        );
        finish(shared, CrawlStatus::Error, Some(&reason))?;
    } else if failures == shared.workers {
        finish(shared, CrawlStatus::Error, Some("All crawl workers failed"))?;
    } else if drained {
        tracing::info!(
            "Crawl {} finished: {} pages in {:?}",
            job.crawl_id,
            page_count,
            started.elapsed()
        );
        finish(shared, CrawlStatus::Completed, None)?;
    }

    Ok(shared.control.status())
}

/// Applies a final transition unless the crawl already left `in_progress`
fn finish(shared: &Shared, to: CrawlStatus, error: Option<&str>) -> Result<()> {
    match shared.control.transition(to, error) {
        Ok(_) => Ok(()),
        Err(FerryError::InvalidTransition { from, .. }) => {
            tracing::debug!(
                "Crawl {} is {}; not moving to {}",
                shared.job.crawl_id,
                from,
                to
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn worker(shared: Arc<Shared>, deadline: Option<Instant>) -> Result<()> {
    let mut status_rx = shared.control.subscribe();

    loop {
        let status = *status_rx.borrow_and_update();
        match status {
            CrawlStatus::InProgress => {}
            CrawlStatus::Paused => {
                if status_rx.changed().await.is_err() {
                    return Ok(());
                }
                continue;
            }
            _ => return Ok(()),
        }

        if deadline.map_or(false, |d| Instant::now() >= d) {
            shared.progress().timed_out = true;
            shared.wake.notify_waiters();
            return Ok(());
        }

        let next = {
            let mut progress = shared.progress();
            if progress.timed_out {
                Next::Done
            } else if let Some(queued) = progress.frontier.dequeue() {
                progress.in_flight += 1;
                Next::Fetch(queued)
            } else if progress.in_flight == 0 {
                Next::Done
            } else {
                Next::Wait
            }
        };

        match next {
            Next::Fetch(queued) => {
                let _guard = InFlightGuard {
                    shared: Arc::clone(&shared),
                };
                process_page(&shared, &status_rx, queued).await?;
            }
            Next::Wait => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = status_rx.changed() => {}
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
            }
            Next::Done => {
                shared.wake.notify_waiters();
                return Ok(());
            }
        }
    }
}

/// Fetches robots.txt for the origin on first use and checks `url` against it
async fn robots_allow(shared: &Shared, url: &Url) -> Result<bool> {
    let options = &shared.job.options;
    if !options.respect_robots {
        return Ok(true);
    }

    let (rules, outcome) = shared
        .robots
        .get_or_fetch(shared.fetcher.client(), url)
        .await;

    if let Some(outcome) = outcome {
        let origin = url.origin().ascii_serialization();
        match outcome {
            RobotsOutcome::Loaded => {
                let delay = rules
                    .crawl_delay(&shared.product_token)
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .map(Duration::from_secs_f64);
                shared.fetcher.set_crawl_delay(url, delay);
                shared
                    .logger()
                    .info(&format!("Loaded robots.txt for {}", origin))?;
            }
            RobotsOutcome::Missing(status) => {
                shared.logger().info(&format!(
                    "No robots.txt for {} (HTTP {}); all paths allowed",
                    origin, status
                ))?;
            }
            RobotsOutcome::Unavailable(reason) => {
                shared.logger().warning(&format!(
                    "robots.txt for {} unavailable ({}); all paths allowed",
                    origin, reason
                ))?;
            }
        }
    }

    Ok(is_allowed(url, Some(&rules), options, &shared.product_token))
}

async fn process_page(
    shared: &Shared,
    status_rx: &watch::Receiver<CrawlStatus>,
    queued: QueuedUrl,
) -> Result<()> {
    let job = &shared.job;
    let url = &queued.url;

    if !robots_allow(shared, url).await? {
        shared
            .logger()
            .info(&format!("Skipped {}: disallowed by robots.txt", url))?;
        return Ok(());
    }

    let fetched = match shared.fetcher.fetch(url, FetchKind::Page).await {
        Ok(fetched) => fetched,
        Err(e) => {
            shared
                .logger()
                .warning(&format!("Failed to fetch page {}: {}", url, e))?;
            return Ok(());
        }
    };

    let final_url = normalize_url(fetched.final_url.as_str(), None)
        .unwrap_or_else(|_| fetched.final_url.clone());
    let final_url = &final_url;
    let redirected = final_url != url;
    if redirected {
        shared
            .logger()
            .info(&format!("Redirected {} -> {}", url, final_url))?;
        if !robots_allow(shared, final_url).await? {
            shared.logger().info(&format!(
                "Discarded page {}: redirect target {} is disallowed by robots.txt",
                url, final_url
            ))?;
            return Ok(());
        }
    }

    let html = fetched.text();
    let parsed = parse_html(&html, final_url);
    let path = page_path(url);
    let child_depth = queued.depth + 1;

    let mut skipped = Vec::new();
    let mut assets = Vec::new();
    {
        let mut progress = shared.progress();
        // A cancelled crawl keeps what it had when the cancel was committed
        let status = shared.control.status();
        if status.is_terminal() {
            drop(progress);
            shared
                .logger()
                .info(&format!("Discarded page {}: crawl is {}", url, status))?;
            return Ok(());
        }
        if redirected
            && same_origin(final_url, &job.seed)
            && !progress.frontier.mark_visited(final_url)
        {
            drop(progress);
            shared.logger().info(&format!(
                "Discarded page {}: redirect target {} is already crawled",
                url, final_url
            ))?;
            return Ok(());
        }
        let mut storage = storage::lock(&shared.storage)?;

        let inserted = storage.insert_page(
            job.crawl_id,
            &NewPage {
                url: url.as_str(),
                path: &path,
                title: parsed.title.as_deref(),
                content: &html,
                depth: queued.depth,
            },
        )?;
        if inserted.is_some() {
            progress.page_count += 1;
            storage.set_page_count(job.crawl_id, progress.page_count)?;
        }

        for link in parsed.links {
            if !same_origin(&link, &job.seed) {
                if progress.frontier.note_recorded(&link) {
                    skipped.push(format!("Skipped {}: outside the seed origin", link));
                }
                continue;
            }

            if progress.frontier.enqueue(link.clone(), child_depth) == EnqueueOutcome::DepthExceeded
                && progress.frontier.note_recorded(&link)
            {
                skipped.push(format!(
                    "Skipped {}: depth {} exceeds max depth {}",
                    link, child_depth, job.max_depth
                ));
            }
        }

        let kinds = [
            (FetchKind::Image, parsed.images),
            (FetchKind::Stylesheet, parsed.stylesheets),
        ];
        for (kind, urls) in kinds {
            if !kind.is_enabled(&job.options) {
                continue;
            }
            for asset_url in urls {
                if let Some(asset_type) = kind.asset_type() {
                    if progress.frontier.claim_asset(asset_type, &asset_url) {
                        assets.push((kind, asset_url));
                    }
                }
            }
        }
    }
    shared.wake.notify_waiters();

    shared.logger().success(&format!(
        "Fetched page {} ({} bytes, depth {})",
        url,
        fetched.body.len(),
        queued.depth
    ))?;
    for message in &skipped {
        shared.logger().info(message)?;
    }

    for (kind, asset_url) in assets {
        let stopped = status_rx.borrow().is_terminal();
        if stopped {
            break;
        }
        fetch_asset(shared, kind, &asset_url).await?;
    }

    Ok(())
}

async fn fetch_asset(shared: &Shared, kind: FetchKind, url: &Url) -> Result<()> {
    let job = &shared.job;
    let Some(asset_type) = kind.asset_type() else {
        return Ok(());
    };

    if !robots_allow(shared, url).await? {
        shared
            .logger()
            .info(&format!("Skipped {} {}: disallowed by robots.txt", kind, url))?;
        return Ok(());
    }

    match shared.fetcher.fetch(url, kind).await {
        Ok(fetched) => {
            let path = asset_path(url, &job.seed);
            storage::lock(&shared.storage)?.insert_asset(
                job.crawl_id,
                url.as_str(),
                &path,
                asset_type,
                &fetched.body,
            )?;
            shared.logger().success(&format!(
                "Fetched {} {} ({} bytes)",
                kind,
                url,
                fetched.body.len()
            ))?;
        }
        Err(e) => {
            shared
                .logger()
                .warning(&format!("Failed to fetch {} {}: {}", kind, url, e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::crawler::build_http_client;
    use crate::storage::{AssetType, LogStatus, SqliteStorage};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                workers: 2,
                min_request_interval: 0,
                backoff_base_ms: 1,
                backoff_max_ms: 5,
                ..CrawlerConfig::default()
            },
            ..Config::default()
        }
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            format!("<html><head><title>T</title></head><body>{}</body></html>", body),
            "text/html",
        )
    }

    async fn mount(server: &MockServer, p: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn prepare(
        server: &MockServer,
        config: &Config,
        backend: SqliteStorage,
        max_depth: u32,
        options: CrawlOptions,
    ) -> (Coordinator, Arc<CrawlControl>, SharedStorage, i64) {
        let seed = Url::parse(&format!("{}/", server.uri())).unwrap();
        let mut backend = backend;
        let crawl_id = backend
            .create_crawl("u", seed.as_str(), max_depth, &options)
            .unwrap();
        let shared = storage::shared(backend);

        let control = Arc::new(CrawlControl::new(crawl_id, CrawlStatus::Idle, shared.clone()));
        control.transition(CrawlStatus::InProgress, None).unwrap();

        let job = CrawlJob {
            crawl_id,
            seed,
            max_depth,
            options,
        };
        let client = build_http_client(config).unwrap();
        let coordinator =
            Coordinator::new(job, config, client, Arc::clone(&control), shared.clone());
        (coordinator, control, shared, crawl_id)
    }

    async fn run_with(
        server: &MockServer,
        config: &Config,
        backend: SqliteStorage,
        max_depth: u32,
        options: CrawlOptions,
    ) -> (CrawlStatus, SharedStorage, i64) {
        let (coordinator, _control, shared, crawl_id) =
            prepare(server, config, backend, max_depth, options);
        (coordinator.run().await, shared, crawl_id)
    }

    async fn run(
        server: &MockServer,
        max_depth: u32,
        options: CrawlOptions,
    ) -> (CrawlStatus, SharedStorage, i64) {
        let backend = SqliteStorage::new_in_memory().unwrap();
        run_with(server, &create_test_config(), backend, max_depth, options).await
    }

    #[tokio::test]
    async fn test_depth_bound_and_page_count() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(&server, "/", html(r#"<a href="/a">A</a><a href="/b">B</a>"#)).await;
        mount(&server, "/a", html(r#"<a href="/deep">Deep</a><a href="/">Home</a>"#)).await;
        mount(&server, "/b", html(r#"<a href="/a">A</a>"#)).await;

        let (status, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(crawl_id).unwrap();
        let pages = guard.get_pages(crawl_id).unwrap();
        let paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();

        assert_eq!(paths, vec!["/", "/a", "/b"]);
        assert!(pages.iter().all(|p| p.depth <= 1));
        assert_eq!(crawl.page_count, 3);
        assert!(crawl.completed_at.is_some());

        let logs = guard.get_logs(crawl_id).unwrap();
        let deep_skips = logs
            .iter()
            .filter(|l| l.status == LogStatus::Info && l.message.contains("/deep"))
            .count();
        assert_eq!(deep_skips, 1);
    }

    #[tokio::test]
    async fn test_cross_origin_links_are_logged_not_fetched() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(
            &server,
            "/",
            html(r#"<a href="https://elsewhere.invalid/x">X</a><a href="https://elsewhere.invalid/x#y">X</a>"#),
        )
        .await;

        let (status, shared, crawl_id) = run(&server, 2, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 1);
        let cross = guard
            .get_logs(crawl_id)
            .unwrap()
            .into_iter()
            .filter(|l| l.message.contains("outside the seed origin"))
            .count();
        assert_eq!(cross, 1);
    }

    #[tokio::test]
    async fn test_seed_disallowed_by_robots_is_an_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/robots.txt",
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(""))
            .expect(0)
            .mount(&server)
            .await;

        let (status, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Error);
        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(crawl_id).unwrap();
        assert!(crawl.error.unwrap().contains("robots.txt"));
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_disallowed_names_the_violation() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/robots.txt",
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"),
        )
        .await;

        let (_, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        let guard = storage::lock(&shared).unwrap();
        let error = guard.get_crawl(crawl_id).unwrap().error.unwrap();
        assert!(error.starts_with("Policy violation for "));
        assert!(error.ends_with(": seed URL is disallowed by robots.txt"));
    }

    #[tokio::test]
    async fn test_redirect_to_crawled_page_is_not_stored_twice() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(&server, "/", html(r#"<a href="/a">A</a><a href="/old">Old</a>"#)).await;
        mount(&server, "/a", html("")).await;
        mount(
            &server,
            "/old",
            ResponseTemplate::new(301).insert_header("location", "/a"),
        )
        .await;

        let (status, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 2);
        let logs = guard.get_logs(crawl_id).unwrap();
        assert!(logs
            .iter()
            .any(|l| l.message.starts_with("Redirected ") && l.message.contains("/old -> ")));
        assert!(logs
            .iter()
            .any(|l| l.message.contains("is already crawled")));
    }

    #[tokio::test]
    async fn test_redirect_target_disallowed_by_robots_is_discarded() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/robots.txt",
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .await;
        mount(&server, "/", html(r#"<a href="/moved">Moved</a>"#)).await;
        mount(
            &server,
            "/moved",
            ResponseTemplate::new(302).insert_header("location", "/private/page"),
        )
        .await;
        mount(&server, "/private/page", html("")).await;

        let (status, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 1);
        assert!(guard
            .get_logs(crawl_id)
            .unwrap()
            .iter()
            .any(|l| l.message.contains("redirect target") && l.message.contains("robots.txt")));
    }

    #[tokio::test]
    async fn test_failed_page_is_a_warning() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(&server, "/", html(r#"<a href="/gone">Gone</a>"#)).await;
        mount(&server, "/gone", ResponseTemplate::new(404)).await;

        let (status, shared, crawl_id) = run(&server, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        let warnings: Vec<_> = guard
            .get_logs(crawl_id)
            .unwrap()
            .into_iter()
            .filter(|l| l.status == LogStatus::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("/gone"));
    }

    #[tokio::test]
    async fn test_assets_follow_options() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(
            &server,
            "/",
            ResponseTemplate::new(200).set_body_raw(
                r#"<html><head><link rel="stylesheet" href="/site.css"></head>
                <body><img src="/logo.png"></body></html>"#,
                "text/html",
            ),
        )
        .await;
        mount(
            &server,
            "/site.css",
            ResponseTemplate::new(200).set_body_raw("body{margin:0}", "text/css"),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8], "image/png"))
            .expect(0)
            .mount(&server)
            .await;

        let (status, shared, crawl_id) = run(&server, 0, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(guard.count_assets(crawl_id, AssetType::Image).unwrap(), 0);
        let sheets = guard.get_assets(crawl_id, Some(AssetType::Stylesheet)).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].path, "/site.css");
        assert_eq!(sheets[0].content, b"body{margin:0}".to_vec());
    }

    #[tokio::test]
    async fn test_cancel_discards_in_flight_page() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(
            &server,
            "/",
            html(r#"<a href="/a">A</a>"#).set_delay(Duration::from_millis(300)),
        )
        .await;

        let backend = SqliteStorage::new_in_memory().unwrap();
        let (coordinator, control, shared, crawl_id) = prepare(
            &server,
            &create_test_config(),
            backend,
            1,
            CrawlOptions::default(),
        );
        let handle = tokio::spawn(coordinator.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        control.transition(CrawlStatus::Cancelled, None).unwrap();
        let at_cancel = storage::lock(&shared).unwrap().count_pages(crawl_id).unwrap();

        assert_eq!(handle.await.unwrap(), CrawlStatus::Cancelled);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(at_cancel, 0);
        assert_eq!(guard.count_pages(crawl_id).unwrap(), at_cancel);
        assert_eq!(guard.get_crawl(crawl_id).unwrap().page_count, at_cancel);

        let logs = guard.get_logs(crawl_id).unwrap();
        assert!(logs.iter().any(|l| l.message.starts_with("Discarded page")));
        assert!(!logs.iter().any(|l| l.message.starts_with("Fetched page")));
    }

    #[tokio::test]
    async fn test_crawl_timeout_is_an_error() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(
            &server,
            "/",
            html(r#"<a href="/a">A</a>"#).set_delay(Duration::from_millis(1500)),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html(""))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = create_test_config();
        config.crawler.workers = 1;
        config.crawler.crawl_timeout_secs = Some(1);
        let backend = SqliteStorage::new_in_memory().unwrap();
        let (status, shared, crawl_id) =
            run_with(&server, &config, backend, 2, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Error);
        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(crawl_id).unwrap();
        assert!(crawl.error.unwrap().contains("timed out"));
        assert!(crawl.completed_at.is_some());
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_all_workers_failing_is_an_error() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", ResponseTemplate::new(404)).await;
        mount(&server, "/", html("home")).await;

        let backend = SqliteStorage::new_in_memory().unwrap();
        backend
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_pages BEFORE INSERT ON pages
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        let mut config = create_test_config();
        config.crawler.workers = 1;

        let (status, shared, crawl_id) =
            run_with(&server, &config, backend, 1, CrawlOptions::default()).await;

        assert_eq!(status, CrawlStatus::Error);
        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(crawl_id).unwrap();
        assert_eq!(crawl.error.as_deref(), Some("All crawl workers failed"));
        let worker_errors = guard
            .get_logs(crawl_id)
            .unwrap()
            .into_iter()
            .filter(|l| l.status == LogStatus::Error && l.message.starts_with("Worker 0 failed"))
            .count();
        assert_eq!(worker_errors, 1);
    }

    #[tokio::test]
    async fn test_robots_ignored_when_not_respected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
            .expect(0)
            .mount(&server)
            .await;
        mount(&server, "/", html(r#"<a href="/a">A</a>"#)).await;
        mount(&server, "/a", html("a")).await;

        let options = CrawlOptions {
            respect_robots: false,
            ..CrawlOptions::default()
        };
        let (status, shared, crawl_id) = run(&server, 1, options).await;

        assert_eq!(status, CrawlStatus::Completed);
        let guard = storage::lock(&shared).unwrap();
        assert_eq!(guard.count_pages(crawl_id).unwrap(), 2);
    }
}
