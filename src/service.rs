//! Crawl service facade
//!
//! `CrawlService` is the surface exposed to callers (the CLI, an HTTP layer,
//! tests). It validates requests, creates crawl records, runs one
//! coordinator task per active crawl and routes control calls to it.

use crate::config::Config;
use crate::converter;
use crate::crawler::{build_http_client, Coordinator, CrawlControl, CrawlJob};
use crate::state::{CrawlOptions, CrawlStatus};
use crate::storage::{
    self, ConvertedSiteRecord, CrawlLogRecord, CrawlRecord, SavedSiteRecord, SharedStorage,
    Storage, StorageError,
};
use crate::url::normalize_url;
use crate::{FerryError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Snapshot returned by `get_crawl_status`
#[derive(Debug, Clone)]
pub struct CrawlStatusReport {
    pub crawl_id: i64,
    pub seed_url: String,
    pub status: CrawlStatus,
    pub page_count: u64,
    pub error: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub logs: Vec<CrawlLogRecord>,
}

/// A crawl with a live coordinator task
struct ActiveCrawl {
    control: Arc<CrawlControl>,
    finished: watch::Receiver<Option<CrawlStatus>>,
}

/// Entry point for starting, steering and converting crawls
pub struct CrawlService {
    config: Arc<Config>,
    storage: SharedStorage,
    client: Client,
    active: Arc<Mutex<HashMap<i64, ActiveCrawl>>>,
}

impl CrawlService {
    /// Creates a service on top of an opened storage
    pub fn new(config: Config, storage: SharedStorage) -> Result<Self> {
        let client = build_http_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            storage,
            client,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Creates a service using the database named in the configuration
    pub fn open(config: Config) -> Result<Self> {
        let backend = storage::open_storage(Path::new(&config.output.database_path))?;
        Self::new(config, storage::shared(backend))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<i64, ActiveCrawl>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_crawl(&self, crawl_id: i64) -> Result<CrawlRecord> {
        storage::lock(&self.storage)?
            .get_crawl(crawl_id)
            .map_err(|e| match e {
                StorageError::CrawlNotFound(id) => FerryError::CrawlNotFound(id),
                other => other.into(),
            })
    }

    /// Starts a crawl and returns its id
    ///
    /// The seed is normalized and the depth checked before anything is
    /// stored, so a rejected request leaves no crawl record behind. The
    /// crawl is `in_progress` by the time this returns.
    pub async fn start_crawl(
        &self,
        user_id: &str,
        seed_url: &str,
        max_depth: u32,
        options: CrawlOptions,
    ) -> Result<i64> {
        let limit = self.config.crawler.max_depth_limit;
        if max_depth > limit {
            return Err(FerryError::DepthOutOfRange {
                depth: max_depth,
                limit,
            });
        }
        let seed = normalize_url(seed_url, None)?;

        let crawl_id =
            storage::lock(&self.storage)?.create_crawl(user_id, seed.as_str(), max_depth, &options)?;
        let control = Arc::new(CrawlControl::new(
            crawl_id,
            CrawlStatus::Idle,
            self.storage.clone(),
        ));
        control.transition(CrawlStatus::InProgress, None)?;

        let job = CrawlJob {
            crawl_id,
            seed,
            max_depth,
            options,
        };
        let coordinator = Coordinator::new(
            job,
            &self.config,
            self.client.clone(),
            Arc::clone(&control),
            self.storage.clone(),
        );

        let (done_tx, done_rx) = watch::channel(None);
        self.registry().insert(
            crawl_id,
            ActiveCrawl {
                control,
                finished: done_rx,
            },
        );

        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            let status = coordinator.run().await;
            active
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&crawl_id);
            done_tx.send_replace(Some(status));
            tracing::info!("Crawl {} ended as {}", crawl_id, status);
        });

        Ok(crawl_id)
    }

    fn transition(&self, crawl_id: i64, to: CrawlStatus) -> Result<()> {
        let control = self
            .registry()
            .get(&crawl_id)
            .map(|active| Arc::clone(&active.control));

        match control {
            Some(control) => control.transition(to, None).map(|_| ()),
            None => {
                let crawl = self.load_crawl(crawl_id)?;
                // Crawls without a coordinator in this process can only be cancelled
                if to != CrawlStatus::Cancelled {
                    return Err(FerryError::InvalidTransition {
                        from: crawl.status,
                        to,
                    });
                }
                CrawlControl::new(crawl_id, crawl.status, self.storage.clone())
                    .transition(to, None)
                    .map(|_| ())
            }
        }
    }

    /// in_progress -> paused; workers stop before their next dequeue
    pub fn pause_crawl(&self, crawl_id: i64) -> Result<()> {
        self.transition(crawl_id, CrawlStatus::Paused)
    }

    /// paused -> in_progress
    pub fn resume_crawl(&self, crawl_id: i64) -> Result<()> {
        self.transition(crawl_id, CrawlStatus::InProgress)
    }

    /// Any non-terminal status -> cancelled; stored pages and assets are kept
    pub fn cancel_crawl(&self, crawl_id: i64) -> Result<()> {
        self.transition(crawl_id, CrawlStatus::Cancelled)
    }

    pub fn get_crawl_status(&self, crawl_id: i64) -> Result<CrawlStatusReport> {
        let crawl = self.load_crawl(crawl_id)?;
        let logs = storage::lock(&self.storage)?.get_logs(crawl_id)?;

        Ok(CrawlStatusReport {
            crawl_id,
            seed_url: crawl.seed_url,
            status: crawl.status,
            page_count: crawl.page_count,
            error: crawl.error,
            started_at: crawl.started_at,
            completed_at: crawl.completed_at,
            logs,
        })
    }

    pub fn list_crawls(&self, user_id: &str) -> Result<Vec<CrawlRecord>> {
        Ok(storage::lock(&self.storage)?.list_crawls(user_id)?)
    }

    /// Waits until the crawl's coordinator has finished and returns the final status
    pub async fn wait_for_crawl(&self, crawl_id: i64) -> Result<CrawlStatus> {
        let finished = self
            .registry()
            .get(&crawl_id)
            .map(|active| active.finished.clone());

        if let Some(mut finished) = finished {
            // A dropped sender means the task is gone; storage has the final word
            let _ = finished.wait_for(|status| status.is_some()).await;
        }

        Ok(self.load_crawl(crawl_id)?.status)
    }

    /// Converts a completed crawl and returns the converted site id
    pub fn convert_site(&self, crawl_id: i64) -> Result<i64> {
        let crawl = self.load_crawl(crawl_id)?;
        if crawl.status != CrawlStatus::Completed {
            return Err(FerryError::InvalidState {
                crawl_id,
                status: crawl.status,
            });
        }

        let site = converter::convert(
            &self.storage,
            crawl_id,
            &crawl.user_id,
            &self.config.converter,
        )?;
        Ok(site.id)
    }

    pub fn get_converted_site(&self, converted_site_id: i64) -> Result<ConvertedSiteRecord> {
        Ok(storage::lock(&self.storage)?.get_converted_site(converted_site_id)?)
    }

    /// Copies a completed crawl's page list into a saved site
    pub fn save_site(&self, crawl_id: i64, user_id: &str, name: &str) -> Result<i64> {
        let crawl = self.load_crawl(crawl_id)?;
        if crawl.status != CrawlStatus::Completed {
            return Err(FerryError::InvalidState {
                crawl_id,
                status: crawl.status,
            });
        }

        let id = storage::lock(&self.storage)?.save_site(crawl_id, user_id, name)?;
        tracing::info!("Saved crawl {} as '{}' ({})", crawl_id, name, id);
        Ok(id)
    }

    pub fn get_saved_site(&self, saved_site_id: i64) -> Result<SavedSiteRecord> {
        Ok(storage::lock(&self.storage)?.get_saved_site(saved_site_id)?)
    }

    /// Deletes a crawl with its pages, assets and logs
    ///
    /// A running crawl is cancelled and drained first.
    pub async fn delete_crawl(&self, crawl_id: i64) -> Result<()> {
        let crawl = self.load_crawl(crawl_id)?;
        if !crawl.status.is_terminal() {
            match self.cancel_crawl(crawl_id) {
                Ok(()) | Err(FerryError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.wait_for_crawl(crawl_id).await?;

        storage::lock(&self.storage)?.delete_crawl(crawl_id)?;
        tracing::info!("Deleted crawl {}", crawl_id);
        Ok(())
    }
}
