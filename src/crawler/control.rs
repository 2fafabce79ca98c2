//! Crawl lifecycle control
//!
//! Owns the authoritative in-memory status of a running crawl. Every
//! transition is validated, persisted, logged, and then published on a
//! watch channel that workers observe before each dequeue.

use crate::crawler::log::CrawlLogger;
use crate::state::CrawlStatus;
use crate::storage::{self, SharedStorage, Storage};
use crate::{FerryError, Result};
use std::sync::Mutex;
use tokio::sync::watch;

/// Status handle shared by the service, the coordinator and its workers
pub struct CrawlControl {
    crawl_id: i64,
    status: Mutex<CrawlStatus>,
    tx: watch::Sender<CrawlStatus>,
    storage: SharedStorage,
    logger: CrawlLogger,
}

impl CrawlControl {
    /// Wraps a crawl whose persisted status is `initial`
    pub fn new(crawl_id: i64, initial: CrawlStatus, storage: SharedStorage) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            crawl_id,
            status: Mutex::new(initial),
            tx,
            logger: CrawlLogger::new(storage.clone(), crawl_id),
            storage,
        }
    }

    pub fn crawl_id(&self) -> i64 {
        self.crawl_id
    }

    pub fn logger(&self) -> &CrawlLogger {
        &self.logger
    }

    /// Last committed status; waits for a transition that is being persisted
    pub fn status(&self) -> CrawlStatus {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receiver that sees every published status
    pub fn subscribe(&self) -> watch::Receiver<CrawlStatus> {
        self.tx.subscribe()
    }

    /// Moves the crawl to `to`
    ///
    /// Fails with `InvalidTransition` and leaves the state untouched when the
    /// move is illegal. `error` is stored on the crawl row when given.
    pub fn transition(&self, to: CrawlStatus, error: Option<&str>) -> Result<CrawlStatus> {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let from = *status;

        if !from.can_transition_to(to) {
            return Err(FerryError::InvalidTransition { from, to });
        }

        storage::lock(&self.storage)?.update_crawl_status(self.crawl_id, to, error)?;
        let message = match error {
            Some(reason) => format!("Crawl {} -> {}: {}", from, to, reason),
            None => format!("Crawl {} -> {}", from, to),
        };
        if to == CrawlStatus::Error {
            self.logger.error(&message)?;
        } else {
            self.logger.info(&message)?;
        }

        *status = to;
        self.tx.send_replace(to);
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CrawlOptions;
    use crate::storage::{LogStatus, SqliteStorage};

    fn control() -> (CrawlControl, SharedStorage) {
        let mut backend = SqliteStorage::new_in_memory().unwrap();
        let crawl_id = backend
            .create_crawl("u", "https://example.com/", 1, &CrawlOptions::default())
            .unwrap();
        let shared = storage::shared(backend);
        (
            CrawlControl::new(crawl_id, CrawlStatus::Idle, shared.clone()),
            shared,
        )
    }

    #[test]
    fn test_legal_transition_is_persisted_and_published() {
        let (control, shared) = control();
        let rx = control.subscribe();

        assert_eq!(
            control.transition(CrawlStatus::InProgress, None).unwrap(),
            CrawlStatus::Idle
        );
        assert_eq!(*rx.borrow(), CrawlStatus::InProgress);

        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(control.crawl_id()).unwrap();
        assert_eq!(crawl.status, CrawlStatus::InProgress);
        assert_eq!(guard.get_logs(crawl.id).unwrap().len(), 1);
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let (control, shared) = control();

        let err = control.transition(CrawlStatus::Paused, None).unwrap_err();
        assert!(matches!(
            err,
            FerryError::InvalidTransition {
                from: CrawlStatus::Idle,
                to: CrawlStatus::Paused
            }
        ));
        assert_eq!(control.status(), CrawlStatus::Idle);

        let guard = storage::lock(&shared).unwrap();
        assert!(guard.get_logs(control.crawl_id()).unwrap().is_empty());
    }

    #[test]
    fn test_error_transition_records_reason() {
        let (control, shared) = control();
        control.transition(CrawlStatus::InProgress, None).unwrap();
        control
            .transition(CrawlStatus::Error, Some("seed disallowed"))
            .unwrap();

        let guard = storage::lock(&shared).unwrap();
        let crawl = guard.get_crawl(control.crawl_id()).unwrap();
        assert_eq!(crawl.error.as_deref(), Some("seed disallowed"));
        let logs = guard.get_logs(crawl.id).unwrap();
        assert_eq!(logs.last().unwrap().status, LogStatus::Error);
    }
}
