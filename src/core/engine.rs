//! Main migration engine
//!
//! Wires the store clients, worker pool, admission queue, producer and
//! coordinator together, runs the migration to completion and returns the
//! final tally.

use crate::config::MigrationConfig;
use crate::core::{spawn_worker, Coordinator, Producer, Tally};
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::queue::AdmissionQueue;
use crate::store::{HttpStoreClient, StoreClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// Migration run result
#[derive(Debug)]
pub struct MigrationResult {
    /// Final outcome counts
    pub tally: Tally,
    /// Total duration of the run
    pub duration: Duration,
}

impl MigrationResult {
    /// Check if the migration completed without item errors
    pub fn is_success(&self) -> bool {
        self.tally.errored == 0
    }

    /// Average completion rate in items per second
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.tally.completed() as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===");
        println!("Added:    {}", self.tally.added);
        println!("Skipped:  {}", self.tally.skipped);
        println!("Errors:   {}", self.tally.errored);
        println!(
            "Duration: {}",
            humantime::format_duration(Duration::from_millis(self.duration.as_millis() as u64))
        );
        println!("Rate:     {:.1} items/s", self.rate());
    }
}

/// Main migration engine
pub struct MigrationEngine {
    /// Configuration
    config: MigrationConfig,
    /// Worker pool size, 0 for one worker per CPU
    workers: usize,
    /// Only migrate items added at or after this unix timestamp
    since: Option<i64>,
    /// Progress reporter
    progress: Arc<ProgressReporter>,
}

impl MigrationEngine {
    /// Create a new migration engine
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            workers: 0,
            since: None,
            progress: Arc::new(ProgressReporter::disabled()),
        }
    }

    /// Set the worker pool size (0 = one worker per CPU)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Restrict the migration to items added at or after a unix timestamp
    pub fn with_since(mut self, since: Option<i64>) -> Self {
        self.since = since;
        self
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Execute the migration against the configured store endpoints
    pub async fn execute(&self) -> Result<MigrationResult> {
        let source: Arc<dyn StoreClient> = Arc::new(HttpStoreClient::new(&self.config.from)?);
        let destination: Arc<dyn StoreClient> = Arc::new(HttpStoreClient::new(&self.config.to)?);
        self.execute_with_clients(source, destination).await
    }

    /// Execute the migration against externally supplied store clients
    pub async fn execute_with_clients(
        &self,
        source: Arc<dyn StoreClient>,
        destination: Arc<dyn StoreClient>,
    ) -> Result<MigrationResult> {
        let start_time = Instant::now();
        let pool_size = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };

        info!(
            "migrating {} -> {} with {} workers",
            source.host(),
            destination.host(),
            pool_size
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Fixed worker pool, one mailbox each
        let mut handles = Vec::with_capacity(pool_size);
        let mut joins = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let (handle, join) = spawn_worker(
                id,
                Arc::clone(&source),
                Arc::clone(&destination),
                events_tx.clone(),
            );
            handles.push(handle);
            joins.push(join);
        }

        let coordinator = Coordinator::new(handles, Arc::clone(&self.progress));

        // Admission gate between the producer and the pool; dispatched items
        // are assigned synchronously
        let queue = AdmissionQueue::new(Coordinator::queue_capacity(pool_size), {
            let coordinator = coordinator.clone();
            move |item, slot| coordinator.assign(item, slot)
        });

        let producer = Producer::new(
            Arc::clone(&source),
            queue,
            events_tx,
            Arc::clone(&self.progress),
            self.since,
        );
        let producer_task = tokio::spawn(producer.run());

        let tally = coordinator.run(events_rx).await;

        producer_task.await.ok();
        futures::future::join_all(joins).await;
        self.progress.finish();

        Ok(MigrationResult {
            tally,
            duration: start_time.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreEndpoint;
    use crate::core::BATCH_SIZE;
    use crate::store::mock::MockStore;
    use crate::store::RemoteImage;

    fn test_config() -> MigrationConfig {
        MigrationConfig {
            from: StoreEndpoint {
                host: "https://source.example.com".to_string(),
                public_key: "srckey".to_string(),
                private_key: "secret".to_string(),
                user: None,
            },
            to: StoreEndpoint {
                host: "https://dest.example.com".to_string(),
                public_key: "dstkey".to_string(),
                private_key: "secret".to_string(),
                user: None,
            },
        }
    }

    fn engine(workers: usize) -> MigrationEngine {
        MigrationEngine::new(test_config()).with_workers(workers)
    }

    fn page_of(ids: &[&str]) -> Vec<RemoteImage> {
        ids.iter().map(|id| RemoteImage::new(*id, "jpg")).collect()
    }

    #[tokio::test]
    async fn test_single_worker_migrates_three_fresh_items() {
        let source = Arc::new(MockStore::new("source").with_pages(vec![page_of(&[
            "img1", "img2", "img3",
        ])]));
        let destination = Arc::new(MockStore::new("destination"));

        let result = engine(1)
            .execute_with_clients(source.clone(), destination.clone())
            .await
            .unwrap();

        assert_eq!(result.tally, Tally { added: 3, skipped: 0, errored: 0 });
        assert!(result.is_success());
        assert_eq!(
            destination.added(),
            vec!["img1".to_string(), "img2".to_string(), "img3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mixed_skip_and_error_outcomes() {
        // Item 1 already exists, item 2 fails on the copy step
        let source = Arc::new(MockStore::new("source").with_pages(vec![page_of(&[
            "img1", "img2",
        ])]));
        let destination = Arc::new(
            MockStore::new("destination")
                .with_existing("img1")
                .with_failing_copy("img2"),
        );

        let result = engine(2)
            .execute_with_clients(source, destination.clone())
            .await
            .unwrap();

        assert_eq!(result.tally, Tally { added: 0, skipped: 1, errored: 1 });
        assert!(!result.is_success());
        assert!(destination.added().is_empty());
    }

    #[tokio::test]
    async fn test_multi_page_enumeration_drains_completely() {
        // Pages of 100, 100, 47: all 247 items reach a terminal outcome
        let pages: Vec<Vec<RemoteImage>> = vec![
            (0..BATCH_SIZE).map(|i| RemoteImage::new(format!("a{}", i), "jpg")).collect(),
            (0..BATCH_SIZE).map(|i| RemoteImage::new(format!("b{}", i), "jpg")).collect(),
            (0..47).map(|i| RemoteImage::new(format!("c{}", i), "jpg")).collect(),
        ];
        let source = Arc::new(MockStore::new("source").with_pages(pages));
        let destination = Arc::new(MockStore::new("destination"));

        let result = engine(4)
            .execute_with_clients(source.clone(), destination.clone())
            .await
            .unwrap();

        assert_eq!(source.list_calls(), 3);
        assert_eq!(result.tally, Tally { added: 247, skipped: 0, errored: 0 });
        assert_eq!(destination.added().len(), 247);
    }

    #[tokio::test]
    async fn test_rerun_against_populated_destination_only_skips() {
        let ids = ["img1", "img2", "img3", "img4"];
        let source = Arc::new(MockStore::new("source").with_pages(vec![page_of(&ids)]));
        let mut destination = MockStore::new("destination");
        for id in ids {
            destination = destination.with_existing(id);
        }
        let destination = Arc::new(destination);

        let result = engine(2)
            .execute_with_clients(source, destination.clone())
            .await
            .unwrap();

        assert_eq!(result.tally, Tally { added: 0, skipped: 4, errored: 0 });
        assert!(destination.added().is_empty());
    }

    #[tokio::test]
    async fn test_enumeration_failure_yields_partial_result() {
        // Second page fails to list; the first page still migrates fully
        let pages: Vec<Vec<RemoteImage>> = vec![
            (0..BATCH_SIZE).map(|i| RemoteImage::new(format!("a{}", i), "jpg")).collect(),
            (0..BATCH_SIZE).map(|i| RemoteImage::new(format!("b{}", i), "jpg")).collect(),
        ];
        let source = Arc::new(
            MockStore::new("source")
                .with_pages(pages)
                .with_failing_list_page(1),
        );
        let destination = Arc::new(MockStore::new("destination"));

        let result = engine(3)
            .execute_with_clients(source, destination.clone())
            .await
            .unwrap();

        assert_eq!(result.tally, Tally { added: 100, skipped: 0, errored: 0 });
        assert_eq!(destination.added().len(), 100);
    }

    #[tokio::test]
    async fn test_empty_source_completes_immediately() {
        let source = Arc::new(MockStore::new("source"));
        let destination = Arc::new(MockStore::new("destination"));

        let result = engine(2)
            .execute_with_clients(source, destination)
            .await
            .unwrap();

        assert_eq!(result.tally, Tally::default());
        assert!(result.is_success());
    }

    #[test]
    fn test_result_rate_and_success() {
        let result = MigrationResult {
            tally: Tally { added: 100, skipped: 20, errored: 0 },
            duration: Duration::from_secs(60),
        };
        assert!(result.is_success());
        assert_eq!(result.rate(), 2.0);

        let failed = MigrationResult {
            tally: Tally { added: 0, skipped: 0, errored: 1 },
            duration: Duration::from_secs(1),
        };
        assert!(!failed.is_success());
    }
}
