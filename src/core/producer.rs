//! Source enumeration
//!
//! Lists the source store in fixed-size pages and feeds every listed item
//! into the admission queue. A page shorter than the batch size ends the
//! enumeration; a listing failure ends it early with whatever was already
//! enqueued. Either way the coordinator is told exactly once that no more
//! work will arrive.

use crate::core::{CoordinatorEvent, WorkItem};
use crate::error::FerryError;
use crate::progress::ProgressReporter;
use crate::queue::AdmissionQueue;
use crate::store::StoreClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Number of items requested per listing page
pub const BATCH_SIZE: usize = 100;

/// Paginated enumerator over the source store
pub struct Producer {
    source: Arc<dyn StoreClient>,
    queue: Arc<AdmissionQueue<WorkItem>>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    progress: Arc<ProgressReporter>,
    since: Option<i64>,
}

impl Producer {
    /// Create a producer feeding the given queue
    pub fn new(
        source: Arc<dyn StoreClient>,
        queue: Arc<AdmissionQueue<WorkItem>>,
        events: mpsc::UnboundedSender<CoordinatorEvent>,
        progress: Arc<ProgressReporter>,
        since: Option<i64>,
    ) -> Self {
        Self {
            source,
            queue,
            events,
            progress,
            since,
        }
    }

    /// Enumerate every source page and signal producer-done once
    pub async fn run(self) {
        let mut page: u32 = 0;

        loop {
            debug!("fetching image batch, page {}", page);

            let images = match self.source.list_images(page, BATCH_SIZE, self.since).await {
                Ok(images) => images,
                Err(err) => {
                    // Fatal to further enumeration, no retry. Items already
                    // enqueued still drain to a partial result.
                    let err = FerryError::enumeration(page, err.to_string());
                    error!("{}", err);
                    break;
                }
            };

            let fetched = images.len();
            for image in images {
                self.progress.add_known(1);
                self.queue
                    .enqueue(WorkItem::new(image.identifier, image.extension));
            }

            if fetched == BATCH_SIZE {
                page += 1;
            } else {
                info!("all image ids fetched, waiting for queue to finish");
                break;
            }
        }

        let _ = self.events.send(CoordinatorEvent::ProducerDone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockStore;
    use crate::store::RemoteImage;
    use std::sync::Mutex;

    fn page_of(start: usize, count: usize) -> Vec<RemoteImage> {
        (start..start + count)
            .map(|i| RemoteImage::new(format!("img{}", i), "jpg"))
            .collect()
    }

    /// Queue that admits and releases everything, recording the items
    fn recording_queue() -> (Arc<AdmissionQueue<WorkItem>>, Arc<Mutex<Vec<WorkItem>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let queue = AdmissionQueue::new(BATCH_SIZE, {
            let seen = Arc::clone(&seen);
            move |item: WorkItem, slot| {
                seen.lock().unwrap().push(item);
                slot.release();
            }
        });
        (queue, seen)
    }

    fn producer_parts() -> (
        mpsc::UnboundedSender<CoordinatorEvent>,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
        Arc<ProgressReporter>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, rx, Arc::new(ProgressReporter::disabled()))
    }

    #[tokio::test]
    async fn test_full_pages_keep_paging_until_a_short_page() {
        // Pages of 100, 100, 47: enumeration stops after the third page
        let source = Arc::new(
            MockStore::new("source").with_pages(vec![
                page_of(0, BATCH_SIZE),
                page_of(BATCH_SIZE, BATCH_SIZE),
                page_of(2 * BATCH_SIZE, 47),
            ]),
        );
        let (queue, seen) = recording_queue();
        let (events_tx, mut events_rx, progress) = producer_parts();

        Producer::new(source.clone(), queue, events_tx, Arc::clone(&progress), None)
            .run()
            .await;

        assert_eq!(source.list_calls(), 3);
        assert_eq!(seen.lock().unwrap().len(), 247);
        assert_eq!(progress.summary().total_known, 247);

        // Producer-done fires exactly once, after every item was enqueued
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CoordinatorEvent::ProducerDone)
        ));
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_short_first_page_ends_after_one_call() {
        let source = Arc::new(MockStore::new("source").with_pages(vec![page_of(0, 5)]));
        let (queue, seen) = recording_queue();
        let (events_tx, mut events_rx, progress) = producer_parts();

        Producer::new(source.clone(), queue, events_tx, progress, None)
            .run()
            .await;

        assert_eq!(source.list_calls(), 1);
        assert_eq!(seen.lock().unwrap().len(), 5);
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CoordinatorEvent::ProducerDone)
        ));
    }

    #[tokio::test]
    async fn test_empty_source_still_signals_done() {
        let source = Arc::new(MockStore::new("source"));
        let (queue, seen) = recording_queue();
        let (events_tx, mut events_rx, progress) = producer_parts();

        Producer::new(source.clone(), queue, events_tx, progress, None)
            .run()
            .await;

        assert_eq!(source.list_calls(), 1);
        assert!(seen.lock().unwrap().is_empty());
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CoordinatorEvent::ProducerDone)
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_stops_paging_but_signals_done() {
        // First page lists fine, second fails: the 100 enqueued items stand
        // and producer-done still fires so the run can drain
        let source = Arc::new(
            MockStore::new("source")
                .with_pages(vec![page_of(0, BATCH_SIZE), page_of(BATCH_SIZE, BATCH_SIZE)])
                .with_failing_list_page(1),
        );
        let (queue, seen) = recording_queue();
        let (events_tx, mut events_rx, progress) = producer_parts();

        Producer::new(source.clone(), queue, events_tx, progress, None)
            .run()
            .await;

        assert_eq!(source.list_calls(), 2);
        assert_eq!(seen.lock().unwrap().len(), 100);
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CoordinatorEvent::ProducerDone)
        ));
        assert!(events_rx.try_recv().is_err());
    }
}
