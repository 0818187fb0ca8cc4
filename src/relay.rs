//! Sequential media publish loop.
//!
//! The loop is written against [`MediaPublisher`] so its failure policy
//! (skip the item, keep the batch going) can be exercised without a
//! live Telegram connection.

use crate::archive::MediaItem;
use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

/// Destination for classified media items plus the progress feedback
/// shown while the batch runs.
#[async_trait]
pub trait MediaPublisher {
    /// Reports that item `position` of `total` is about to be posted.
    ///
    /// Failures to report progress must be absorbed by the
    /// implementation; progress is cosmetic and never aborts a batch.
    async fn progress(&self, position: usize, total: usize);

    /// Publishes one media item to the destination channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the item; the caller
    /// skips it and continues.
    async fn publish(&self, item: &MediaItem) -> Result<()>;
}

/// Outcome of one relay batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Number of media items found in the archive.
    pub total: usize,
    /// Number actually accepted by the platform.
    pub sent: usize,
}

/// Publishes `items` one by one in order.
///
/// A failed item is logged with its file name and skipped; the batch
/// never aborts and is never retried. The returned report carries the
/// sent/total counts for the terminal status summary.
pub async fn publish_all<P>(publisher: &P, items: &[MediaItem]) -> RelayReport
where
    P: MediaPublisher + ?Sized,
{
    let total = items.len();
    let mut sent = 0;

    for (idx, item) in items.iter().enumerate() {
        publisher.progress(idx + 1, total).await;
        match publisher.publish(item).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to send {}: {e:#}", item.file_name),
        }
    }

    RelayReport { total, sent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaKind;
    use anyhow::anyhow;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records every call and fails `publish` for the listed positions
    /// (1-based).
    struct RecordingPublisher {
        fail_at: Vec<usize>,
        progress_calls: Mutex<Vec<(usize, usize)>>,
        published: Mutex<Vec<String>>,
        attempts: Mutex<usize>,
    }

    impl RecordingPublisher {
        fn new(fail_at: Vec<usize>) -> Self {
            Self {
                fail_at,
                progress_calls: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
                attempts: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaPublisher for RecordingPublisher {
        async fn progress(&self, position: usize, total: usize) {
            if let Ok(mut calls) = self.progress_calls.lock() {
                calls.push((position, total));
            }
        }

        async fn publish(&self, item: &MediaItem) -> Result<()> {
            let attempt = {
                let mut attempts = self.attempts.lock().map_err(|_| anyhow!("poisoned"))?;
                *attempts += 1;
                *attempts
            };
            if self.fail_at.contains(&attempt) {
                return Err(anyhow!("simulated platform rejection"));
            }
            self.published
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(item.file_name.clone());
            Ok(())
        }
    }

    fn item(name: &str, kind: MediaKind) -> MediaItem {
        MediaItem {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            kind,
        }
    }

    fn three_items() -> Vec<MediaItem> {
        vec![
            item("a.jpg", MediaKind::Photo),
            item("b.mp4", MediaKind::Video),
            item("d.png", MediaKind::Photo),
        ]
    }

    #[tokio::test]
    async fn test_all_items_published_in_order() -> Result<()> {
        let publisher = RecordingPublisher::new(Vec::new());
        let report = publish_all(&publisher, &three_items()).await;

        assert_eq!(report, RelayReport { total: 3, sent: 3 });
        let published = publisher.published.lock().map_err(|_| anyhow!("poisoned"))?;
        assert_eq!(*published, vec!["a.jpg", "b.mp4", "d.png"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_item_is_skipped_not_fatal() -> Result<()> {
        // Second publish call rejects; the third must still be attempted.
        let publisher = RecordingPublisher::new(vec![2]);
        let report = publish_all(&publisher, &three_items()).await;

        assert_eq!(report, RelayReport { total: 3, sent: 2 });
        let attempts = *publisher.attempts.lock().map_err(|_| anyhow!("poisoned"))?;
        assert_eq!(attempts, 3);
        let published = publisher.published.lock().map_err(|_| anyhow!("poisoned"))?;
        assert_eq!(*published, vec!["a.jpg", "d.png"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_reported_per_item() -> Result<()> {
        let publisher = RecordingPublisher::new(vec![1, 2, 3]);
        let report = publish_all(&publisher, &three_items()).await;

        // Progress fires for every item even when each publish fails.
        assert_eq!(report, RelayReport { total: 3, sent: 0 });
        let calls = publisher
            .progress_calls
            .lock()
            .map_err(|_| anyhow!("poisoned"))?;
        assert_eq!(*calls, vec![(1, 3), (2, 3), (3, 3)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_batch_reports_zero() {
        let publisher = RecordingPublisher::new(Vec::new());
        let report = publish_all(&publisher, &[]).await;
        assert_eq!(report, RelayReport { total: 0, sent: 0 });
    }
}
