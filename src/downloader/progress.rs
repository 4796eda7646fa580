use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Callback receiving the overall percent for one session, called from the
/// aggregator's task. Callers marshal to their own thread if they need to.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Per-segment fractional progress for one session.
///
/// Each slot is written only by the fetcher owning that segment and read by
/// the aggregator; the vector sits behind one mutex that is never held
/// across an await.
#[derive(Clone)]
pub struct SegmentProgress {
    slots: Arc<Mutex<Vec<f64>>>,
}

impl SegmentProgress {
    pub fn new(segment_count: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![0.0; segment_count])),
        }
    }

    pub fn set(&self, index: usize, percent: f64) {
        self.slots.lock().unwrap()[index] = percent;
    }

    /// Mean of all segment percents, capped at 100.
    pub fn overall(&self) -> u8 {
        let slots = self.slots.lock().unwrap();
        if slots.is_empty() {
            return 0;
        }
        let mean = slots.iter().sum::<f64>() / slots.len() as f64;
        mean.min(100.0) as u8
    }
}

/// Starts the aggregator: every 500ms the mean segment progress is forwarded
/// to the sink, independent of how fast individual fetchers move. The
/// returned handle is aborted once all fetchers have finished.
pub fn start_aggregator(table: SegmentProgress, sink: ProgressFn) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        loop {
            interval.tick().await;
            sink(table.overall());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_mean_of_slots() {
        let table = SegmentProgress::new(4);
        table.set(0, 100.0);
        table.set(1, 50.0);
        table.set(2, 30.0);
        table.set(3, 20.0);

        assert_eq!(table.overall(), 50);
    }

    #[test]
    fn test_overall_empty_table() {
        assert_eq!(SegmentProgress::new(0).overall(), 0);
    }

    #[test]
    fn test_overall_capped_at_100() {
        // A server may hand back a few more bytes than the requested range;
        // the reported percent must still top out at 100
        let table = SegmentProgress::new(2);
        table.set(0, 104.0);
        table.set(1, 100.0);

        assert_eq!(table.overall(), 100);
    }

    #[tokio::test]
    async fn test_aggregator_reports_on_tick() {
        let table = SegmentProgress::new(2);
        table.set(0, 50.0);
        table.set(1, 100.0);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink_reports = Arc::clone(&reports);
        let sink: ProgressFn = Arc::new(move |percent| {
            sink_reports.lock().unwrap().push(percent);
        });

        let handle = start_aggregator(table, sink);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        handle.abort();

        let reports = reports.lock().unwrap();
        assert!(reports.len() >= 2);
        assert!(reports.iter().all(|&percent| percent == 75));
    }
}
