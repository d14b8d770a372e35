//! Progress heartbeat decorator (SPEC_FULL.md §4.4): wraps a long-running
//! future with synthetic progress ticks so the status surface stays fresh
//! while an external subcommand runs silently.

use std::future::Future;

use tokio::time::{interval, Duration};

use crate::domain::ProgressSink;

const TICK_INTERVAL: Duration = Duration::from_secs(5);
const MAX_TICKS: u8 = 10;

/// Runs `future` to completion, emitting at most [`MAX_TICKS`] synthetic
/// progress reports (one per [`TICK_INTERVAL`]) advancing linearly through
/// `[start, end)` while it is still pending. Stops as soon as `future`
/// resolves; a real progress report from inside `future` is not overridden
/// by a tick since ticks and real reports share the same sink and the last
/// write wins.
pub async fn with_heartbeat<F, T>(
    progress: &dyn ProgressSink,
    message: &str,
    start: u8,
    end: u8,
    future: F,
) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(future);
    let mut ticker = interval(TICK_INTERVAL);
    ticker.tick().await; // first tick fires immediately; discard it

    let span = end.saturating_sub(start).max(1);
    let step = (span / MAX_TICKS).max(1);
    let mut ticks_emitted: u8 = 0;

    loop {
        tokio::select! {
            biased;
            result = &mut future => return result,
            _ = ticker.tick(), if ticks_emitted < MAX_TICKS => {
                ticks_emitted += 1;
                let percent = (start + step * ticks_emitted).min(end.saturating_sub(1));
                progress.report(message, percent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    struct RecordingSink(Mutex<Vec<(String, u8)>>);

    impl ProgressSink for RecordingSink {
        fn report(&self, message: &str, percent: u8) {
            self.0.lock().unwrap().push((message.to_string(), percent));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_ticks_within_band_while_pending() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        let work = async {
            tokio::time::sleep(StdDuration::from_secs(17)).await;
            "done"
        };

        let result = with_heartbeat(&sink, "Installing", 25, 38, work).await;
        assert_eq!(result, "done");

        let reports = sink.0.lock().unwrap();
        assert!(!reports.is_empty());
        for (msg, percent) in reports.iter() {
            assert_eq!(msg, "Installing");
            assert!(*percent >= 25 && *percent < 38);
        }
    }

    #[tokio::test]
    async fn resolves_immediately_without_ticking_for_fast_future() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        let result = with_heartbeat(&sink, "Quick", 10, 20, async { 42 }).await;
        assert_eq!(result, 42);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn caps_at_ten_ticks_for_very_long_future() {
        let sink = RecordingSink(Mutex::new(Vec::new()));
        let work = async {
            tokio::time::sleep(StdDuration::from_secs(120)).await;
        };
        with_heartbeat(&sink, "Building", 70, 95, work).await;
        let reports = sink.0.lock().unwrap();
        assert!(reports.len() <= MAX_TICKS as usize);
    }
}
