use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::browser::FrameQuery;

/// Background task that re-screenshots the page on a fixed interval to
/// surface visual changes to an observer.
///
/// Must be suspended for the duration of overlay handling: screenshots taken
/// mid-click are misleading, and concurrent capture races DOM click
/// evaluation on the same page. Suspension is cooperative — the task is
/// signalled and awaited to completion before the caller proceeds, so no
/// screenshot is ever emitted describing a half-clicked state.
pub struct ScreenshotWatchdog {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScreenshotWatchdog {
    pub fn spawn(
        frames: Arc<dyn FrameQuery>,
        interval: Duration,
        sink: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        match frames.screenshot().await {
                            Ok(bytes) => {
                                if sink.send(bytes).await.is_err() {
                                    // Observer went away
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Watchdog screenshot failed: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Self { token, handle }
    }

    /// Signal the task and wait for it to finish
    pub async fn suspend(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
