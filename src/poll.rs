//! Change-polling loop - periodic probes with change detection
//!
//! A poll session samples page state on a fixed period and reports a value
//! only when it differs from the last one reported. Each tick spawns its
//! probe and goes back to waiting, so a slow probe never delays the next
//! tick and probes may overlap. Whichever probe completes is compared
//! against the last emitted value; completion order is not enforced.
//!
//! Emission and [`PollHandle::stop`] take the same lock, and emission
//! re-checks the cancellation token under it: once `stop` returns, no probe
//! still in flight can report anything.

use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

/// What a session samples; decides which samples are worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Current text selection
    Selection,
    /// Readable text under the pointer; single characters are ignored
    Cursor,
}

impl PollMode {
    fn accepts(&self, text: &str) -> bool {
        match self {
            PollMode::Selection => !text.is_empty(),
            PollMode::Cursor => text.chars().count() > 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollMode::Selection => "selection",
            PollMode::Cursor => "cursor",
        }
    }
}

/// One probe: `Ok(None)` means nothing new to report
pub type SampleFuture = BoxFuture<'static, Result<Option<String>>>;

type OnChange = Box<dyn FnMut(String) + Send>;

struct Emitter {
    last_emitted: String,
    on_change: OnChange,
}

/// Handle to a running poll session. Dropping it stops the session.
pub struct PollHandle {
    mode: PollMode,
    token: CancellationToken,
    emitter: Arc<Mutex<Emitter>>,
}

/// Start sampling every `interval`; the first sample is taken one interval
/// after the call. Must be called within a tokio runtime.
pub fn start_polling<S, F>(mode: PollMode, interval: Duration, sample: S, on_change: F) -> PollHandle
where
    S: Fn() -> SampleFuture + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    let token = CancellationToken::new();
    let emitter = Arc::new(Mutex::new(Emitter {
        last_emitted: String::new(),
        on_change: Box::new(on_change),
    }));

    tokio::spawn(poll_loop(
        mode,
        interval,
        sample,
        Arc::clone(&emitter),
        token.clone(),
    ));
    log_debug!("{} polling started every {:?}", mode.label(), interval);

    PollHandle {
        mode,
        token,
        emitter,
    }
}

async fn poll_loop<S>(
    mode: PollMode,
    interval: Duration,
    sample: S,
    emitter: Arc<Mutex<Emitter>>,
    token: CancellationToken,
) where
    S: Fn() -> SampleFuture + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let probe = sample();
                let emitter = Arc::clone(&emitter);
                let token = token.clone();
                tokio::spawn(async move {
                    match probe.await {
                        Ok(Some(text)) => emit(mode, &emitter, &token, text),
                        Ok(None) => {}
                        Err(e) if e.is_transient() => {
                            log_debug!("{} probe skipped: {}", mode.label(), e)
                        }
                        Err(e) => log_warn!("{} probe failed, skipping tick: {}", mode.label(), e),
                    }
                });
            }
        }
    }
    log_debug!("{} polling stopped", mode.label());
}

fn emit(mode: PollMode, emitter: &Mutex<Emitter>, token: &CancellationToken, text: String) {
    let mut emitter = lock(emitter);
    if token.is_cancelled() || !mode.accepts(&text) || text == emitter.last_emitted {
        return;
    }
    emitter.last_emitted = text.clone();
    (emitter.on_change)(text);
}

fn lock(emitter: &Mutex<Emitter>) -> MutexGuard<'_, Emitter> {
    // A panicking callback must not wedge stop()
    emitter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PollHandle {
    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn last_emitted(&self) -> String {
        lock(&self.emitter).last_emitted.clone()
    }

    /// Stop the session and forget the last emitted value. Idempotent.
    pub fn stop(&self) {
        let mut emitter = lock(&self.emitter);
        self.token.cancel();
        emitter.last_emitted.clear();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures_util::FutureExt;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    const TICK: Duration = Duration::from_millis(100);

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(String) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |text| sink.lock().unwrap().push(text))
    }

    fn sequence(samples: &[&str]) -> impl Fn() -> SampleFuture + Send + 'static {
        let queue: Arc<Mutex<VecDeque<String>>> =
            Arc::new(Mutex::new(samples.iter().map(|s| s.to_string()).collect()));
        move || {
            let next = queue.lock().unwrap().pop_front();
            async move { Ok(next) }.boxed()
        }
    }

    async fn ticks(n: u32) {
        tokio::time::sleep(TICK * n + Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_only_changes() {
        let (seen, on_change) = recorder();
        let _handle = start_polling(PollMode::Selection, TICK, sequence(&["", "A", "A", "B"]), on_change);
        ticks(6).await;
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sample_before_first_interval() {
        let (seen, on_change) = recorder();
        let _handle = start_polling(PollMode::Selection, TICK, sequence(&["A"]), on_change);
        tokio::time::sleep(TICK / 2).await;
        assert!(seen.lock().unwrap().is_empty());
        ticks(1).await;
        assert_eq!(*seen.lock().unwrap(), vec!["A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_mode_ignores_single_chars() {
        let (seen, on_change) = recorder();
        let _handle = start_polling(PollMode::Cursor, TICK, sequence(&["x", "ok", "ok", "y"]), on_change);
        ticks(5).await;
        assert_eq!(*seen.lock().unwrap(), vec!["ok"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_skip_tick() {
        let (seen, on_change) = recorder();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let sample = move || {
            let mut n = counter.lock().unwrap();
            *n += 1;
            let result = if *n == 1 {
                Err(Error::ProbeFailed("no result".into()))
            } else {
                Ok(Some("after error".to_string()))
            };
            async move { result }.boxed()
        };
        let _handle = start_polling(PollMode::Selection, TICK, sample, on_change);
        ticks(3).await;
        assert_eq!(*seen.lock().unwrap(), vec!["after error"]);
        assert!(*calls.lock().unwrap() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_probe() {
        let (seen, on_change) = recorder();
        let (release, pending) = oneshot::channel::<String>();
        let pending = Arc::new(Mutex::new(Some(pending)));
        let sample = move || match pending.lock().unwrap().take() {
            Some(rx) => async move { Ok(rx.await.ok()) }.boxed(),
            None => async { Ok(None) }.boxed(),
        };

        let handle = start_polling(PollMode::Selection, TICK, sample, on_change);
        ticks(1).await;
        handle.stop();
        assert!(!handle.is_active());

        release.send("late result".to_string()).unwrap();
        ticks(3).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_clears_last() {
        let (seen, on_change) = recorder();
        let handle = start_polling(PollMode::Selection, TICK, sequence(&["A"]), on_change);
        ticks(2).await;
        assert_eq!(handle.last_emitted(), "A");

        handle.stop();
        handle.stop();
        assert_eq!(handle.last_emitted(), "");
        ticks(3).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_repeats_same_text() {
        let (seen, on_change) = recorder();
        let first = start_polling(PollMode::Selection, TICK, sequence(&["same"]), on_change);
        ticks(2).await;
        first.stop();

        let sink = Arc::clone(&seen);
        let _second = start_polling(PollMode::Selection, TICK, sequence(&["same"]), move |t| {
            sink.lock().unwrap().push(t)
        });
        ticks(2).await;
        assert_eq!(*seen.lock().unwrap(), vec!["same", "same"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_probes_emit_in_completion_order() {
        let (seen, on_change) = recorder();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        // First probe is slow, second is fast: the later tick lands first
        let sample = move || {
            let mut n = counter.lock().unwrap();
            *n += 1;
            match *n {
                1 => async {
                    tokio::time::sleep(TICK * 3).await;
                    Ok(Some("slow".to_string()))
                }
                .boxed(),
                2 => async { Ok(Some("fast".to_string())) }.boxed(),
                _ => async { Ok(None) }.boxed(),
            }
        };
        let _handle = start_polling(PollMode::Selection, TICK, sample, on_change);
        ticks(6).await;
        assert_eq!(*seen.lock().unwrap(), vec!["fast", "slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_session() {
        let (seen, on_change) = recorder();
        let handle = start_polling(PollMode::Selection, TICK, sequence(&["", "A"]), on_change);
        ticks(1).await;
        drop(handle);
        ticks(3).await;
        assert!(seen.lock().unwrap().is_empty());
    }
}
