//! Background save scheduling.
//!
//! Two timers drive persistence: a debounce timer re-armed on every edit,
//! and a periodic safety-net timer for sessions that never pause long
//! enough for the debounce to fire. Both funnel into a single
//! `run_if_idle` entry point so the no-overlapping-saves invariant is
//! enforced in one place.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::task::JoinHandle;

/// The save pipeline the scheduler drives.
///
/// Implemented by the controller's shared state: `save` captures the form
/// as of its own call time, pushes it to the remote gateway, and clears
/// the dirty flag only on success.
#[async_trait]
pub trait SaveSink: Send + Sync {
    fn has_unsaved(&self) -> bool;
    async fn save(&self) -> bool;
}

/// A re-armable one-shot timer slot.
///
/// Arming aborts whatever was previously armed; the armed future is only
/// the wait, so an abort never cancels a save already in flight.
struct ScheduledTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    fn arm<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.handle.lock().unwrap();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(fut));
    }

    fn cancel(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

struct SchedulerShared {
    sink: Arc<dyn SaveSink>,
    is_saving: AtomicBool,
}

impl SchedulerShared {
    /// The single save entry point shared by both timers and explicit
    /// saves. Skipped entirely (not queued) when a save is in flight.
    async fn run_if_idle(&self) -> bool {
        if self
            .is_saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Save already in flight; skipping");
            return false;
        }
        let result = self.sink.save().await;
        self.is_saving.store(false, Ordering::SeqCst);
        result
    }

    /// Timer path: only bother when there are unsaved changes.
    fn spawn_save_if_dirty(self: &Arc<Self>) {
        if !self.sink.has_unsaved() {
            return;
        }
        let shared = Arc::clone(self);
        // Detached so timer teardown never aborts a save mid-flight;
        // a discarded result is the documented teardown behavior.
        tokio::spawn(async move {
            shared.run_if_idle().await;
        });
    }
}

pub struct AutoSaveScheduler {
    shared: Arc<SchedulerShared>,
    debounce: ScheduledTask,
    periodic: ScheduledTask,
    debounce_delay: Duration,
    interval: Duration,
}

impl AutoSaveScheduler {
    pub fn new(sink: Arc<dyn SaveSink>, debounce_delay: Duration, interval: Duration) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                sink,
                is_saving: AtomicBool::new(false),
            }),
            debounce: ScheduledTask::new(),
            periodic: ScheduledTask::new(),
            debounce_delay,
            interval,
        }
    }

    /// Start the periodic safety-net timer.
    pub fn start(&self) {
        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        self.periodic.arm(async move {
            let mut ticker = tokio::time::interval(period);
            // interval fires immediately; consume the first tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                shared.spawn_save_if_dirty();
            }
        });
    }

    /// (Re)arm the debounce timer. Called on every edit.
    pub fn note_edit(&self) {
        let shared = Arc::clone(&self.shared);
        let delay = self.debounce_delay;
        self.debounce.arm(async move {
            tokio::time::sleep(delay).await;
            shared.spawn_save_if_dirty();
        });
    }

    /// Explicit, immediate save. Shares the in-flight guard with the
    /// timers; returns false when skipped or when the save fails.
    pub async fn save_now(&self) -> bool {
        self.shared.run_if_idle().await
    }

    pub fn is_saving(&self) -> bool {
        self.shared.is_saving.load(Ordering::SeqCst)
    }

    /// Tear down both timers. A save already in flight is allowed to
    /// finish; its result is discarded.
    pub fn shutdown(&self) {
        self.debounce.cancel();
        self.periodic.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSink {
        dirty: AtomicBool,
        saves: AtomicUsize,
        save_duration: Duration,
        succeed: bool,
    }

    impl CountingSink {
        fn new(save_duration: Duration, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                dirty: AtomicBool::new(true),
                saves: AtomicUsize::new(0),
                save_duration,
                succeed,
            })
        }

        fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SaveSink for CountingSink {
        fn has_unsaved(&self) -> bool {
            self.dirty.load(Ordering::SeqCst)
        }

        async fn save(&self) -> bool {
            self.saves.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.save_duration).await;
            if self.succeed {
                self.dirty.store(false, Ordering::SeqCst);
            }
            self.succeed
        }
    }

    // Newly armed timer tasks must be polled once so their deadlines are
    // registered before the paused clock is advanced.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_after_delay_not_before() {
        let sink = CountingSink::new(Duration::ZERO, true);
        let scheduler = AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(30),
        );

        scheduler.note_edit();
        settle().await;
        tokio::time::advance(Duration::from_millis(2_900)).await;
        settle().await;
        assert_eq!(sink.save_count(), 0);

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(sink.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_rearms_debounce() {
        let sink = CountingSink::new(Duration::ZERO, true);
        let scheduler = AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(300),
        );

        scheduler.note_edit();
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        scheduler.note_edit();
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        // 4s elapsed but never 3s of inactivity
        assert_eq!(sink.save_count(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(sink.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_saves_dirty_state() {
        let sink = CountingSink::new(Duration::ZERO, false);
        let scheduler = AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(30),
        );
        scheduler.start();
        settle().await;

        // Failed saves leave the dirty flag set, so every tick retries
        tokio::time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(sink.save_count(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(sink.save_count(), 2);

        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_skips_clean_state() {
        let sink = CountingSink::new(Duration::ZERO, true);
        sink.dirty.store(false, Ordering::SeqCst);
        let scheduler = AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(30),
        );
        scheduler.start();
        settle().await;

        tokio::time::advance(Duration::from_secs(95)).await;
        settle().await;
        assert_eq!(sink.save_count(), 0);

        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_overlapping_saves() {
        // A slow save; a second explicit save during it must be skipped
        let sink = CountingSink::new(Duration::from_secs(5), true);
        let scheduler = Arc::new(AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(30),
        ));

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.save_now().await })
        };
        settle().await;
        assert!(scheduler.is_saving());

        // Second attempt while the first is in flight: skipped, not queued
        assert!(!scheduler.save_now().await);
        assert_eq!(sink.save_count(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(first.await.unwrap());
        assert!(!scheduler.is_saving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let sink = CountingSink::new(Duration::ZERO, true);
        let scheduler = AutoSaveScheduler::new(
            sink.clone(),
            Duration::from_secs(3),
            Duration::from_secs(30),
        );
        scheduler.start();
        scheduler.note_edit();
        settle().await;
        scheduler.shutdown();

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(sink.save_count(), 0);
    }
}
