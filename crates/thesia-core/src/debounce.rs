//! Trailing-edge debounce as a cancellable scheduled task.
//!
//! [`Debouncer::arm`] schedules the action `delay` from now and cancels whatever
//! was scheduled before, so a burst of calls produces one run after the burst
//! goes quiet. Runs never overlap: a run that comes due while another is still
//! in flight waits for it. Timing uses `tokio::time`, which makes the behaviour
//! testable on Tokio's paused clock.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::errors::StoreError;

pub type DebouncedAction = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Armed {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Timer {
    generation: u64,
    armed: Option<Armed>,
    fired: u64,
}

pub struct Debouncer {
    delay: Duration,
    action: DebouncedAction,
    runtime: Handle,
    timer: Arc<Mutex<Timer>>,
    /// Runs that have left the timer but not finished yet.
    running: Arc<watch::Sender<usize>>,
    serial: Arc<AsyncMutex<()>>,
}

/// Counts a run as in flight until dropped, including when its task is aborted.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn start(running: &Arc<watch::Sender<usize>>) -> Self {
        running.send_modify(|count| *count += 1);
        Self(running.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl Debouncer {
    /// Must be called from within a Tokio runtime; the timer tasks run on it.
    pub fn new(delay: Duration, action: DebouncedAction) -> Result<Self, StoreError> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        Ok(Self::with_handle(runtime, delay, action))
    }

    pub fn with_handle(runtime: Handle, delay: Duration, action: DebouncedAction) -> Self {
        Self {
            delay,
            action,
            runtime,
            timer: Arc::new(Mutex::new(Timer::default())),
            running: Arc::new(watch::channel(0).0),
            serial: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)starts the timer. A pending run is cancelled, never stacked.
    pub fn arm(&self) {
        let (generation, token) = {
            let mut timer = lock(&self.timer);
            if let Some(previous) = timer.armed.take() {
                previous.token.cancel();
            }
            timer.generation += 1;
            let token = CancellationToken::new();
            timer.armed = Some(Armed {
                generation: timer.generation,
                token: token.clone(),
            });
            (timer.generation, token)
        };

        let timer = self.timer.clone();
        let action = self.action.clone();
        let running = self.running.clone();
        let serial = self.serial.clone();
        let delay = self.delay;

        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let _in_flight = {
                let mut timer = lock(&timer);
                match &timer.armed {
                    Some(armed) if armed.generation == generation => {
                        timer.armed = None;
                        timer.fired += 1;
                        InFlight::start(&running)
                    }
                    // Re-armed between waking up and taking the lock.
                    _ => return,
                }
            };

            let _serial = serial.lock().await;
            action().await;
        });
    }

    /// Cancels a pending run. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.timer).armed.take() {
            Some(armed) => {
                armed.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.timer).armed.is_some()
    }

    /// How many times the timer has elapsed and run the action.
    pub fn fired(&self) -> u64 {
        lock(&self.timer).fired
    }

    /// Whether a run has left the timer and not finished yet.
    pub fn is_running(&self) -> bool {
        *self.running.borrow() > 0
    }

    /// Runs a pending action immediately instead of waiting for the timer, and
    /// waits for any run already in flight. Returns whether there was either.
    pub async fn flush(&self) -> bool {
        let pending = self.cancel();
        let in_flight = self.is_running();

        if pending {
            let _serial = self.serial.lock().await;
            (self.action)().await;
        }

        let mut running = self.running.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = running.wait_for(|count| *count == 0).await;

        pending || in_flight
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(timer: &Mutex<Timer>) -> MutexGuard<'_, Timer> {
    timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_action() -> (DebouncedAction, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let action: DebouncedAction = Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (action, runs)
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_produces_single_run() {
        let (action, runs) = counting_action();
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        for _ in 0..5 {
            debouncer.arm();
            settle(Duration::from_millis(300)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_armed());

        settle(Duration::from_millis(2000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.fired(), 1);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_window() {
        let (action, runs) = counting_action();
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        debouncer.arm();
        settle(Duration::from_millis(1900)).await;
        debouncer.arm();
        settle(Duration::from_millis(1900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        settle(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn arming_after_a_run_schedules_another() {
        let (action, runs) = counting_action();
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        debouncer.arm();
        settle(Duration::from_millis(2500)).await;
        debouncer.arm();
        settle(Duration::from_millis(2500)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_run() {
        let (action, runs) = counting_action();
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        debouncer.arm();
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        settle(Duration::from_millis(3000)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_pending_action_now() {
        let (action, runs) = counting_action();
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        assert!(!debouncer.flush().await);
        debouncer.arm();
        assert!(debouncer.flush().await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        settle(Duration::from_millis(3000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    fn slow_action(duration: Duration) -> (DebouncedAction, Arc<AtomicUsize>) {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let action: DebouncedAction = Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                tokio::time::sleep(duration).await;
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (action, finished)
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_a_run_in_flight() {
        let (action, finished) = slow_action(Duration::from_millis(500));
        let debouncer = Debouncer::new(Duration::from_millis(2000), action).unwrap();

        debouncer.arm();
        settle(Duration::from_millis(2100)).await;
        assert!(!debouncer.is_armed());
        assert!(debouncer.is_running());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        assert!(debouncer.flush().await);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_running());
        assert!(!debouncer.flush().await);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_do_not_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicUsize::new(0));
        let action: DebouncedAction = {
            let active = active.clone();
            let overlapped = overlapped.clone();
            Arc::new(move || {
                let active = active.clone();
                let overlapped = overlapped.clone();
                Box::pin(async move {
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlapped.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(3000)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
        };
        let debouncer = Debouncer::new(Duration::from_millis(1000), action).unwrap();

        debouncer.arm();
        settle(Duration::from_millis(1100)).await;
        debouncer.arm();
        settle(Duration::from_millis(1100)).await;
        assert!(debouncer.flush().await);

        assert_eq!(debouncer.fired(), 2);
        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn requires_a_runtime() {
        let (action, _) = counting_action();
        assert!(matches!(
            Debouncer::new(Duration::from_millis(10), action),
            Err(StoreError::NoRuntime)
        ));
    }
}
