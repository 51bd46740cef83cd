//! Fixed-interval periodic workers with cooperative shutdown.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns a set of periodic workers sharing one shutdown signal.
///
/// Each worker runs its task, then sleeps the full interval, so a worker
/// never overlaps with itself. Different workers run independently.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            workers: Vec::new(),
        }
    }

    /// Receiver that flips to `true` when shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a worker running `task` immediately and then every `interval`.
    pub fn every<F, Fut>(&mut self, name: &'static str, interval: Duration, task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = spawn_periodic(name, interval, self.shutdown_signal(), task);
        self.workers.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signal every worker to stop and wait up to `grace` for each.
    /// Workers still busy after that are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);

        for (name, mut handle) in self.workers {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => debug!(worker = name, "Worker stopped"),
                Err(_) => {
                    warn!(worker = name, "Worker did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

/// Run `task` until `shutdown` turns true, sleeping `interval` after each run.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(worker = name, interval_secs = interval.as_secs(), "Starting worker");
        loop {
            if *shutdown.borrow() {
                break;
            }

            task().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also means stop.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(worker = name, "Worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    /// Let spawned tasks run up to their next timer.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.every("test", Duration::from_secs(60), counting(&counter));

        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(counter.load(Ordering::SeqCst) >= 3);

        scheduler.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_task_never_overlaps_itself() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut scheduler = Scheduler::new();
        {
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            let runs = Arc::clone(&runs);
            scheduler.every("slow", Duration::from_secs(10), move || {
                let running = Arc::clone(&running);
                let max_seen = Arc::clone(&max_seen);
                let runs = Arc::clone(&runs);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        // Each cycle takes 30s of work plus a 10s sleep.
        assert_eq!(runs.load(Ordering::SeqCst), 5);

        scheduler.shutdown(Duration::from_secs(60)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.every("a", Duration::from_secs(3600), counting(&counter));
        scheduler.every("b", Duration::from_secs(3600), counting(&counter));
        assert_eq!(scheduler.len(), 2);

        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let started = tokio::time::Instant::now();
        scheduler.shutdown(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_worker() {
        let mut scheduler = Scheduler::new();
        scheduler.every("stuck", Duration::from_secs(1), || async {
            std::future::pending::<()>().await;
        });
        settle().await;

        let started = tokio::time::Instant::now();
        scheduler.shutdown(Duration::from_secs(2)).await;
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_already_set_skips_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(true);
        let handle = spawn_periodic("never", Duration::from_secs(1), rx, counting(&counter));

        handle.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        drop(tx);
    }
}
