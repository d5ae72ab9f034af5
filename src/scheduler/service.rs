use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::scheduler::error::{SchedulerError, SchedulerResult};

pub type Task = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
pub type TaskErrorHook = Arc<dyn Fn(&SchedulerError) + Send + Sync>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs one task on a fixed interval, never more than one invocation at
/// a time. A tick that lands while the previous run is still going is
/// dropped, not queued.
pub struct Scheduler {
    interval: Duration,
    poll_interval: Duration,
    task: Task,
    on_error: TaskErrorHook,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the running flag when an invocation ends, panics included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new<F, Fut>(interval: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task: Task = Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(task())
        });
        Self {
            interval,
            poll_interval: DEFAULT_POLL_INTERVAL,
            task,
            on_error: Arc::new(|err: &SchedulerError| {
                tracing::error!(error = %err, "scheduled task failed");
            }),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            ticker: Mutex::new(None),
        }
    }

    pub fn with_error_hook(mut self, on_error: TaskErrorHook) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn start(&self) -> SchedulerResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        let interval = self.interval;
        let task = Arc::clone(&self.task);
        let on_error = Arc::clone(&self.on_error);
        let running = Arc::clone(&self.running);
        let cancel = self.cancel.clone();
        *ticker = Some(tokio::spawn(async move {
            run_ticks(interval, task, on_error, running, cancel).await;
        }));
        tracing::info!(interval_ms = interval.as_millis() as u64, "scheduler started");
        Ok(())
    }

    /// Stops the timer, then waits until no invocation is running.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::error!(error = %err, "scheduler ticker aborted");
        }
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.poll_interval).await;
        }
        tracing::info!("scheduler stopped");
    }
}

async fn run_ticks(
    interval: Duration,
    task: Task,
    on_error: TaskErrorHook,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if running.swap(true, Ordering::SeqCst) {
            tracing::debug!("previous run still in progress, skipping tick");
            continue;
        }
        let guard = RunningGuard(Arc::clone(&running));
        let invocation = task();
        let on_error = Arc::clone(&on_error);
        tokio::spawn(async move {
            let _guard = guard;
            match tokio::spawn(invocation).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => on_error(&SchedulerError::TaskFailed(err.to_string())),
                Err(join_err) => on_error(&SchedulerError::TaskPanicked(join_err.to_string())),
            }
        });
    }
}
