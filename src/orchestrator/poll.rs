//! Fixed-interval readiness polling

use super::scope::Scope;
use crate::docker::Runtime;
use crate::error::{Result, SindError};
use crate::swarm::node::count_ready_members;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Delay between two attempts, and before the first one
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `check` every [`POLL_INTERVAL`] until it reports true
///
/// Check errors are retried at the next tick. The scope error is returned
/// as is once the scope ends.
pub async fn poll_until<F, Fut>(scope: &Scope, what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut ticker = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_error: Option<SindError> = None;

    loop {
        tokio::select! {
            biased;
            err = scope.done() => return Err(expired(what, err, last_error)),
            _ = ticker.tick() => {}
        }

        match scope.run(check()).await {
            Ok(true) => {
                debug!("{} ready", what);
                return Ok(());
            }
            Ok(false) => {}
            Err(err) => {
                if let Err(done) = scope.check() {
                    return Err(expired(what, done, last_error));
                }
                debug!("{} not ready: {}", what, err);
                last_error = Some(err);
            }
        }
    }
}

fn expired(what: &str, err: SindError, last_error: Option<SindError>) -> SindError {
    if let Some(last) = last_error {
        warn!("gave up waiting for {}, last error: {}", what, last);
    }
    err
}

/// Wait until a daemon answers pings
pub async fn wait_daemon_ready(scope: &Scope, runtime: &dyn Runtime) -> Result<()> {
    let what = format!("docker daemon at {}", runtime.host());
    poll_until(scope, &what, move || async move {
        runtime.ping().await.map(|()| true)
    })
    .await
}

/// Wait until the swarm reports exactly the expected ready managers and workers
pub async fn wait_cluster_ready(
    scope: &Scope,
    runtime: &dyn Runtime,
    managers: usize,
    workers: usize,
) -> Result<()> {
    poll_until(scope, "swarm cluster", move || async move {
        let members = runtime.list_nodes().await?;
        let (ready_managers, ready_workers) = count_ready_members(&members);
        debug!(
            "swarm members ready: {}/{} managers, {}/{} workers",
            ready_managers, managers, ready_workers, workers
        );
        Ok(ready_managers == managers && ready_workers == workers)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeRuntime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_after_one_interval() {
        let scope = Scope::with_timeout(Duration::from_secs(5));
        let start = Instant::now();
        poll_until(&scope, "ready", || async { Ok(true) }).await.unwrap();
        assert_eq!(start.elapsed(), POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_polling() {
        let scope = Scope::with_timeout(Duration::from_secs(5));
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        poll_until(&scope, "ready", move || {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returned_verbatim() {
        let timeout = Duration::from_millis(950);
        let scope = Scope::with_timeout(timeout);
        let start = Instant::now();

        let err = poll_until(&scope, "ready", || async {
            Err::<bool, _>(SindError::Transport("connection refused".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SindError::DeadlineExceeded));
        assert!(start.elapsed() <= timeout + POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returned_verbatim() {
        let scope = Scope::new();
        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let err = poll_until(&scope, "ready", || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(matches!(err, SindError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_bounded_by_deadline() {
        let scope = Scope::with_timeout(Duration::from_millis(500));
        let err = poll_until(&scope, "ready", || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SindError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daemon_ready_after_refused_pings() {
        let runtime = FakeRuntime::new().ping_failures(3);
        let scope = Scope::with_timeout(Duration::from_secs(5));

        wait_daemon_ready(&scope, &runtime).await.unwrap();
        assert_eq!(runtime.count("ping"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cluster_never_ready_times_out() {
        let runtime = FakeRuntime::new().never_ready();
        let timeout = Duration::from_secs(2);
        let scope = Scope::with_timeout(timeout);
        let start = Instant::now();

        let err = wait_cluster_ready(&scope, &runtime, 1, 0).await.unwrap_err();
        assert!(matches!(err, SindError::DeadlineExceeded));
        assert!(start.elapsed() <= timeout + POLL_INTERVAL);
    }
}
