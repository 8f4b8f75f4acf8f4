//! Concurrent execution of one task per target

use super::scope::Scope;
use crate::error::{Result, SindError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Run `task` for every item concurrently and wait for all of them
///
/// Tasks share a child of `scope`; the first error cancels it and is
/// returned once every task has finished. Results come back in item order.
/// `limit` bounds how many tasks run at once.
pub async fn fan_out<I, T, F, Fut>(
    scope: &Scope,
    limit: Option<usize>,
    items: Vec<I>,
    task: F,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(Scope, I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let group = scope.child();
    let semaphore = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let count = items.len();

    let mut set = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let scope = group.clone();
        let semaphore = semaphore.clone();
        let fut = task(scope.clone(), item);

        set.spawn(async move {
            let result = scope
                .run(async move {
                    let _permit = match semaphore {
                        Some(semaphore) => Some(
                            semaphore
                                .acquire_owned()
                                .await
                                .map_err(|e| SindError::Internal(e.to_string()))?,
                        ),
                        None => None,
                    };
                    fut.await
                })
                .await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    let mut first_error = None;

    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok((index, Ok(value))) => {
                slots[index] = Some(value);
                continue;
            }
            Ok((_, Err(err))) => err,
            Err(err) => SindError::Internal(format!("task failed: {}", err)),
        };

        if first_error.is_none() {
            debug!("fan-out task failed, cancelling siblings: {}", result);
            group.cancel();
            first_error = Some(result);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(slots.into_iter().flatten().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_in_item_order() {
        let scope = Scope::new();
        let results = fan_out(&scope, None, vec![3u64, 1, 2], |_, n| async move {
            tokio::time::sleep(Duration::from_millis(n * 5)).await;
            Ok(n * 10)
        })
        .await
        .unwrap();
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_cancels_siblings() {
        let scope = Scope::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&finished);
        let err = fan_out(&scope, None, vec![0, 1, 2, 3], move |_, i| {
            let counter = Arc::clone(&counter);
            async move {
                if i == 2 {
                    return Err(SindError::Internal("node 2".to_string()));
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("node 2"));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(scope.check().is_ok());
    }

    #[tokio::test]
    async fn test_limit_bounds_concurrency() {
        let scope = Scope::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        fan_out(&scope, Some(2), (0..6).collect(), move |_, i: usize| {
            let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_items() {
        let scope = Scope::new();
        let results: Vec<u8> = fan_out(&scope, None, Vec::<u8>::new(), |_, i| async move { Ok(i) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
