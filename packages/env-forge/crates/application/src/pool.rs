use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs `work` over every item with at most `concurrency` units in flight.
///
/// Each invocation receives its own child of `cancel`, so cancelling the
/// parent reaches queued and in-flight work alike while leaving the parent
/// token reusable. Outputs are returned in completion order; callers that
/// need input order tag their items. The drain loop doubles as the join
/// barrier: every spawned task has finished by the time this returns,
/// including after cancellation.
pub async fn fan_out<I, T, F, Fut>(
    concurrency: usize,
    cancel: &CancellationToken,
    items: Vec<I>,
    work: F,
) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I, CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set: JoinSet<T> = JoinSet::new();

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let fut = work(item, cancel.child_token());
        set.spawn(async move {
            // Hold the permit for the whole unit of work.
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            fut.await
        });
    }

    let mut outputs = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        outputs.push(joined.expect("worker task panicked"));
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_parallelism_never_exceeds_the_cap() {
        let limit = 4;
        let running = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let watermarks = fan_out(limit, &cancel, (0..40u64).collect::<Vec<_>>(), |i, _| {
            let running = Arc::clone(&running);
            async move {
                // How many units - including our own - are in flight now?
                let watermark = running.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(i % 7)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                watermark
            }
        })
        .await;

        assert_eq!(watermarks.len(), 40);
        for watermark in watermarks {
            assert!(watermark <= limit, "observed {watermark} concurrent units");
        }
    }

    #[tokio::test]
    async fn test_all_items_come_back_tagged() {
        let cancel = CancellationToken::new();
        let mut outputs = fan_out(3, &cancel, (0..20u64).collect::<Vec<_>>(), |i, _| async move {
            tokio::time::sleep(Duration::from_millis((20 - i) % 5)).await;
            (i, i * 2)
        })
        .await;

        outputs.sort_by_key(|(i, _)| *i);
        for (i, doubled) in outputs {
            assert_eq!(doubled, i * 2);
        }
    }

    #[tokio::test]
    async fn test_cancellation_reaches_queued_and_inflight_work() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let parent = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            parent.cancel();
        });

        // 32 units of 10s each on 2 workers would take minutes; with
        // cancellation the whole run must come back almost immediately,
        // with every unit observed and joined.
        let outputs = fan_out(2, &cancel, (0..32).collect::<Vec<_>>(), |_, token| async move {
            tokio::select! {
                _ = token.cancelled() => "cancelled",
                _ = tokio::time::sleep(Duration::from_secs(10)) => "done",
            }
        })
        .await;

        assert_eq!(outputs.len(), 32);
        assert!(outputs.iter().all(|o| *o == "cancelled"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
