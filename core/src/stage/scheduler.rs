use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::future::Future;
use tokio::sync::Semaphore;

/// Runs `f(0..count)` with at most `max_concurrency` calls in flight and
/// returns the results in index order.
///
/// Futures are polled on the caller's task, so `f` may borrow from the
/// caller's stack.
pub async fn fan_out<T, F, Fut>(count: usize, max_concurrency: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T>,
{
    let sem = Semaphore::new(max_concurrency.max(1));
    let mut futs = FuturesUnordered::new();

    for index in 0..count {
        let sem = &sem;
        let f = &f;
        futs.push(async move {
            // the semaphore is owned here and never closed
            let _permit = sem.acquire().await.ok();
            (index, f(index).await)
        });
    }

    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some((index, value)) = futs.next().await {
        slots[index] = Some(value);
    }
    slots.into_iter().flatten().collect()
}
