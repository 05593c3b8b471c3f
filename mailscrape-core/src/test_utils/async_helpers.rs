//! Async test helpers

use std::future::Future;
use tokio::time::{timeout, Duration};

/// Default timeout for test operations
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, panicking if it takes longer than `duration`
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(value) => value,
        Err(_) => panic!("Operation did not complete within {:?}", duration),
    }
}

/// Run `n` copies of a future concurrently on the current runtime
///
/// Results come back in spawn order.
pub async fn run_concurrently<F, Fut, T>(n: usize, make: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = (0..n).map(|i| tokio::spawn(make(i))).collect();
    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.expect("spawned test task panicked"));
    }
    results
}
