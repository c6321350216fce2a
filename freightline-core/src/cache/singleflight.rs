//! In-flight request coalescing
//!
//! When enabled, concurrent cache misses for the same key share one downstream
//! resolution instead of each calling the dependency. Backed by the
//! `async_singleflight` crate. Disabled coalescing runs every resolution on its
//! own, which keeps call counts predictable.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Runs one resolution per key at a time, sharing the result with waiters
#[derive(Clone)]
pub struct Coalescer<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    group: Option<Arc<async_singleflight::Group<K, V, E>>>,
}

impl<K, V, E> Coalescer<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            group: enabled.then(|| Arc::new(async_singleflight::Group::new())),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.group.is_some()
    }

    /// Resolve `key` with the future produced by `make`.
    ///
    /// If another caller is already resolving the same key, wait for its
    /// result. If that leader is dropped before finishing, resolve directly.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<V, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        let Some(group) = &self.group else {
            return make().await;
        };

        // Err(None) means the leader was dropped or panicked
        match group.work(&key, make()).await {
            Ok(value) => Ok(value),
            Err(Some(e)) => Err(e),
            Err(None) => {
                tracing::warn!(key = ?key, "Coalesced leader failed, resolving directly");
                make().await
            }
        }
    }
}

impl<K, V, E> Debug for Coalescer<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{sleep, Duration};

    async fn concurrent_calls(enabled: bool) -> u32 {
        let coalescer: Coalescer<String, f64, String> = Coalescer::new(enabled);
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..10 {
            let coalescer = coalescer.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("geo:1425:5000".to_string(), || {
                        let counter = counter.clone();
                        async move {
                            sleep(Duration::from_millis(50)).await;
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(298.4)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 298.4);
        }
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_enabled_shares_one_resolution() {
        assert_eq!(concurrent_calls(true).await, 1);
    }

    #[tokio::test]
    async fn test_disabled_resolves_every_call() {
        assert_eq!(concurrent_calls(false).await, 10);
    }

    #[tokio::test]
    async fn test_error_propagation_and_recovery() {
        let coalescer: Coalescer<String, i32, String> = Coalescer::new(true);

        let result = coalescer
            .run("stock:p1".to_string(), || async { Err("down".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "down");

        // The failed flight is not remembered
        let result = coalescer
            .run("stock:p1".to_string(), || async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
