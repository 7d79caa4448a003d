//! Per-channel exclusion: at most one rewrite pipeline runs per channel at a time.
//!
//! Locks are created lazily on first use and kept for the life of the process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::channels::ChannelId;

#[derive(Clone, Default)]
pub struct ChannelSerializer {
    locks: Arc<Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>>,
}

impl ChannelSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, channel_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for the channel's lock. Dropping the guard releases it.
    pub async fn lock(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(channel_id).await.lock_owned().await
    }

    /// Run `body` while holding the channel's lock. The lock is released on every exit
    /// path, including a panic unwinding through the body.
    pub async fn with_exclusive<F, Fut, T>(&self, channel_id: &str, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock(channel_id).await;
        body().await
    }

    /// Number of channels that have a lock.
    pub async fn channel_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_channel_never_overlaps() {
        let serializer = ChannelSerializer::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let s = serializer.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                s.with_exclusive("chan", move || async move {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(serializer.channel_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn different_channels_overlap() {
        let serializer = ChannelSerializer::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let run = |channel: &'static str| {
            let s = serializer.clone();
            let b = barrier.clone();
            tokio::spawn(async move {
                s.with_exclusive(channel, move || async move {
                    b.wait().await;
                })
                .await;
            })
        };
        let a = run("a");
        let b = run("b");
        let both = async {
            a.await.unwrap();
            b.await.unwrap();
        };
        tokio::time::timeout(Duration::from_secs(5), both)
            .await
            .expect("channels a and b should run concurrently");
        assert_eq!(serializer.channel_count().await, 2);
    }

    #[tokio::test]
    async fn lock_released_after_panic() {
        let serializer = ChannelSerializer::new();
        let s = serializer.clone();
        let res = tokio::spawn(async move {
            s.with_exclusive("chan", || async {
                panic!("boom");
            })
            .await
        })
        .await;
        assert!(res.is_err());
        let acquired = tokio::time::timeout(Duration::from_secs(1), serializer.lock("chan")).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn returns_body_value() {
        let serializer = ChannelSerializer::new();
        let v = serializer.with_exclusive("c", || async { 42 }).await;
        assert_eq!(v, 42);
    }
}
