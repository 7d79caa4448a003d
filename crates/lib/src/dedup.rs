//! Bounded record of message ids the rewrite pipeline already handled.
//!
//! Holds both consumed originals and the bot's own reposts, so a repost echoed back by
//! the gateway is never rewritten again. When full, the oldest recorded id is evicted.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::channels::MessageId;

/// Default number of ids retained.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Default)]
struct Inner {
    ids: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

/// FIFO-evicting set of message ids. Cloning shares the same underlying set.
#[derive(Clone)]
pub struct DedupGuard {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DedupGuard {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.ids.contains(id)
    }

    /// Record an id, evicting the oldest entry if the set is full. Recording a known id is a no-op.
    pub async fn record(&self, id: impl Into<MessageId>) {
        let id = id.into();
        let mut g = self.inner.lock().await;
        if g.ids.contains(&id) {
            return;
        }
        while g.order.len() >= self.capacity {
            match g.order.pop_front() {
                Some(old) => {
                    g.ids.remove(&old);
                }
                None => break,
            }
        }
        g.ids.insert(id.clone());
        g.order.push_back(id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
