//! The set of live connections.
//!
//! One mutex guards insert, remove and iteration, so a broadcast pass never
//! sees a half-registered handle or one another task is tearing down.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::{ConnectionHandle, ConnectionId};

/// Result of one [`Registry::retain`] pass.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Members that stayed.
    pub kept: usize,
    /// Members that were removed.
    pub dropped: Vec<Arc<ConnectionHandle>>,
}

/// Who receives broadcasts right now.
#[derive(Default)]
pub struct Registry {
    members: Mutex<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: Arc<ConnectionHandle>) {
        let mut members = self.members.lock().await;
        members.insert(handle.id(), handle);
    }

    /// Remove a handle. Returns `false` if it was already gone, which happens
    /// when the dispatcher dropped it first.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        self.members.lock().await.remove(&id).is_some()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Visit every member while holding the lock, then drop the ones `keep`
    /// answered `false` for before releasing it.
    pub async fn retain<F, Fut>(&self, mut keep: F) -> Sweep
    where
        F: FnMut(Arc<ConnectionHandle>) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut members = self.members.lock().await;
        let mut rejected = Vec::new();
        for (id, handle) in members.iter() {
            if !keep(Arc::clone(handle)).await {
                rejected.push(*id);
            }
        }
        let dropped: Vec<_> = rejected
            .into_iter()
            .filter_map(|id| members.remove(&id))
            .collect();
        Sweep {
            kept: members.len(),
            dropped,
        }
    }
}
