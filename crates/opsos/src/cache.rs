// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! A concurrent get-or-compute cache.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::Result;

#[cfg(test)]
#[path = "./cache_test.rs"]
mod cache_test;

/// Memoizes one value per key, computing each at most once.
///
/// Concurrent callers asking for the same missing key share a single
/// in-flight computation and all observe its result. Failed computations
/// leave the slot empty so a later call may try again.
#[derive(Debug)]
pub struct LoadingCache<K: Eq + Hash, V> {
    slots: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for LoadingCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing it with `init` if needed.
    pub async fn get_or_try_init<F, Fut>(&self, key: &K, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        // clone the slot out so the shard lock is not held across the await
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        slot.get_or_try_init(init).await.cloned()
    }

    /// The completed value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of keys with a completed value.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
