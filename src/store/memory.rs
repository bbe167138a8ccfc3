//! In-memory durable store for tests and local development.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DurableStore, StoreError};

#[derive(Default)]
struct Inner {
    /// key → field → value
    hashes: HashMap<String, HashMap<String, String>>,

    /// key → (score, member) ordered ascending
    sorted: HashMap<String, BTreeMap<(i64, String), ()>>,

    /// key → member → score, for O(1) removal and re-scoring
    scores: HashMap<String, HashMap<String, i64>>,
}

/// `DurableStore` backed by process memory.
///
/// Single RwLock over all keys; every operation is atomic, matching the
/// single-key atomicity contract of the production store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .hashes
            .get_mut(key)
            .map(|h| h.remove(field).is_some())
            .unwrap_or(false))
    }

    async fn hash_values(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .hashes
            .get(key)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        // Drop any previous score for this member before re-inserting
        let previous = inner
            .scores
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);

        let set = inner.sorted.entry(key.to_string()).or_default();
        if let Some(old) = previous {
            set.remove(&(old, member.to_string()));
        }
        set.insert((score, member.to_string()), ());

        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .scores
            .get_mut(key)
            .and_then(|m| m.remove(member));

        if let Some(score) = removed {
            if let Some(set) = inner.sorted.get_mut(key) {
                set.remove(&(score, member.to_string()));
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn sorted_set_range_to(
        &self,
        key: &str,
        max_score: i64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sorted
            .get(key)
            .map(|set| {
                set.keys()
                    .take_while(|(score, _)| *score <= max_score)
                    .take(limit)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn sorted_set_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .scores
            .get(key)
            .and_then(|m| m.get(member))
            .copied())
    }
}
