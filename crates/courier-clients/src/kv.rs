use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ClientResult;

/// Connection to a networked key-value cache.
///
/// Covers the three shapes the storage layer needs: plain values, unordered
/// membership sets (secondary indices), and score-ordered sets (per-sender
/// timelines). All operations are keyed by opaque strings; values are raw
/// bytes the client never interprets.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> ClientResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> ClientResult<()>;
    /// Returns `true` if the key existed.
    async fn remove(&self, key: &str) -> ClientResult<bool>;
    async fn exists(&self, key: &str) -> ClientResult<bool>;

    async fn set_add(&self, key: &str, member: &str) -> ClientResult<()>;
    async fn set_members(&self, key: &str) -> ClientResult<Vec<String>>;
    async fn set_remove(&self, key: &str, member: &str) -> ClientResult<()>;

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> ClientResult<()>;
    /// Members ordered by descending score, at most `limit`.
    async fn sorted_rev_range(&self, key: &str, limit: usize) -> ClientResult<Vec<String>>;
    async fn sorted_remove(&self, key: &str, member: &str) -> ClientResult<()>;
}

/// In-memory `KvClient` over `RwLock`-guarded maps.
///
/// Intended for tests and embedding.
#[derive(Default)]
pub struct MemoryKv {
    values: RwLock<HashMap<String, Vec<u8>>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
    sorted: RwLock<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plain keys currently stored.
    pub fn len(&self) -> usize {
        self.values.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no plain keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> ClientResult<Option<Vec<u8>>> {
        Ok(self.values.read().expect("lock poisoned").get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> ClientResult<()> {
        self.values
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> ClientResult<bool> {
        Ok(self
            .values
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some())
    }

    async fn exists(&self, key: &str) -> ClientResult<bool> {
        Ok(self.values.read().expect("lock poisoned").contains_key(key))
    }

    async fn set_add(&self, key: &str, member: &str) -> ClientResult<()> {
        self.sets
            .write()
            .expect("lock poisoned")
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> ClientResult<Vec<String>> {
        Ok(self
            .sets
            .read()
            .expect("lock poisoned")
            .get(key)
            .map(|set| {
                let mut members: Vec<String> = set.iter().cloned().collect();
                members.sort();
                members
            })
            .unwrap_or_default())
    }

    async fn set_remove(&self, key: &str, member: &str) -> ClientResult<()> {
        let mut sets = self.sets.write().expect("lock poisoned");
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> ClientResult<()> {
        self.sorted
            .write()
            .expect("lock poisoned")
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_rev_range(&self, key: &str, limit: usize) -> ClientResult<Vec<String>> {
        let sorted = self.sorted.read().expect("lock poisoned");
        let Some(entries) = sorted.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, f64)> = entries.iter().map(|(m, s)| (m, *s)).collect();
        // Descending score; ties break on member for determinism.
        members.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));
        Ok(members
            .into_iter()
            .take(limit)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn sorted_remove(&self, key: &str, member: &str) -> ClientResult<()> {
        let mut sorted = self.sorted.write().expect("lock poisoned");
        if let Some(entries) = sorted.get_mut(key) {
            entries.remove(member);
            if entries.is_empty() {
                sorted.remove(key);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKv")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove() {
        let kv = MemoryKv::new();
        kv.put("a", b"1".to_vec()).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert!(kv.exists("a").await.unwrap());
        assert!(kv.remove("a").await.unwrap());
        assert!(!kv.remove("a").await.unwrap());
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_membership() {
        let kv = MemoryKv::new();
        kv.set_add("idx", "m1").await.unwrap();
        kv.set_add("idx", "m2").await.unwrap();
        kv.set_add("idx", "m1").await.unwrap();
        assert_eq!(kv.set_members("idx").await.unwrap(), vec!["m1", "m2"]);

        kv.set_remove("idx", "m1").await.unwrap();
        assert_eq!(kv.set_members("idx").await.unwrap(), vec!["m2"]);
        assert!(kv.set_members("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sorted_rev_range_orders_by_score() {
        let kv = MemoryKv::new();
        kv.sorted_add("timeline", "old", 1.0).await.unwrap();
        kv.sorted_add("timeline", "new", 3.0).await.unwrap();
        kv.sorted_add("timeline", "mid", 2.0).await.unwrap();

        let members = kv.sorted_rev_range("timeline", 10).await.unwrap();
        assert_eq!(members, vec!["new", "mid", "old"]);

        let limited = kv.sorted_rev_range("timeline", 2).await.unwrap();
        assert_eq!(limited, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn sorted_remove_drops_member() {
        let kv = MemoryKv::new();
        kv.sorted_add("t", "a", 1.0).await.unwrap();
        kv.sorted_remove("t", "a").await.unwrap();
        assert!(kv.sorted_rev_range("t", 10).await.unwrap().is_empty());
    }
}
