//! Key store seam and its in-memory implementation.

use super::model::SigningKeyPair;
use crate::error::{IdentityError, IdentityResult};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Persistence of encrypted signing key records.
///
/// Implementations order records by `created_at` and break ties by insertion
/// order, so there is always exactly one newest record when the store is not
/// empty.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Persist a new record. Fails if the id is already present.
    async fn insert(&self, pair: SigningKeyPair) -> IdentityResult<SigningKeyPair>;

    /// Record with the greatest `created_at`.
    async fn find_newest(&self) -> IdentityResult<Option<SigningKeyPair>>;

    /// Record by id.
    async fn find_by_id(&self, id: &str) -> IdentityResult<Option<SigningKeyPair>>;

    /// All records, newest first.
    async fn list_newest_first(&self) -> IdentityResult<Vec<SigningKeyPair>>;

    /// Remove a record, returning whether it existed.
    async fn delete_by_id(&self, id: &str) -> IdentityResult<bool>;

    /// Atomically keep only the newest record, returning how many were removed.
    async fn delete_all_but_newest(&self) -> IdentityResult<u64>;

    /// Remove every record, returning how many were removed.
    async fn delete_all(&self) -> IdentityResult<u64>;

    /// Number of records.
    async fn count(&self) -> IdentityResult<u64>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct Rows {
    next_seq: u64,
    items: Vec<(u64, SigningKeyPair)>,
}

impl Rows {
    fn sorted_newest_first(&self) -> Vec<&(u64, SigningKeyPair)> {
        let mut rows: Vec<_> = self.items.iter().collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| b_seq.cmp(a_seq))
        });
        rows
    }

    fn newest_seq(&self) -> Option<u64> {
        self.sorted_newest_first().first().map(|(seq, _)| *seq)
    }
}

/// Non-durable key store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    rows: RwLock<Rows>,
}

impl InMemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn insert(&self, pair: SigningKeyPair) -> IdentityResult<SigningKeyPair> {
        let mut rows = self.rows.write().await;
        if rows.items.iter().any(|(_, existing)| existing.id == pair.id) {
            return Err(IdentityError::storage(format!("duplicate key pair id: {}", pair.id)));
        }
        let seq = rows.next_seq;
        rows.next_seq += 1;
        rows.items.push((seq, pair.clone()));
        Ok(pair)
    }

    async fn find_newest(&self) -> IdentityResult<Option<SigningKeyPair>> {
        let rows = self.rows.read().await;
        Ok(rows.sorted_newest_first().first().map(|(_, pair)| pair.clone()))
    }

    async fn find_by_id(&self, id: &str) -> IdentityResult<Option<SigningKeyPair>> {
        let rows = self.rows.read().await;
        Ok(rows
            .items
            .iter()
            .find(|(_, pair)| pair.id == id)
            .map(|(_, pair)| pair.clone()))
    }

    async fn list_newest_first(&self) -> IdentityResult<Vec<SigningKeyPair>> {
        let rows = self.rows.read().await;
        Ok(rows
            .sorted_newest_first()
            .into_iter()
            .map(|(_, pair)| pair.clone())
            .collect())
    }

    async fn delete_by_id(&self, id: &str) -> IdentityResult<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.items.len();
        rows.items.retain(|(_, pair)| pair.id != id);
        Ok(rows.items.len() != before)
    }

    async fn delete_all_but_newest(&self) -> IdentityResult<u64> {
        let mut rows = self.rows.write().await;
        let Some(newest) = rows.newest_seq() else {
            return Ok(0);
        };
        let before = rows.items.len();
        rows.items.retain(|(seq, _)| *seq == newest);
        Ok((before - rows.items.len()) as u64)
    }

    async fn delete_all(&self) -> IdentityResult<u64> {
        let mut rows = self.rows.write().await;
        let removed = rows.items.len() as u64;
        rows.items.clear();
        Ok(removed)
    }

    async fn count(&self) -> IdentityResult<u64> {
        Ok(self.rows.read().await.items.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn pair(id: &str, offset_secs: i64) -> SigningKeyPair {
        let at = Utc::now() + Duration::seconds(offset_secs);
        SigningKeyPair {
            id: id.to_string(),
            encrypted_public_key: format!("pub-{id}"),
            encrypted_private_key: format!("priv-{id}"),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_newest_and_ordering() {
        let store = InMemoryKeyStore::new();
        store.insert(pair("b", 10)).await.unwrap();
        store.insert(pair("a", 0)).await.unwrap();
        store.insert(pair("c", 20)).await.unwrap();

        assert_eq!(store.find_newest().await.unwrap().unwrap().id, "c");
        let ids: Vec<_> = store
            .list_newest_first()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_ties_resolve_to_latest_insert() {
        let store = InMemoryKeyStore::new();
        let first = pair("first", 0);
        let mut second = pair("second", 0);
        second.created_at = first.created_at;

        store.insert(first).await.unwrap();
        store.insert(second).await.unwrap();

        assert_eq!(store.find_newest().await.unwrap().unwrap().id, "second");
        assert_eq!(store.delete_all_but_newest().await.unwrap(), 1);
        assert_eq!(store.find_newest().await.unwrap().unwrap().id, "second");
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryKeyStore::new();
        store.insert(pair("a", 0)).await.unwrap();
        assert!(store.insert(pair("a", 1)).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deletes() {
        let store = InMemoryKeyStore::new();
        assert_eq!(store.delete_all_but_newest().await.unwrap(), 0);

        store.insert(pair("a", 0)).await.unwrap();
        store.insert(pair("b", 1)).await.unwrap();

        assert!(!store.delete_by_id("missing").await.unwrap());
        assert!(store.delete_by_id("a").await.unwrap());
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
