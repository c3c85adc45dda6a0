//! Key store
//!
//! Data access layer for API key records. The trait is the boundary the
//! authentication pipeline depends on; the platform's persistence lives
//! behind it. The in-memory implementation backs tests and local
//! development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::keys::generator;
use crate::keys::model::{ApiKey, OwnerKind};

/// Errors that can occur during key store operations
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    #[error("API key not found")]
    NotFound,
}

/// Parameters for issuing a new key
#[derive(Debug, Clone)]
pub struct NewKey {
    pub name: String,
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub permissions: Vec<String>,
    pub rate_limit: u32,
    pub ip_allowlist: Vec<IpAddr>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Durable store of issued API keys.
///
/// `find_active_by_hash` is the hot path: it must compare candidate hashes
/// in constant time and never surface revoked records. Owner-scoped
/// operations return [`KeyStoreError::NotFound`] when the record exists
/// but belongs to someone else, so callers cannot probe for foreign keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Look up an active record whose stored hash matches `hash`
    async fn find_active_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, KeyStoreError>;

    /// Record one successful authentication: usage +1, last-used stamped
    async fn increment_usage(&self, id: &str) -> Result<(), KeyStoreError>;

    /// Issue a new key; returns the record and the plaintext (shown once)
    async fn create(&self, new: NewKey) -> Result<(ApiKey, String), KeyStoreError>;

    /// Rotate a key's secret: new prefix/hash, usage reset to zero
    async fn regenerate(&self, id: &str, owner_id: &str)
        -> Result<(ApiKey, String), KeyStoreError>;

    /// Rename a key
    async fn rename(&self, id: &str, owner_id: &str, name: &str)
        -> Result<ApiKey, KeyStoreError>;

    /// Destroy a key
    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), KeyStoreError>;

    /// All keys held by an owner, newest first
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, KeyStoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Process-local key store
#[derive(Default)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<String, ApiKey>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor used throughout the server wiring
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn find_active_by_hash(&self, hash: &str) -> Result<Option<ApiKey>, KeyStoreError> {
        let records = self.records.read().await;

        // Full scan with constant-time comparison per candidate; the
        // record set is small (a handful of keys per tenant).
        for record in records.values() {
            if record.is_active && generator::hashes_match(&record.hashed_key, hash) {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn increment_usage(&self, id: &str) -> Result<(), KeyStoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or(KeyStoreError::NotFound)?;
        record.usage_count += 1;
        record.last_used_at = Some(Utc::now());
        Ok(())
    }

    async fn create(&self, new: NewKey) -> Result<(ApiKey, String), KeyStoreError> {
        let generated = generator::generate();
        let record = ApiKey {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            key_prefix: generated.prefix,
            hashed_key: generated.hash,
            owner_id: new.owner_id,
            owner_kind: new.owner_kind,
            permissions: new.permissions,
            rate_limit: new.rate_limit,
            ip_allowlist: new.ip_allowlist,
            usage_count: 0,
            last_used_at: None,
            is_active: true,
            expires_at: new.expires_at,
            created_at: Utc::now(),
        };

        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());

        Ok((record, generated.plaintext))
    }

    async fn regenerate(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<(ApiKey, String), KeyStoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .filter(|r| r.owner_id == owner_id)
            .ok_or(KeyStoreError::NotFound)?;

        let generated = generator::generate();
        record.key_prefix = generated.prefix;
        record.hashed_key = generated.hash;
        record.usage_count = 0;
        record.last_used_at = None;

        Ok((record.clone(), generated.plaintext))
    }

    async fn rename(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<ApiKey, KeyStoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .filter(|r| r.owner_id == owner_id)
            .ok_or(KeyStoreError::NotFound)?;

        record.name = name.to_string();
        Ok(record.clone())
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), KeyStoreError> {
        let mut records = self.records.write().await;
        match records.get(id) {
            Some(record) if record.owner_id == owner_id => {
                records.remove(id);
                Ok(())
            }
            _ => Err(KeyStoreError::NotFound),
        }
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, KeyStoreError> {
        let records = self.records.read().await;
        let mut keys: Vec<ApiKey> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }
}
