//! API key record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Kind of principal an API key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
}

/// One issued API credential.
///
/// The plaintext key exists only at creation/regeneration time; the record
/// carries its display prefix and one-way hash. `key_prefix` plus
/// `hashed_key` uniquely identify a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Opaque record id
    pub id: String,

    /// Human-readable label chosen by the owner
    pub name: String,

    /// First characters of the plaintext key, safe to display
    pub key_prefix: String,

    /// Hex SHA-256 of the full plaintext key
    pub hashed_key: String,

    /// Owning principal
    pub owner_id: String,
    pub owner_kind: OwnerKind,

    /// Permission scopes granted to this key (e.g. `read:events`)
    pub permissions: Vec<String>,

    /// Requests-per-minute quota
    pub rate_limit: u32,

    /// Allowed client addresses; empty means unrestricted
    pub ip_allowlist: Vec<IpAddr>,

    /// Successful authentications since issuance or last regeneration
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,

    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether this key grants the given permission scope
    pub fn has_permission(&self, scope: &str) -> bool {
        self.permissions.iter().any(|p| p == scope)
    }

    /// Whether the key has passed its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    /// Whether `client_ip` may use this key
    pub fn allows_ip(&self, client_ip: IpAddr) -> bool {
        self.ip_allowlist.is_empty() || self.ip_allowlist.contains(&client_ip)
    }
}
