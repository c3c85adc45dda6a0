//! API endpoints
//!
//! Contains health probes, the external `/api/v1` surface, and the key
//! management endpoints.

pub mod external;
pub mod health;
pub mod keys;
