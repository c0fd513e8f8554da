//! Storage collaborator interfaces.
//!
//! The engine never owns long-term storage; it reads and writes through
//! these traits. `sqlite` is the durable implementation, `memory` backs
//! tests and simulation. Counter increments must be atomic at the storage
//! layer — see `CounterStore::get_and_increment`.

use anyhow::Result;

use crate::auth::UserId;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchArea {
    pub user: UserId,
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    pub generation: u32,
    pub created_at: u64,
}

pub trait CounterStore: Send + Sync {
    /// Activations already committed for (user, period).
    fn get(&self, user: &UserId, period: &str) -> Result<u32>;

    /// Atomic read-modify-write increment. Returns the pre-increment
    /// count. Two concurrent calls must never observe the same value.
    fn get_and_increment(&self, user: &UserId, period: &str) -> Result<u32>;
}

pub trait AreaStore: Send + Sync {
    fn last_radius(&self, user: &UserId) -> Result<Option<f64>>;
    fn last_generation(&self, user: &UserId) -> Result<u32>;
    fn put_new_area(&self, area: &SearchArea) -> Result<()>;
}

pub trait AbuseLog: Send + Sync {
    /// Entries for `user` with timestamp within the last `window_secs`
    /// measured back from `now`.
    fn recent_count(&self, user: &UserId, window_secs: u64, now: u64) -> Result<u32>;
    fn append(&self, user: &UserId, ts: u64) -> Result<()>;
}

pub trait WarnFlags: Send + Sync {
    fn is_set(&self, user: &UserId, key: &str) -> Result<bool>;
    fn set(&self, user: &UserId, key: &str, ts: u64) -> Result<()>;
}
