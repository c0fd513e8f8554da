//! In-memory store for tests and simulation. One mutex over all maps —
//! increments are atomic by construction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::{AbuseLog, AreaStore, CounterStore, SearchArea, WarnFlags};
use crate::auth::UserId;

#[derive(Default)]
struct Inner {
    counters: HashMap<(String, String), u32>,
    areas: HashMap<String, Vec<SearchArea>>,
    abuse: HashMap<String, Vec<u64>>,
    flags: HashSet<(String, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("memory store mutex poisoned"))
    }

    /// All areas recorded for a user, oldest first. Test helper.
    pub fn areas_for(&self, user: &UserId) -> Vec<SearchArea> {
        self.lock()
            .map(|g| g.areas.get(user.as_str()).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl CounterStore for MemoryStore {
    fn get(&self, user: &UserId, period: &str) -> Result<u32> {
        let g = self.lock()?;
        Ok(*g.counters.get(&(user.0.clone(), period.to_string())).unwrap_or(&0))
    }

    fn get_and_increment(&self, user: &UserId, period: &str) -> Result<u32> {
        let mut g = self.lock()?;
        let entry = g.counters.entry((user.0.clone(), period.to_string())).or_insert(0);
        let previous = *entry;
        *entry += 1;
        Ok(previous)
    }
}

impl AreaStore for MemoryStore {
    fn last_radius(&self, user: &UserId) -> Result<Option<f64>> {
        let g = self.lock()?;
        Ok(g.areas
            .get(user.as_str())
            .and_then(|v| v.last())
            .map(|a| a.radius_m))
    }

    fn last_generation(&self, user: &UserId) -> Result<u32> {
        let g = self.lock()?;
        Ok(g.areas
            .get(user.as_str())
            .and_then(|v| v.iter().map(|a| a.generation).max())
            .unwrap_or(0))
    }

    fn put_new_area(&self, area: &SearchArea) -> Result<()> {
        let mut g = self.lock()?;
        g.areas.entry(area.user.0.clone()).or_default().push(area.clone());
        Ok(())
    }
}

impl AbuseLog for MemoryStore {
    fn recent_count(&self, user: &UserId, window_secs: u64, now: u64) -> Result<u32> {
        let g = self.lock()?;
        let cutoff = now.saturating_sub(window_secs);
        Ok(g.abuse
            .get(user.as_str())
            .map(|v| v.iter().filter(|&&ts| ts >= cutoff).count() as u32)
            .unwrap_or(0))
    }

    fn append(&self, user: &UserId, ts: u64) -> Result<()> {
        let mut g = self.lock()?;
        g.abuse.entry(user.0.clone()).or_default().push(ts);
        Ok(())
    }
}

impl WarnFlags for MemoryStore {
    fn is_set(&self, user: &UserId, key: &str) -> Result<bool> {
        let g = self.lock()?;
        Ok(g.flags.contains(&(user.0.clone(), key.to_string())))
    }

    fn set(&self, user: &UserId, key: &str, _ts: u64) -> Result<()> {
        let mut g = self.lock()?;
        g.flags.insert((user.0.clone(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::from("u-mem")
    }

    #[test]
    fn test_counter_increments_return_previous() {
        let s = MemoryStore::new();
        assert_eq!(s.get_and_increment(&user(), "2026-08-03").unwrap(), 0);
        assert_eq!(s.get_and_increment(&user(), "2026-08-03").unwrap(), 1);
        assert_eq!(s.get(&user(), "2026-08-03").unwrap(), 2);
        // A new period key starts from zero without touching the old one.
        assert_eq!(s.get(&user(), "2026-08-10").unwrap(), 0);
    }

    #[test]
    fn test_area_progression() {
        let s = MemoryStore::new();
        assert_eq!(s.last_radius(&user()).unwrap(), None);
        assert_eq!(s.last_generation(&user()).unwrap(), 0);
        s.put_new_area(&SearchArea {
            user: user(),
            lat: 39.47,
            lng: -0.38,
            radius_m: 100_000.0,
            generation: 1,
            created_at: 1,
        })
        .unwrap();
        assert_eq!(s.last_radius(&user()).unwrap(), Some(100_000.0));
        assert_eq!(s.last_generation(&user()).unwrap(), 1);
    }

    #[test]
    fn test_abuse_window_filters_old_entries() {
        let s = MemoryStore::new();
        s.append(&user(), 100).unwrap();
        s.append(&user(), 150).unwrap();
        assert_eq!(s.recent_count(&user(), 30, 160).unwrap(), 1);
        assert_eq!(s.recent_count(&user(), 100, 160).unwrap(), 2);
    }

    #[test]
    fn test_warn_flags_latch() {
        let s = MemoryStore::new();
        assert!(!s.is_set(&user(), "radius_floor").unwrap());
        s.set(&user(), "radius_floor", 5).unwrap();
        assert!(s.is_set(&user(), "radius_floor").unwrap());
    }
}
