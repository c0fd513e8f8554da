//! Search-area radius shrink schedule.
//!
//! The radius starts at 100 km, shrinks 5% per activation and never
//! narrows below the 5 km floor. The only state is the previous radius,
//! supplied by the caller.

use crate::config::Config;

pub const RADIUS_START_M: f64 = 100_000.0;
pub const RADIUS_FLOOR_M: f64 = 5_000.0;
pub const RADIUS_DECAY: f64 = 0.95;

#[derive(Debug, Clone, Copy)]
pub struct RadiusEngine {
    pub start_m: f64,
    pub floor_m: f64,
    pub decay: f64,
}

impl Default for RadiusEngine {
    fn default() -> Self {
        Self {
            start_m: RADIUS_START_M,
            floor_m: RADIUS_FLOOR_M,
            decay: RADIUS_DECAY,
        }
    }
}

impl RadiusEngine {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            start_m: cfg.radius_start_m,
            floor_m: cfg.radius_floor_m,
            decay: cfg.radius_decay,
        }
    }

    /// Next stored radius: clamped to the floor.
    pub fn next_radius(&self, prev: Option<f64>) -> f64 {
        match prev {
            None => self.start_m,
            Some(r) => (r * self.decay).max(self.floor_m),
        }
    }

    /// Unclamped shrink target. The pricing regime is keyed on this value,
    /// so escalated pricing engages exactly on the activation whose shrink
    /// the floor clamps.
    pub fn shrink_candidate(&self, prev: Option<f64>) -> f64 {
        match prev {
            None => self.start_m,
            Some(r) => r * self.decay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_activation_starts_wide() {
        let e = RadiusEngine::default();
        assert_eq!(e.next_radius(None), 100_000.0);
    }

    #[test]
    fn test_shrinks_five_percent() {
        let e = RadiusEngine::default();
        assert_eq!(e.next_radius(Some(100_000.0)), 95_000.0);
        assert_eq!(e.next_radius(Some(95_000.0)), 90_250.0);
    }

    #[test]
    fn test_floor_is_hard() {
        let e = RadiusEngine::default();
        assert_eq!(e.next_radius(Some(5_100.0)), 5_000.0);
        assert_eq!(e.next_radius(Some(5_000.0)), 5_000.0);
    }

    #[test]
    fn test_recurrence_matches_closed_form() {
        let e = RadiusEngine::default();
        for r in [100_000.0, 50_000.0, 10_000.0, 5_263.2, 5_000.0] {
            assert_eq!(e.next_radius(Some(r)), (r * 0.95).max(5_000.0));
        }
    }

    #[test]
    fn test_monotone_until_floor() {
        let e = RadiusEngine::default();
        let mut r = e.next_radius(None);
        for _ in 0..200 {
            let next = e.next_radius(Some(r));
            assert!(next <= r);
            assert!(next >= e.floor_m);
            r = next;
        }
        assert_eq!(r, e.floor_m);
    }

    #[test]
    fn test_candidate_crosses_where_clamp_engages() {
        let e = RadiusEngine::default();
        assert!(e.shrink_candidate(Some(5_100.0)) < e.floor_m);
        assert_eq!(e.next_radius(Some(5_100.0)), e.floor_m);
        assert!(e.shrink_candidate(Some(6_000.0)) >= e.floor_m);
    }
}
