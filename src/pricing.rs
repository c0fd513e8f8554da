//! Activation and clue pricing.
//!
//! All pricing is expressed as pure functions of (counter state, radius)
//! so a cost can be previewed before an activation is committed. Nothing
//! here touches storage or the payment gateway.

use crate::config::Config;

/// Elevated base price once the search has narrowed past the radius floor.
pub const ESCALATED_BASE: f64 = 29.99;
/// Per-activation geometric growth factor in the escalated regime.
pub const ESCALATION_GROWTH: f64 = 1.10;

// =============================================================================
// Activation cost
// =============================================================================

/// Default regime: each prior activation this period adds a flat +1 unit.
pub fn linear_cost(base: f64, count: u32) -> f64 {
    base + count as f64
}

/// Escalated regime: scarcity pricing compounds from the elevated base.
pub fn escalated_cost(base: f64, growth: f64, count: u32) -> f64 {
    base * growth.powi(count as i32)
}

#[derive(Debug, Clone, Copy)]
pub enum Regime {
    Linear,
    Escalated,
}

impl Regime {
    pub fn for_radius(radius_m: f64, floor_m: f64) -> Self {
        if radius_m >= floor_m {
            Regime::Linear
        } else {
            Regime::Escalated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Linear => "linear",
            Regime::Escalated => "escalated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
    pub base_price: f64,
    pub escalated_base: f64,
    pub growth: f64,
    pub floor_m: f64,
}

impl PricingEngine {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_price: cfg.base_price,
            escalated_base: cfg.escalated_base,
            growth: cfg.escalation_growth,
            floor_m: cfg.radius_floor_m,
        }
    }

    /// Cost of the next activation given the period counter and the radius
    /// the activation is about to narrow to.
    pub fn activation_cost(&self, count: u32, radius_m: f64) -> f64 {
        match Regime::for_radius(radius_m, self.floor_m) {
            Regime::Linear => linear_cost(self.base_price, count),
            Regime::Escalated => escalated_cost(self.escalated_base, self.growth, count),
        }
    }
}

// =============================================================================
// Clue-unlock tiers
// =============================================================================

/// Step table for the clue-unlock path. Price is keyed on the cumulative
/// number of clues the user has already unlocked; breakpoints are exact.
pub fn clue_tier_price(unlocked: u32) -> f64 {
    if unlocked <= 10 {
        7.99
    } else if unlocked <= 20 {
        9.99
    } else if unlocked <= 30 {
        13.99
    } else if unlocked <= 40 {
        19.99
    } else {
        29.99
    }
}

// =============================================================================
// Tests
// =============================================================================
