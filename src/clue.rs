//! Clue selection for activations.
//!
//! The clue revealed by a buzz gets more specific as the search area
//! narrows. Tiers are keyed on the stored radius; within a tier the pick
//! is randomized so back-to-back activations do not repeat a hint.

use rand::Rng;

use crate::radius::RADIUS_FLOOR_M;

const REGION_ABOVE_M: f64 = 50_000.0;
const DISTRICT_ABOVE_M: f64 = 15_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClueTier {
    Region,
    District,
    Street,
    OnFoot,
}

impl ClueTier {
    pub fn for_radius(radius_m: f64) -> Self {
        if radius_m > REGION_ABOVE_M {
            ClueTier::Region
        } else if radius_m > DISTRICT_ABOVE_M {
            ClueTier::District
        } else if radius_m > RADIUS_FLOOR_M {
            ClueTier::Street
        } else {
            ClueTier::OnFoot
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClueTier::Region => "region",
            ClueTier::District => "district",
            ClueTier::Street => "street",
            ClueTier::OnFoot => "on_foot",
        }
    }
}

pub struct ClueCatalog;

const REGION_CLUES: &[&str] = &[
    "The prize rests where the river once ran dry.",
    "Follow the coastline north of the old port.",
    "It waits within sight of the tallest ridge in the province.",
    "The hunt begins where the orange groves meet the sea breeze.",
];

const DISTRICT_CLUES: &[&str] = &[
    "Look for the neighborhood with the painted facades.",
    "A market square holds the next thread of the trail.",
    "The bell you hear at noon rings close to the prize.",
    "Stay between the two bridges; the cache never left them.",
];

const STREET_CLUES: &[&str] = &[
    "The street you want is named after a saint.",
    "Count the lampposts past the fountain; stop at the seventh.",
    "A blue door marks the block worth searching.",
    "The cache faces a wall of hand-laid tiles.",
];

const ON_FOOT_CLUES: &[&str] = &[
    "You are close enough to walk it. Check under the stone bench.",
    "Within these five kilometers: find the mosaic of the compass rose.",
    "The hiding spot sees the sunrise before the rooftops do.",
    "Listen for running water; the prize sits a dozen paces away.",
];

impl ClueCatalog {
    pub fn new() -> Self {
        Self
    }

    fn pool(tier: ClueTier) -> &'static [&'static str] {
        match tier {
            ClueTier::Region => REGION_CLUES,
            ClueTier::District => DISTRICT_CLUES,
            ClueTier::Street => STREET_CLUES,
            ClueTier::OnFoot => ON_FOOT_CLUES,
        }
    }

    /// Random clue from the tier matching the (stored, clamped) radius.
    pub fn pick(&self, radius_m: f64) -> String {
        let pool = Self::pool(ClueTier::for_radius(radius_m));
        let idx = rand::thread_rng().gen_range(0..pool.len());
        pool[idx].to_string()
    }
}

impl Default for ClueCatalog {
    fn default() -> Self {
        Self::new()
    }
}
