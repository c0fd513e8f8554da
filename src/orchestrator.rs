//! Activation orchestration.
//!
//! One `activate` call is a single transaction: guard → price → charge →
//! commit. Nothing is persisted before the charge is captured, and the
//! charge is attempted at most once. All failures surface as typed
//! errors; retries belong to the caller.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout, Duration};

use crate::auth::UserId;
use crate::clue::{ClueCatalog, ClueTier};
use crate::config::Config;
use crate::guard::{AbuseGuard, GuardDecision};
use crate::logging::{
    agg_increment, log, log_activation, log_charge, log_price_quote, log_radius_update, obj,
    ts_epoch_ms, v_num, v_str, Domain, Level, ProfileScope,
};
use crate::notify::{Notifier, WarnOnce};
use crate::payment::{idempotency_key, PaymentGateway};
use crate::period;
use crate::pricing::{PricingEngine, Regime};
use crate::radius::RadiusEngine;
use crate::store::{AbuseLog, AreaStore, CounterStore, SearchArea, WarnFlags};

pub const RADIUS_FLOOR_WARN_KEY: &str = "radius_floor";
const RADIUS_FLOOR_WARN_MSG: &str =
    "Your search area has reached its minimum size. Further buzzes use escalated pricing.";

// =============================================================================
// Results and errors
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub cost: f64,
    pub radius_m: f64,
    pub clue: String,
    pub generation: u32,
}

/// Pre-commit quote: same pure computation `activate` will use, no
/// effects.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub cost: f64,
    pub next_radius_m: f64,
    pub count: u32,
}

#[derive(Debug, Error)]
pub enum ActivationError {
    /// Bad input; not retryable.
    #[error("invalid user id: {0}")]
    Validation(String),
    /// Abuse-rate limited; retryable after cooldown.
    #[error("{0}")]
    Blocked(String),
    /// Charge failed or timed out; retryable by user action.
    #[error("payment failed: {0}")]
    Payment(String),
    /// Counter/area/flag persistence failed; fatal to this activation.
    #[error("storage failure: {0}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    Pricing,
    Charging,
    Committing,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Checking => "checking",
            Phase::Pricing => "pricing",
            Phase::Charging => "charging",
            Phase::Committing => "committing",
            Phase::Done => "done",
        }
    }
}

// =============================================================================
// Collaborator wiring
// =============================================================================

/// Injected collaborators. The orchestrator owns the transaction, never
/// the storage behind these interfaces.
pub struct Collaborators {
    pub counters: Arc<dyn CounterStore>,
    pub areas: Arc<dyn AreaStore>,
    pub abuse: Arc<dyn AbuseLog>,
    pub flags: Arc<dyn WarnFlags>,
    pub gateway: Box<dyn PaymentGateway>,
    pub notifier: Box<dyn Notifier>,
}

impl Collaborators {
    /// Wire all store roles to a single backing store (the common case:
    /// one SQLite database, or one in-memory store in tests).
    pub fn from_store<S>(
        store: Arc<S>,
        gateway: Box<dyn PaymentGateway>,
        notifier: Box<dyn Notifier>,
    ) -> Self
    where
        S: CounterStore + AreaStore + AbuseLog + WarnFlags + 'static,
    {
        Self {
            counters: store.clone(),
            areas: store.clone(),
            abuse: store.clone(),
            flags: store,
            gateway,
            notifier,
        }
    }
}

pub struct BuzzOrchestrator {
    cfg: Config,
    guard: AbuseGuard,
    pricing: PricingEngine,
    radius: RadiusEngine,
    clues: ClueCatalog,
    counters: Arc<dyn CounterStore>,
    areas: Arc<dyn AreaStore>,
    gateway: Box<dyn PaymentGateway>,
    warn: WarnOnce,
}

impl BuzzOrchestrator {
    pub fn new(cfg: Config, collab: Collaborators) -> Self {
        Self {
            guard: AbuseGuard::new(collab.abuse, &cfg),
            pricing: PricingEngine::from_config(&cfg),
            radius: RadiusEngine::from_config(&cfg),
            clues: ClueCatalog::new(),
            counters: collab.counters,
            areas: collab.areas,
            gateway: collab.gateway,
            warn: WarnOnce::new(collab.flags, collab.notifier),
            cfg,
        }
    }

    fn enter(&self, phase: Phase, activation_id: &str, user: &UserId) {
        log(
            Level::Debug,
            Domain::Gameplay,
            "phase",
            obj(&[
                ("activation_id", v_str(activation_id)),
                ("user_id", v_str(user.as_str())),
                ("phase", v_str(phase.as_str())),
            ]),
        );
    }

    /// Pure preview of what the next activation would cost. Reads counters
    /// and the last radius but commits nothing; two previews with no
    /// intervening commit return identical numbers.
    pub fn quote(&self, user: &UserId) -> Result<Quote, ActivationError> {
        if !user.is_well_formed() {
            return Err(ActivationError::Validation(user.to_string()));
        }
        let period_key = period::current_period();
        let count = self
            .counters
            .get(user, &period_key)
            .map_err(ActivationError::Storage)?;
        let prev_radius = self.areas.last_radius(user).map_err(ActivationError::Storage)?;
        let candidate = self.radius.shrink_candidate(prev_radius);
        Ok(Quote {
            cost: self.pricing.activation_cost(count, candidate),
            next_radius_m: self.radius.next_radius(prev_radius),
            count,
        })
    }

    pub async fn activate(
        &self,
        user: &UserId,
        coords: Option<(f64, f64)>,
    ) -> Result<Activation, ActivationError> {
        let _scope = ProfileScope::new("activate");
        let now = period::now_ts();
        let activation_id = format!("A-{}-{}", user, ts_epoch_ms());

        if !user.is_well_formed() {
            return Err(ActivationError::Validation(user.to_string()));
        }

        self.enter(Phase::Checking, &activation_id, user);
        if let GuardDecision::Blocked { message } = self.guard.check(user, now) {
            agg_increment("block");
            return Err(ActivationError::Blocked(message));
        }

        self.enter(Phase::Pricing, &activation_id, user);
        let period_key = period::period_key(now);
        let count = self
            .counters
            .get(user, &period_key)
            .map_err(ActivationError::Storage)?;
        let prev_radius = self.areas.last_radius(user).map_err(ActivationError::Storage)?;
        let generation = self
            .areas
            .last_generation(user)
            .map_err(ActivationError::Storage)?
            + 1;

        // The pricing regime is keyed on the unclamped shrink target:
        // escalated pricing engages on the activation whose shrink the
        // floor clamps, and stays engaged while the area sits at the floor.
        let candidate = self.radius.shrink_candidate(prev_radius);
        let regime = Regime::for_radius(candidate, self.pricing.floor_m);
        let cost = self.pricing.activation_cost(count, candidate);
        let next_radius = self.radius.next_radius(prev_radius);
        log_price_quote(user.as_str(), regime.as_str(), count, candidate, cost);

        self.enter(Phase::Charging, &activation_id, user);
        let key = idempotency_key(user, &period_key, generation);
        let charge_window = Duration::from_millis(self.cfg.charge_timeout_ms);
        let receipt = match timeout(charge_window, self.gateway.charge(user, cost, &key)).await {
            Err(_) => {
                agg_increment("payment_failure");
                log_charge(&activation_id, user.as_str(), cost, "timeout", "");
                return Err(ActivationError::Payment("charge timed out".to_string()));
            }
            Ok(Err(err)) => {
                agg_increment("payment_failure");
                log_charge(&activation_id, user.as_str(), cost, "failed", &err.to_string());
                return Err(ActivationError::Payment(err.to_string()));
            }
            Ok(Ok(receipt)) => receipt,
        };
        log_charge(&activation_id, user.as_str(), cost, "captured", &receipt.charge_id);

        self.enter(Phase::Committing, &activation_id, user);
        let committed_count = self
            .counters
            .get_and_increment(user, &period_key)
            .map_err(ActivationError::Storage)?;
        if committed_count != count {
            // A concurrent activation won the commit race; the quote this
            // call charged was one step stale.
            log(
                Level::Warn,
                Domain::Store,
                "stale_quote",
                obj(&[
                    ("activation_id", v_str(&activation_id)),
                    ("quoted_count", v_num(count as f64)),
                    ("committed_count", v_num(committed_count as f64)),
                ]),
            );
        }

        let (lat, lng) = coords.unwrap_or((self.cfg.campaign_lat, self.cfg.campaign_lng));
        self.areas
            .put_new_area(&SearchArea {
                user: user.clone(),
                lat,
                lng,
                radius_m: next_radius,
                generation,
                created_at: now,
            })
            .map_err(ActivationError::Storage)?;
        log_radius_update(user.as_str(), prev_radius, next_radius, generation);

        if matches!(regime, Regime::Escalated) {
            agg_increment("escalation");
            // Best-effort after the charge is committed: a flag write
            // failure must not void a captured activation.
            if let Err(err) = self
                .warn
                .warn_once(user, RADIUS_FLOOR_WARN_KEY, RADIUS_FLOOR_WARN_MSG, now)
            {
                log(
                    Level::Warn,
                    Domain::Store,
                    "warn_flag_error",
                    obj(&[
                        ("user_id", v_str(user.as_str())),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
            }
        }

        let clue = self.clues.pick(next_radius);
        agg_increment("activation");
        self.enter(Phase::Done, &activation_id, user);
        log_activation(
            &activation_id,
            user.as_str(),
            generation,
            cost,
            next_radius,
            ClueTier::for_radius(next_radius).as_str(),
        );

        Ok(Activation {
            cost,
            radius_m: next_radius,
            clue,
            generation,
        })
    }
}
