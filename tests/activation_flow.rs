//! End-to-end validation of the activation engine: the full pricing and
//! radius escalation arc, failure isolation, and the concurrency
//! guarantee on the period counter.
//!
//! Everything runs on in-memory stores with stub gateways; no network,
//! no disk.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use buzzcore::auth::UserId;
use buzzcore::config::Config;
use buzzcore::notify::Notifier;
use buzzcore::orchestrator::{ActivationError, BuzzOrchestrator, Collaborators};
use buzzcore::payment::{ChargeReceipt, NullGateway, PaymentGateway};
use buzzcore::period;
use buzzcore::store::{AbuseLog, CounterStore, MemoryStore};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Captures every charge request, optionally refusing them all.
struct RecordingGateway {
    charges: Mutex<Vec<(f64, String)>>,
    refuse: bool,
}

impl RecordingGateway {
    fn accepting() -> Self {
        Self { charges: Mutex::new(Vec::new()), refuse: false }
    }

    fn refusing() -> Self {
        Self { charges: Mutex::new(Vec::new()), refuse: true }
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, _: &UserId, amount: f64, key: &str) -> Result<ChargeReceipt> {
        self.charges.lock().unwrap().push((amount, key.to_string()));
        if self.refuse {
            return Err(anyhow!("card declined"));
        }
        Ok(ChargeReceipt { charge_id: format!("ch-{}", key), amount, ts: 0 })
    }
}

/// Never answers within any reasonable charge timeout.
struct SlowGateway;

#[async_trait]
impl PaymentGateway for SlowGateway {
    async fn charge(&self, _: &UserId, amount: f64, _: &str) -> Result<ChargeReceipt> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(ChargeReceipt { charge_id: "late".to_string(), amount, ts: 0 })
    }
}

struct CountingNotifier(Arc<AtomicU32>);

impl Notifier for CountingNotifier {
    fn notify(&self, _: &UserId, _: &str, _: &str) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _: &UserId, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

/// Config for rapid-fire scenarios: the guard window is exercised by its
/// own tests, not by loops that would trip it incidentally.
fn rapid_cfg() -> Config {
    let mut cfg = Config::from_env();
    cfg.abuse_max_attempts = 1_000_000;
    cfg
}

// ---------------------------------------------------------------------------
// A01-A02: Opening activations follow the linear ramp
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a01_first_activation_baseline() {
    let store = Arc::new(MemoryStore::new());
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store, Box::new(NullGateway), Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a01");

    let first = orch.activate(&user, None).await.unwrap();
    assert!((first.cost - 7.99).abs() < 1e-9, "first buzz costs the base price");
    assert_eq!(first.radius_m, 100_000.0);
    assert_eq!(first.generation, 1);
}

#[tokio::test]
async fn a02_second_activation_adds_one_unit_and_shrinks() {
    let store = Arc::new(MemoryStore::new());
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store, Box::new(NullGateway), Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a02");

    orch.activate(&user, None).await.unwrap();
    let second = orch.activate(&user, None).await.unwrap();
    assert!((second.cost - 8.99).abs() < 1e-9);
    assert_eq!(second.radius_m, 95_000.0);
    assert_eq!(second.generation, 2);
}

// ---------------------------------------------------------------------------
// A03: Full arc — floor clamp flips the regime, warning fires once
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a03_escalation_and_one_time_warning() {
    let store = Arc::new(MemoryStore::new());
    let warnings = Arc::new(AtomicU32::new(0));
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(
            store.clone(),
            Box::new(NullGateway),
            Box::new(CountingNotifier(warnings.clone())),
        ),
    );
    let user = UserId::from("u-a03");

    let mut first_escalated = None;
    let mut prev_radius = f64::INFINITY;
    for n in 1..=70u32 {
        let result = orch.activate(&user, None).await.unwrap();
        assert_eq!(result.generation, n);
        assert!(result.radius_m <= prev_radius);
        assert!(result.radius_m >= 5_000.0);
        prev_radius = result.radius_m;

        let linear = 7.99 + (n - 1) as f64;
        if first_escalated.is_none() && (result.cost - linear).abs() > 1e-9 {
            first_escalated = Some((n, result.cost));
            assert_eq!(result.radius_m, 5_000.0, "escalation coincides with the floor clamp");
        }
    }

    // From a cold start the shrink first crosses the floor on buzz 60.
    let (generation, cost) = first_escalated.expect("escalated regime never engaged");
    assert_eq!(generation, 60);
    let expected = 29.99 * 1.10_f64.powi(59);
    assert!((cost - expected).abs() < 1e-6, "expected {}, got {}", expected, cost);

    // Many activations ran at the floor, but the threshold warning is
    // delivered exactly once.
    assert_eq!(warnings.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// A04: Payment failure leaves no trace
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a04_payment_failure_commits_nothing() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Box::new(RecordingGateway::refusing());
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store.clone(), gateway, Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a04");

    let err = orch.activate(&user, None).await.unwrap_err();
    assert!(matches!(err, ActivationError::Payment(_)));
    assert_eq!(store.get(&user, &period::current_period()).unwrap(), 0);
    assert!(store.areas_for(&user).is_empty());
}

// ---------------------------------------------------------------------------
// A05: Blocked users are never charged
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a05_blocked_attempt_never_reaches_the_gateway() {
    let store = Arc::new(MemoryStore::new());
    let now = period::now_ts();
    for _ in 0..5 {
        store.append(&UserId::from("u-a05"), now).unwrap();
    }

    let gateway = RecordingGateway::accepting();
    let charges = Arc::new(gateway);
    struct Fwd(Arc<RecordingGateway>);
    #[async_trait]
    impl PaymentGateway for Fwd {
        async fn charge(&self, u: &UserId, a: f64, k: &str) -> Result<ChargeReceipt> {
            self.0.charge(u, a, k).await
        }
    }

    let orch = BuzzOrchestrator::new(
        Config::from_env(),
        Collaborators::from_store(
            store.clone(),
            Box::new(Fwd(charges.clone())),
            Box::new(SilentNotifier),
        ),
    );
    let user = UserId::from("u-a05");

    let err = orch.activate(&user, None).await.unwrap_err();
    match err {
        ActivationError::Blocked(message) => {
            assert_eq!(message, "too many attempts, retry shortly")
        }
        other => panic!("expected Blocked, got {:?}", other),
    }
    assert!(charges.charges.lock().unwrap().is_empty());
    assert_eq!(store.get(&user, &period::current_period()).unwrap(), 0);
}

// ---------------------------------------------------------------------------
// A06: Charge timeout behaves like a payment failure
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a06_charge_timeout_fails_closed() {
    let store = Arc::new(MemoryStore::new());
    let mut cfg = rapid_cfg();
    cfg.charge_timeout_ms = 50;
    let orch = BuzzOrchestrator::new(
        cfg,
        Collaborators::from_store(store.clone(), Box::new(SlowGateway), Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a06");

    let err = orch.activate(&user, None).await.unwrap_err();
    match err {
        ActivationError::Payment(message) => assert!(message.contains("timed out")),
        other => panic!("expected Payment, got {:?}", other),
    }
    assert_eq!(store.get(&user, &period::current_period()).unwrap(), 0);
    assert!(store.areas_for(&user).is_empty());
}

// ---------------------------------------------------------------------------
// A07: N simultaneous activations, counter ends at exactly N
// ---------------------------------------------------------------------------
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a07_concurrent_activations_lose_no_counts() {
    let store = Arc::new(MemoryStore::new());
    let orch = Arc::new(BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store.clone(), Box::new(NullGateway), Box::new(SilentNotifier)),
    ));
    let user = UserId::from("u-a07");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = orch.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move { orch.activate(&user, None).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get(&user, &period::current_period()).unwrap(), 8);
    assert_eq!(store.areas_for(&user).len(), 8);
}

// ---------------------------------------------------------------------------
// A08: Distinct users do not interfere
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a08_users_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store.clone(), Box::new(NullGateway), Box::new(SilentNotifier)),
    );

    let alice = UserId::from("u-alice");
    let bob = UserId::from("u-bob");
    for _ in 0..3 {
        orch.activate(&alice, None).await.unwrap();
    }
    let bob_first = orch.activate(&bob, None).await.unwrap();

    assert!((bob_first.cost - 7.99).abs() < 1e-9, "bob's counter starts at zero");
    assert_eq!(bob_first.radius_m, 100_000.0);
    assert_eq!(store.get(&alice, &period::current_period()).unwrap(), 3);
    assert_eq!(store.get(&bob, &period::current_period()).unwrap(), 1);
}

// ---------------------------------------------------------------------------
// A09: Idempotency keys advance with the generation
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a09_charge_keys_are_unique_per_activation() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RecordingGateway::accepting());
    struct Fwd(Arc<RecordingGateway>);
    #[async_trait]
    impl PaymentGateway for Fwd {
        async fn charge(&self, u: &UserId, a: f64, k: &str) -> Result<ChargeReceipt> {
            self.0.charge(u, a, k).await
        }
    }

    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store, Box::new(Fwd(gateway.clone())), Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a09");

    orch.activate(&user, None).await.unwrap();
    orch.activate(&user, None).await.unwrap();

    let charges = gateway.charges.lock().unwrap();
    assert_eq!(charges.len(), 2);
    assert_ne!(charges[0].1, charges[1].1);
    assert!((charges[0].0 - 7.99).abs() < 1e-9);
    assert!((charges[1].0 - 8.99).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// A10: Caller coordinates land in the persisted area
// ---------------------------------------------------------------------------
#[tokio::test]
async fn a10_explicit_coordinates_are_persisted() {
    let store = Arc::new(MemoryStore::new());
    let orch = BuzzOrchestrator::new(
        rapid_cfg(),
        Collaborators::from_store(store.clone(), Box::new(NullGateway), Box::new(SilentNotifier)),
    );
    let user = UserId::from("u-a10");

    orch.activate(&user, Some((41.3874, 2.1686))).await.unwrap();
    let areas = store.areas_for(&user);
    assert_eq!(areas.len(), 1);
    assert!((areas[0].lat - 41.3874).abs() < 1e-9);
    assert!((areas[0].lng - 2.1686).abs() < 1e-9);
}
