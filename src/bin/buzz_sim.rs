//! Synthetic load simulation for the activation engine.
//!
//! Drives N users through M activations each on in-memory stores with a
//! stub gateway, prints the cost/radius escalation curve for the first
//! user and checks the core invariants along the way.
//!
//! Usage: cargo run --release --bin buzz_sim

use std::sync::Arc;

use buzzcore::auth::UserId;
use buzzcore::config::Config;
use buzzcore::logging::tick_aggregator;
use buzzcore::notify::LogNotifier;
use buzzcore::orchestrator::{BuzzOrchestrator, Collaborators};
use buzzcore::payment::NullGateway;
use buzzcore::store::MemoryStore;

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let n_users = env_usize("SIM_USERS", 4);
    let n_activations = env_usize("SIM_ACTIVATIONS", 70);

    let mut cfg = Config::from_env();
    // The synthetic loop fires far faster than the live guard window
    // allows; the guard path is exercised by its own tests.
    cfg.abuse_max_attempts = u32::MAX;

    let store = Arc::new(MemoryStore::new());
    let orchestrator = BuzzOrchestrator::new(
        cfg.clone(),
        Collaborators::from_store(store, Box::new(NullGateway), Box::new(LogNotifier)),
    );

    println!("# users={} activations={} base={}", n_users, n_activations, cfg.base_price);
    println!("# gen\tcost\tradius_m");

    for u in 0..n_users {
        let user = UserId::new(format!("sim-{:03}", u));
        let mut prev_radius = f64::INFINITY;
        let mut escalated_at = None;

        for _ in 0..n_activations {
            let result = orchestrator.activate(&user, None).await?;

            assert!(result.radius_m <= prev_radius, "radius must never widen");
            assert!(result.radius_m >= cfg.radius_floor_m, "radius must respect the floor");
            let linear = cfg.base_price + (result.generation - 1) as f64;
            if escalated_at.is_none() && (result.cost - linear).abs() > 1e-9 {
                escalated_at = Some(result.generation);
            }
            prev_radius = result.radius_m;

            if u == 0 {
                println!("{}\t{:.2}\t{:.0}", result.generation, result.cost, result.radius_m);
            }
            tick_aggregator();
        }

        match escalated_at {
            Some(generation) => {
                println!("# user {} escalated at generation {}", user, generation)
            }
            None => println!("# user {} never escalated ({} activations)", user, n_activations),
        }
    }

    Ok(())
}
