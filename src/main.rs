use std::sync::Arc;

use anyhow::{anyhow, Result};

use buzzcore::auth::{AuthProvider, EnvAuth};
use buzzcore::config::Config;
use buzzcore::logging::{json_log, obj, v_num, v_str};
use buzzcore::notify::LogNotifier;
use buzzcore::orchestrator::{BuzzOrchestrator, Collaborators};
use buzzcore::payment::{HttpGateway, NullGateway, PaymentGateway};
use buzzcore::store::SqliteStore;

/// Ops entry point: wires real collaborators from the environment and
/// runs a single activation for the session user (BUZZ_USER).
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "startup",
        obj(&[
            ("config_hash", v_str(&cfg.config_hash())),
            ("sqlite_path", v_str(&cfg.sqlite_path)),
        ]),
    );

    let store = Arc::new(SqliteStore::open(&cfg.sqlite_path)?);
    store.init()?;

    // Use the real gateway if payment keys are provided, otherwise stub
    let gateway: Box<dyn PaymentGateway> = match (&cfg.api_key, &cfg.api_secret) {
        (Some(_), Some(_)) => {
            json_log("gateway", obj(&[("type", v_str("http")), ("status", v_str("live"))]));
            Box::new(HttpGateway::new(&cfg)?)
        }
        _ => {
            json_log("gateway", obj(&[("type", v_str("null")), ("status", v_str("stub"))]));
            Box::new(NullGateway)
        }
    };

    let user = EnvAuth
        .current_user()
        .ok_or_else(|| anyhow!("no session user (set BUZZ_USER)"))?;

    let orchestrator = BuzzOrchestrator::new(
        cfg,
        Collaborators::from_store(store, gateway, Box::new(LogNotifier)),
    );

    let quote = orchestrator.quote(&user).map_err(|e| anyhow!(e.to_string()))?;
    json_log(
        "quote",
        obj(&[
            ("user_id", v_str(user.as_str())),
            ("cost", v_num(quote.cost)),
            ("next_radius_m", v_num(quote.next_radius_m)),
        ]),
    );

    match orchestrator.activate(&user, None).await {
        Ok(activation) => {
            json_log(
                "activation_result",
                obj(&[
                    ("user_id", v_str(user.as_str())),
                    ("cost", v_num(activation.cost)),
                    ("radius_m", v_num(activation.radius_m)),
                    ("generation", v_num(activation.generation as f64)),
                    ("clue", v_str(&activation.clue)),
                ]),
            );
            Ok(())
        }
        Err(err) => {
            json_log(
                "activation_error",
                obj(&[
                    ("user_id", v_str(user.as_str())),
                    ("error", v_str(&err.to_string())),
                ]),
            );
            Err(anyhow!(err.to_string()))
        }
    }
}
