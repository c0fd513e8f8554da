use std::sync::Arc;

use crate::auth::UserId;
use crate::config::Config;
use crate::logging::{log, log_guard_check, obj, v_str, Domain, Level};
use crate::store::AbuseLog;

pub struct AbuseGuard {
    log: Arc<dyn AbuseLog>,
    window_secs: u64,
    max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Allowed,
    Blocked { message: String },
}


impl AbuseGuard {
    pub fn new(log: Arc<dyn AbuseLog>, cfg: &Config) -> Self {
        Self {
            log,
            window_secs: cfg.abuse_window_secs,
            max_attempts: cfg.abuse_max_attempts,
        }
    }

    /// Sliding-window rate check. Counts attempts within the last
    /// `window_secs` measured back from `now`; at or above the threshold
    /// the attempt is blocked and NOT logged. Storage errors fail open:
    /// gameplay is never held hostage by the abuse log, but every
    /// fail-open event is visible in the guard domain.
    pub fn check(&self, user: &UserId, now: u64) -> GuardDecision {
        let recent = match self.log.recent_count(user, self.window_secs, now) {
            Ok(n) => n,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Guard,
                    "fail_open",
                    obj(&[
                        ("user_id", v_str(user.as_str())),
                        ("stage", v_str("recent_count")),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                return GuardDecision::Allowed;
            }
        };

        if recent >= self.max_attempts {
            log_guard_check(user.as_str(), "block", recent, self.max_attempts);
            return GuardDecision::Blocked {
                message: "too many attempts, retry shortly".to_string(),
            };
        }

        log_guard_check(user.as_str(), "pass", recent, self.max_attempts);
        if let Err(err) = self.log.append(user, now) {
            log(
                Level::Warn,
                Domain::Guard,
                "fail_open",
                obj(&[
                    ("user_id", v_str(user.as_str())),
                    ("stage", v_str("append")),
                    ("error", v_str(&err.to_string())),
                ]),
            );
        }
        GuardDecision::Allowed
    }
}
