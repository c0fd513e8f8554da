//! Notification delivery with one-shot deduplication.
//!
//! The engine only ever warns a user once per key (the 5 km floor
//! crossing); the latch is persisted through `WarnFlags` so restarts do
//! not re-warn.

use std::sync::Arc;

use anyhow::Result;

use crate::auth::UserId;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::store::WarnFlags;

pub trait Notifier: Send + Sync {
    fn notify(&self, user: &UserId, key: &str, message: &str) -> Result<()>;
}

/// Delivery through the structured log. Real push/email delivery lives in
/// the surrounding application; this is the in-process default.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user: &UserId, key: &str, message: &str) -> Result<()> {
        log(
            Level::Info,
            Domain::Gameplay,
            "notification",
            obj(&[
                ("user_id", v_str(user.as_str())),
                ("key", v_str(key)),
                ("msg", v_str(message)),
            ]),
        );
        Ok(())
    }
}

pub struct WarnOnce {
    flags: Arc<dyn WarnFlags>,
    notifier: Box<dyn Notifier>,
}

impl WarnOnce {
    pub fn new(flags: Arc<dyn WarnFlags>, notifier: Box<dyn Notifier>) -> Self {
        Self { flags, notifier }
    }

    /// Deliver at most once per (user, key). Returns whether a delivery
    /// happened.
    pub fn warn_once(&self, user: &UserId, key: &str, message: &str, now: u64) -> Result<bool> {
        if self.flags.is_set(user, key)? {
            return Ok(false);
        }
        self.notifier.notify(user, key, message)?;
        self.flags.set(user, key, now)?;
        Ok(true)
    }
}
