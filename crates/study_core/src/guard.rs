//! Usage gates: one burst limiter plus one daily quota per kind of usage.
//!
//! The two axes are independent. A request must pass the burst limiter first;
//! a burst rejection does not consume daily quota.

use serde::Serialize;
use tracing::info;

use crate::quota::DailyQuotaTracker;
use crate::rate_limit::RateLimiter;
use crate::tier::{limits_for, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Upload,
    Chat,
}

impl UsageKind {
    fn daily_limit(&self, tier: Tier) -> u32 {
        let limits = limits_for(tier);
        match self {
            UsageKind::Upload => limits.daily_uploads,
            UsageKind::Chat => limits.daily_chats,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            UsageKind::Upload => "uploads",
            UsageKind::Chat => "chat messages",
        }
    }
}

/// A policy rejection with a message that can be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "axis", rename_all = "lowercase")]
pub enum Rejection {
    Burst { retry_after_secs: u64, message: String },
    Daily { limit: u32, message: String },
}

impl Rejection {
    pub fn message(&self) -> &str {
        match self {
            Rejection::Burst { message, .. } | Rejection::Daily { message, .. } => message,
        }
    }
}

pub struct UsageGate {
    kind: UsageKind,
    burst: RateLimiter,
    daily: DailyQuotaTracker,
}

impl UsageGate {
    pub fn new(kind: UsageKind, burst: RateLimiter, daily: DailyQuotaTracker) -> Self {
        Self { kind, burst, daily }
    }

    pub fn kind(&self) -> UsageKind {
        self.kind
    }

    /// Consumes one unit on both axes, or explains why the request must wait.
    ///
    /// An exhausted daily quota is refused before the burst window records
    /// anything. Units are not refunded if the admitted work later fails.
    pub fn admit(&self, tier: Tier) -> Result<(), Rejection> {
        let limit = self.kind.daily_limit(tier);
        if self.daily.is_exhausted(limit) {
            return Err(self.daily_rejection(tier, limit));
        }

        if !self.burst.check() {
            let wait = self.burst.retry_after().as_secs().max(1);
            info!(kind = ?self.kind, wait, "Burst limit reached");
            return Err(Rejection::Burst {
                retry_after_secs: wait,
                message: format!(
                    "Too many {} in a short time. Please wait {} second{} and try again.",
                    self.kind.noun(),
                    wait,
                    if wait == 1 { "" } else { "s" }
                ),
            });
        }

        if !self.daily.check(limit) {
            return Err(self.daily_rejection(tier, limit));
        }
        Ok(())
    }

    fn daily_rejection(&self, tier: Tier, limit: u32) -> Rejection {
        info!(kind = ?self.kind, limit, "Daily quota reached");
        Rejection::Daily {
            limit,
            message: format!(
                "Daily limit of {} {} reached for the {} tier. It resets tomorrow.",
                limit,
                self.kind.noun(),
                limits_for(tier).label
            ),
        }
    }

    /// Daily units left for `tier`.
    pub fn remaining(&self, tier: Tier) -> u32 {
        self.daily.remaining(self.kind.daily_limit(tier))
    }
}
