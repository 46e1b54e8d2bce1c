//! Pre-trade risk gate and per-engine risk accounting.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

/// Verdict returned by a risk gate consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub allowed: bool,
    pub reasons: Vec<String>,
}

impl RiskVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
        }
    }

    pub fn deny(reasons: Vec<String>) -> Self {
        Self {
            allowed: false,
            reasons,
        }
    }
}

/// Pluggable pre-trade veto, consulted before every submission.
///
/// Optional; absence means no veto beyond the engine's own
/// loss/drawdown limits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RiskGate: Send + Sync {
    async fn can_trade(&self) -> RiskVerdict;
}

/// A breached engine risk limit.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitBreach {
    DailyLoss { loss: Decimal, limit: Decimal },
    Drawdown { pct: Decimal, limit: Decimal },
}

impl std::fmt::Display for LimitBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitBreach::DailyLoss { loss, limit } => {
                write!(f, "daily loss ${} reached limit ${}", loss, limit)
            }
            LimitBreach::Drawdown { pct, limit } => {
                write!(f, "drawdown {:.2}% reached limit {}%", pct, limit)
            }
        }
    }
}

/// Point-in-time view of the risk counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub daily_loss: Decimal,
    pub daily_trades: u64,
    pub peak_equity: Decimal,
    pub current_drawdown_pct: Decimal,
    pub date: NaiveDate,
}

#[derive(Debug)]
struct RiskCounters {
    daily_loss: Decimal,
    daily_trades: u64,
    peak_equity: Decimal,
    current_drawdown_pct: Decimal,
    current_date: NaiveDate,
}

/// Per-engine risk accounting: daily loss, trade count, peak equity and
/// drawdown from peak. Daily counters reset lazily when the wall-clock
/// date advances.
pub struct RiskTracker {
    max_loss_per_day: Decimal,
    max_drawdown_percent: Decimal,
    counters: Mutex<RiskCounters>,
}

impl RiskTracker {
    pub fn new(max_loss_per_day: Decimal, max_drawdown_percent: Decimal) -> Self {
        Self {
            max_loss_per_day,
            max_drawdown_percent,
            counters: Mutex::new(RiskCounters {
                daily_loss: Decimal::ZERO,
                daily_trades: 0,
                peak_equity: Decimal::ZERO,
                current_drawdown_pct: Decimal::ZERO,
                current_date: Utc::now().date_naive(),
            }),
        }
    }

    /// Record one realized result and report any limit breach.
    ///
    /// Invariants maintained: `daily_loss >= 0`,
    /// `current_drawdown_pct` in [0, 100].
    pub fn update(&self, pnl: Decimal, equity: Decimal) -> Option<LimitBreach> {
        let mut counters = self.counters.lock().unwrap();

        // Lazy daily rollover
        let today = Utc::now().date_naive();
        if today != counters.current_date {
            info!(
                "Risk counters reset for new trading day {} (was {})",
                today, counters.current_date
            );
            counters.current_date = today;
            counters.daily_loss = Decimal::ZERO;
            counters.daily_trades = 0;
        }

        counters.daily_trades += 1;
        if pnl < Decimal::ZERO {
            counters.daily_loss += -pnl;
        }

        if equity >= counters.peak_equity {
            counters.peak_equity = equity;
            counters.current_drawdown_pct = Decimal::ZERO;
        } else if counters.peak_equity > Decimal::ZERO {
            counters.current_drawdown_pct =
                (counters.peak_equity - equity) / counters.peak_equity * Decimal::from(100);
        }

        debug!(
            "Risk update: pnl={} equity={} daily_loss={} drawdown={:.2}%",
            pnl, equity, counters.daily_loss, counters.current_drawdown_pct
        );

        if counters.daily_loss >= self.max_loss_per_day {
            return Some(LimitBreach::DailyLoss {
                loss: counters.daily_loss,
                limit: self.max_loss_per_day,
            });
        }
        if counters.current_drawdown_pct >= self.max_drawdown_percent {
            return Some(LimitBreach::Drawdown {
                pct: counters.current_drawdown_pct,
                limit: self.max_drawdown_percent,
            });
        }
        None
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let counters = self.counters.lock().unwrap();
        RiskSnapshot {
            daily_loss: counters.daily_loss,
            daily_trades: counters.daily_trades,
            peak_equity: counters.peak_equity,
            current_drawdown_pct: counters.current_drawdown_pct,
            date: counters.current_date,
        }
    }
}
