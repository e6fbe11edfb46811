//! Tiering Core - scoring and wagering engine.
//!
//! Prices bets from stated odds, keeps every user's running point total in a
//! synchronized ledger, ranks users and classifies them into tiers. Optional
//! Python bindings via PyO3 (`python` feature).

pub mod bet;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
mod feed_time;
pub mod ledger;
pub mod odds;
pub mod projection;
pub mod tier;
pub mod user;

#[cfg(feature = "python")]
pub mod python;

/// Opaque user identifier
pub type UserId = u64;

/// Signed point amount
pub type Points = i64;

pub use bet::{Bet, BetId, BetOutcome};
pub use config::{EngineConfig, RefinementRewards, ReportPolicy, WageringConfig};
pub use constants::DEFAULT_WAGER;
pub use error::{EngineError, Result};
pub use event::{Event, EventId};
pub use ledger::{DeltaReason, LedgerEntry, ReportOutcome, ScoreLedger};
pub use odds::{calculate_payout, decimal_odds, default_payout, implied_probability};
pub use projection::{
    all_bet_swings, bet_swing, project_standings, BetSwing, OpenPosition, Projection, TierOdds,
};
pub use tier::{classify, Tier, TierPolicy};
pub use user::{Creator, LeaderboardEntry, Standing, User};
