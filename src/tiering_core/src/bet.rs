use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::odds::{calculate_payout, implied_probability};
use crate::user::Creator;
use crate::Points;

pub type BetId = u64;

/// Resolution state of a bet. Moves from `Unresolved` exactly once.
///
/// Feeds encode this as `actualOutcome: true | false | null`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum BetOutcome {
    #[default]
    Unresolved,
    Won,
    Lost,
}

impl BetOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, BetOutcome::Unresolved)
    }
}

impl From<Option<bool>> for BetOutcome {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => BetOutcome::Unresolved,
            Some(true) => BetOutcome::Won,
            Some(false) => BetOutcome::Lost,
        }
    }
}

impl From<BetOutcome> for Option<bool> {
    fn from(outcome: BetOutcome) -> Self {
        match outcome {
            BetOutcome::Unresolved => None,
            BetOutcome::Won => Some(true),
            BetOutcome::Lost => Some(false),
        }
    }
}

/// A wager offered on the bets feed.
///
/// Wagers are not escrowed: a win credits `payout_points - wager_points`, a
/// loss debits `loss_points`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: BetId,

    pub description: String,

    #[serde(default)]
    pub creator: Creator,

    #[serde(default)]
    pub target: Option<String>,

    pub wager_points: Points,

    /// Stated chance of winning, in percent
    #[serde(default, alias = "probability")]
    pub win_probability: Option<f64>,

    /// Total returned on a win (wager plus profit)
    pub payout_points: Points,

    pub loss_points: Points,

    #[serde(
        default,
        alias = "time",
        alias = "resolutionDate",
        deserialize_with = "crate::feed_time::deserialize_optional"
    )]
    pub resolves_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "actualOutcome")]
    pub outcome: BetOutcome,
}

impl Bet {
    /// Create a fair bet, pricing the payout from the stated probability.
    pub fn fair(
        id: BetId,
        description: impl Into<String>,
        creator: Creator,
        wager_points: Points,
        win_probability: f64,
    ) -> Result<Self> {
        let payout_points = calculate_payout(win_probability, wager_points)?;
        Ok(Bet {
            id,
            description: description.into(),
            creator,
            target: None,
            wager_points,
            win_probability: Some(win_probability),
            payout_points,
            loss_points: wager_points,
            resolves_at: None,
            outcome: BetOutcome::Unresolved,
        })
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_loss_points(mut self, loss_points: Points) -> Self {
        self.loss_points = loss_points;
        self
    }

    pub fn with_resolution(mut self, resolves_at: DateTime<Utc>) -> Self {
        self.resolves_at = Some(resolves_at);
        self
    }

    /// Whether the payout matches the odds calculator for the stated probability.
    ///
    /// Bets without a stated probability are priced by their creator and are
    /// never fair by this definition.
    pub fn is_fair(&self) -> bool {
        match self.win_probability {
            Some(p) => calculate_payout(p, self.wager_points)
                .map(|payout| payout == self.payout_points)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Stated win probability, or the one implied by payout and wager.
    pub fn effective_probability(&self) -> Result<f64> {
        match self.win_probability {
            Some(p) if p.is_nan() => Err(EngineError::InvalidProbability(p)),
            Some(p) => Ok(p.clamp(0.0, 100.0)),
            None => implied_probability(self.payout_points, self.wager_points),
        }
    }

    /// Points the bettor gains (or loses) if the bet resolves this way.
    pub fn delta_for(&self, won: bool) -> Result<Points> {
        if self.wager_points <= 0 {
            return Err(EngineError::InvalidWager(self.wager_points));
        }
        if won {
            self.payout_points
                .checked_sub(self.wager_points)
                .ok_or(EngineError::Overflow)
        } else {
            self.loss_points.checked_neg().ok_or(EngineError::Overflow)
        }
    }

    /// Settlement delta for an unresolved bet.
    pub fn settlement_delta(&self, won: bool) -> Result<Points> {
        if self.outcome.is_resolved() {
            return Err(EngineError::BetAlreadyResolved(self.id));
        }
        self.delta_for(won)
    }

    /// Move the bet to its terminal outcome.
    pub fn resolve(&mut self, won: bool) -> Result<BetOutcome> {
        if self.outcome.is_resolved() {
            return Err(EngineError::BetAlreadyResolved(self.id));
        }
        self.outcome = if won { BetOutcome::Won } else { BetOutcome::Lost };
        Ok(self.outcome)
    }
}
