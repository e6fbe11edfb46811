//! The score ledger: sole owner of every user's running total.
//!
//! All state sits behind one [`RwLock`]. Each mutation runs inside a single
//! write-lock section and each multi-value query (standing, leaderboard)
//! inside a single read-lock section, so a reader never observes a delta
//! half-applied or a rank and tier computed from different states.
//!
//! Ordering is total points descending; equal totals rank by registration
//! order, earliest first.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::bet::{Bet, BetId};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::event::{Event, EventId};
use crate::tier::{Tier, TierPolicy};
use crate::user::{LeaderboardEntry, Standing, User};
use crate::{Points, UserId};

/// Why a delta was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaReason {
    Manual,
    EventReward { event: EventId },
    BetWon { bet: BetId },
    BetLost { bet: BetId },
    ReportPenalty { reporter: UserId },
    ReportBonus { target: UserId },
    CompliancePenalty,
    Refinement { items: u32 },
    RefinementBonus,
    Override,
}

/// One applied delta in the append-only history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub user_id: UserId,
    pub delta: Points,
    /// Total after this delta
    pub balance: Points,
    pub reason: DeltaReason,
    pub recorded_at: DateTime<Utc>,
}

/// Point movements of one citizen report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    pub target_points_lost: Points,
    pub report_points_earned: Points,
    pub target_total: Points,
    pub reporter_total: Points,
}

#[derive(Clone, Debug)]
struct Account {
    user: User,
    joined: u64,
}

/// Whether `a` ranks ahead of `b`.
fn ranks_ahead(a_total: Points, a_joined: u64, b_total: Points, b_joined: u64) -> bool {
    match a_total.cmp(&b_total) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a_joined < b_joined,
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<UserId, Account>,
    next_joined: u64,
    history: Vec<LedgerEntry>,
    /// `(event, user)` pairs whose reward has been applied
    claims: HashSet<(EventId, UserId)>,
    /// `(bet, bettor)` pairs already settled
    settlements: HashSet<(BetId, UserId)>,
}

impl LedgerState {
    fn account(&self, id: UserId) -> Result<&Account> {
        self.accounts.get(&id).ok_or(EngineError::UnknownUser(id))
    }

    /// Rank a hypothetical total would hold for `id`, all other users unchanged.
    fn rank_with_total(&self, id: UserId, total: Points) -> Result<usize> {
        let joined = self.account(id)?.joined;
        let ahead = self
            .accounts
            .values()
            .filter(|other| other.user.id != id)
            .filter(|other| ranks_ahead(other.user.total_points, other.joined, total, joined))
            .count();
        Ok(ahead + 1)
    }

    fn rank_of(&self, id: UserId) -> Result<usize> {
        let total = self.account(id)?.user.total_points;
        self.rank_with_total(id, total)
    }

    fn ordered(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| {
            b.user
                .total_points
                .cmp(&a.user.total_points)
                .then(a.joined.cmp(&b.joined))
        });
        accounts
    }

    fn standing_with_total(&self, id: UserId, total: Points, policy: &TierPolicy) -> Result<Standing> {
        let account = self.account(id)?;
        let rank = self.rank_with_total(id, total)?;
        let population = self.accounts.len();
        Ok(Standing {
            user_id: id,
            display_name: account.user.display_name.clone(),
            rank,
            tier: policy.classify(rank, population)?,
            total_points: total,
            population,
        })
    }

    fn standing(&self, id: UserId, policy: &TierPolicy) -> Result<Standing> {
        let total = self.account(id)?.user.total_points;
        self.standing_with_total(id, total, policy)
    }

    fn tier_of(&self, id: UserId, policy: &TierPolicy) -> Result<Tier> {
        let rank = self.rank_of(id)?;
        policy.classify(rank, self.accounts.len())
    }

    /// Check, commit and log one delta. Returns the new total.
    fn apply(&mut self, id: UserId, delta: Points, reason: DeltaReason, policy: &TierPolicy) -> Result<Points> {
        let before = self.account(id)?.user.total_points;
        let balance = before.checked_add(delta).ok_or(EngineError::Overflow)?;
        let tier_before = self.tier_of(id, policy).ok();

        self.commit(id, delta, balance, reason);
        debug!(user = id, delta, total = balance, "ledger: delta applied");

        let tier_after = self.tier_of(id, policy).ok();
        if let (Some(from), Some(to)) = (tier_before, tier_after) {
            if from != to {
                info!(user = id, from = %from, to = %to, "ledger: tier changed");
            }
        }
        Ok(balance)
    }

    /// Apply a delta that has already been validated against overflow.
    fn commit(&mut self, id: UserId, delta: Points, balance: Points, reason: DeltaReason) {
        if let Some(account) = self.accounts.get_mut(&id) {
            account.user.total_points = balance;
        }
        let sequence = self.history.len() as u64;
        self.history.push(LedgerEntry {
            sequence,
            user_id: id,
            delta,
            balance,
            reason,
            recorded_at: Utc::now(),
        });
    }
}

/// In-memory ledger of user totals.
///
/// `ScoreLedger` is `Send + Sync`; share it behind an `Arc` when several
/// callers need it.
pub struct ScoreLedger {
    config: EngineConfig,
    state: RwLock<LedgerState>,
}

impl Default for ScoreLedger {
    fn default() -> Self {
        ScoreLedger {
            config: EngineConfig::default(),
            state: RwLock::new(LedgerState::default()),
        }
    }
}

impl ScoreLedger {
    /// Create an empty ledger; the config is validated first.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(ScoreLedger {
            config,
            state: RwLock::new(LedgerState::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a user with a zero total.
    pub fn register(&self, id: UserId, display_name: impl Into<String>) -> Result<()> {
        self.register_user(User::new(id, display_name))
    }

    /// Register a user with an opening total (e.g. loaded from a feed).
    pub fn register_with_total(
        &self,
        id: UserId,
        display_name: impl Into<String>,
        total_points: Points,
    ) -> Result<()> {
        self.register_user(User::new(id, display_name).with_total(total_points))
    }

    pub fn register_user(&self, user: User) -> Result<()> {
        let mut state = self.state.write();
        if state.accounts.contains_key(&user.id) {
            return Err(EngineError::DuplicateUser(user.id));
        }
        let joined = state.next_joined;
        state.next_joined += 1;
        info!(user = user.id, name = %user.display_name, total = user.total_points, "ledger: user registered");
        state.accounts.insert(user.id, Account { user, joined });
        Ok(())
    }

    /// Add `delta` to a user's total. Returns the new total.
    pub fn apply_delta(&self, id: UserId, delta: Points) -> Result<Points> {
        self.apply(id, delta, DeltaReason::Manual)
    }

    /// Add `delta` to a user's total, recording why.
    pub fn apply(&self, id: UserId, delta: Points, reason: DeltaReason) -> Result<Points> {
        self.state.write().apply(id, delta, reason, &self.config.tiers)
    }

    /// Apply several deltas atomically.
    ///
    /// Every id and every sum is checked before any total changes; on error
    /// the ledger is untouched. Returns the balance after each delta, in order.
    pub fn apply_batch(&self, deltas: &[(UserId, Points, DeltaReason)]) -> Result<Vec<Points>> {
        let mut state = self.state.write();

        let mut staged: HashMap<UserId, Points> = HashMap::new();
        let mut balances = Vec::with_capacity(deltas.len());
        for (id, delta, _) in deltas {
            let current = match staged.get(id) {
                Some(total) => *total,
                None => state.account(*id)?.user.total_points,
            };
            let balance = current.checked_add(*delta).ok_or(EngineError::Overflow)?;
            staged.insert(*id, balance);
            balances.push(balance);
        }

        for ((id, delta, reason), balance) in deltas.iter().zip(&balances) {
            state.commit(*id, *delta, *balance, reason.clone());
            debug!(user = *id, delta = *delta, total = *balance, "ledger: batched delta applied");
        }
        Ok(balances)
    }

    /// File a report: the target loses points and the reporter earns some.
    pub fn report(&self, reporter: UserId, target: UserId) -> Result<ReportOutcome> {
        if reporter == target {
            warn!(user = reporter, "ledger: self-report rejected");
            return Err(EngineError::SelfReport(reporter));
        }
        let policy = &self.config.reports;
        let balances = self.apply_batch(&[
            (target, -policy.target_penalty, DeltaReason::ReportPenalty { reporter }),
            (reporter, policy.reporter_bonus, DeltaReason::ReportBonus { target }),
        ])?;
        info!(reporter, target, "ledger: report filed");
        Ok(ReportOutcome {
            target_points_lost: policy.target_penalty,
            report_points_earned: policy.reporter_bonus,
            target_total: balances[0],
            reporter_total: balances[1],
        })
    }

    /// Debit a compliance penalty. `penalty_points` is the magnitude.
    pub fn apply_compliance_penalty(&self, id: UserId, penalty_points: Points) -> Result<Points> {
        if penalty_points < 0 {
            return Err(EngineError::InvalidPenalty(penalty_points));
        }
        self.apply(id, -penalty_points, DeltaReason::CompliancePenalty)
    }

    /// Credit refined items, plus the completion bonus when every bin is full.
    pub fn record_refinement(&self, id: UserId, items: u32, completed: bool) -> Result<Points> {
        let rewards = &self.config.refinement;
        let mut deltas = Vec::with_capacity(2);
        if items > 0 {
            let earned = rewards
                .per_item
                .checked_mul(items as Points)
                .ok_or(EngineError::Overflow)?;
            deltas.push((id, earned, DeltaReason::Refinement { items }));
        }
        if completed {
            deltas.push((id, rewards.completion_bonus, DeltaReason::RefinementBonus));
        }

        match self.apply_batch(&deltas)?.last() {
            Some(balance) => Ok(*balance),
            None => self.total_of(id),
        }
    }

    /// Overwrite a user's total, recorded as an override delta.
    pub fn set_total(&self, id: UserId, total: Points) -> Result<Points> {
        let mut state = self.state.write();
        let current = state.account(id)?.user.total_points;
        let delta = total.checked_sub(current).ok_or(EngineError::Overflow)?;
        state.commit(id, delta, total, DeltaReason::Override);
        warn!(user = id, total, delta, "ledger: total overridden");
        Ok(total)
    }

    /// Settle a bet for `bettor` and mark its outcome.
    ///
    /// Each `(bet, bettor)` pair settles once per ledger, whichever copy of
    /// the bet is passed in. The bet is only marked resolved once its delta
    /// has been applied.
    pub fn settle_bet(&self, bettor: UserId, bet: &mut Bet, won: bool) -> Result<Points> {
        let delta = bet.settlement_delta(won)?;
        let reason = if won {
            DeltaReason::BetWon { bet: bet.id }
        } else {
            DeltaReason::BetLost { bet: bet.id }
        };

        let balance = {
            let mut state = self.state.write();
            if state.settlements.contains(&(bet.id, bettor)) {
                warn!(user = bettor, bet = bet.id, "ledger: bet already settled");
                return Err(EngineError::BetAlreadyResolved(bet.id));
            }
            let balance = state.apply(bettor, delta, reason, &self.config.tiers)?;
            state.settlements.insert((bet.id, bettor));
            balance
        };

        bet.resolve(won)?;
        info!(user = bettor, bet = bet.id, won, delta, "ledger: bet settled");
        Ok(balance)
    }

    /// Apply an event's reward to `user`, once per ledger.
    pub fn claim_event(&self, user: UserId, event: &mut Event) -> Result<Points> {
        let mut state = self.state.write();
        let claimed = match event.check_claim(user) {
            Ok(()) if state.claims.contains(&(event.id, user)) => {
                Err(EngineError::AlreadyClaimed { event: event.id, user })
            }
            other => other,
        };
        if let Err(e) = claimed {
            warn!(user, event = event.id, "ledger: duplicate event claim");
            return Err(e);
        }

        let reason = DeltaReason::EventReward { event: event.id };
        let balance = state.apply(user, event.reward, reason, &self.config.tiers)?;
        state.claims.insert((event.id, user));
        drop(state);

        event.mark_claimed(user);
        Ok(balance)
    }

    pub fn total_of(&self, id: UserId) -> Result<Points> {
        Ok(self.state.read().account(id)?.user.total_points)
    }

    /// 1-based position in the ledger's total order.
    pub fn rank_of(&self, id: UserId) -> Result<usize> {
        self.state.read().rank_of(id)
    }

    pub fn tier_of(&self, id: UserId) -> Result<Tier> {
        self.state.read().tier_of(id, &self.config.tiers)
    }

    /// Rank, tier and total of one user from a single state.
    pub fn standing(&self, id: UserId) -> Result<Standing> {
        self.state.read().standing(id, &self.config.tiers)
    }

    /// Standing `id` would hold after `delta`, without applying it.
    pub fn what_if(&self, id: UserId, delta: Points) -> Result<Standing> {
        let state = self.state.read();
        let total = state
            .account(id)?
            .user
            .total_points
            .checked_add(delta)
            .ok_or(EngineError::Overflow)?;
        state.standing_with_total(id, total, &self.config.tiers)
    }

    /// Standings `id` would hold after each of two deltas, from one state.
    pub fn what_if_either(&self, id: UserId, first: Points, second: Points) -> Result<(Standing, Standing)> {
        let state = self.state.read();
        let current = state.account(id)?.user.total_points;
        let policy = &self.config.tiers;
        let standing_after = |delta: Points| -> Result<Standing> {
            let total = current.checked_add(delta).ok_or(EngineError::Overflow)?;
            state.standing_with_total(id, total, policy)
        };
        Ok((standing_after(first)?, standing_after(second)?))
    }

    /// Payout for `wager`, or for the configured default wager when `None`.
    pub fn quote(&self, probability: f64, wager: Option<Points>) -> Result<Points> {
        self.config.wagering.payout(probability, wager)
    }

    /// Look a user up by display name (case-insensitive).
    ///
    /// When several users share the name, the earliest registered wins.
    pub fn find_by_name(&self, name: &str) -> Option<Standing> {
        let state = self.state.read();
        let id = state
            .accounts
            .values()
            .filter(|a| a.user.display_name.eq_ignore_ascii_case(name))
            .min_by_key(|a| a.joined)
            .map(|a| a.user.id)?;
        state.standing(id, &self.config.tiers).ok()
    }

    /// Top `limit` entries (all when `None`) in rank order.
    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<LeaderboardEntry> {
        let state = self.state.read();
        state
            .ordered()
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(i, account)| LeaderboardEntry {
                rank: i + 1,
                user_id: account.user.id,
                display_name: account.user.display_name.clone(),
                total_points: account.user.total_points,
            })
            .collect()
    }

    /// `(id, total)` for every user, in rank order.
    pub fn snapshot(&self) -> Vec<(UserId, Points)> {
        let state = self.state.read();
        state
            .ordered()
            .into_iter()
            .map(|a| (a.user.id, a.user.total_points))
            .collect()
    }

    /// `(id, total)` for every user, in registration order.
    pub(crate) fn seats(&self) -> Vec<(UserId, Points)> {
        let state = self.state.read();
        let mut accounts: Vec<&Account> = state.accounts.values().collect();
        accounts.sort_by_key(|a| a.joined);
        accounts
            .into_iter()
            .map(|a| (a.user.id, a.user.total_points))
            .collect()
    }

    /// History entries for one user, oldest first.
    pub fn history(&self, id: UserId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        state.account(id)?;
        Ok(state
            .history
            .iter()
            .filter(|entry| entry.user_id == id)
            .cloned()
            .collect())
    }

    /// Full history, oldest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.read().history.clone()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.state.read().accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
