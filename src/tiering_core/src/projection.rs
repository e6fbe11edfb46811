use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::HashMap;

use crate::bet::Bet;
use crate::error::{EngineError, Result};
use crate::ledger::ScoreLedger;
use crate::tier::{Tier, TierPolicy};
use crate::user::Standing;
use crate::{Points, UserId};

/// An unresolved bet held by a user.
#[derive(Clone, Debug)]
pub struct OpenPosition {
    pub bettor: UserId,
    pub bet: Bet,
}

impl OpenPosition {
    pub fn new(bettor: UserId, bet: Bet) -> Self {
        OpenPosition { bettor, bet }
    }
}

/// Where a bettor would stand if an open bet is won versus lost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BetSwing {
    pub bet_id: u64,
    pub win: Standing,
    pub loss: Standing,
}

impl BetSwing {
    /// Point difference between the two outcomes.
    pub fn points_at_stake(&self) -> Points {
        self.win.total_points - self.loss.total_points
    }

    /// Places gained by winning instead of losing.
    pub fn rank_swing(&self) -> i64 {
        self.loss.rank as i64 - self.win.rank as i64
    }
}

/// Calculate the swing of one open bet without touching the ledger.
///
/// Both outcomes are ranked against the same ledger state.
pub fn bet_swing(ledger: &ScoreLedger, bettor: UserId, bet: &Bet) -> Result<BetSwing> {
    let (win, loss) = ledger.what_if_either(bettor, bet.settlement_delta(true)?, bet.settlement_delta(false)?)?;
    Ok(BetSwing {
        bet_id: bet.id,
        win,
        loss,
    })
}

/// Calculate swings for many open positions.
///
/// Uses parallel processing; results keep the input order.
pub fn all_bet_swings(ledger: &ScoreLedger, positions: &[OpenPosition]) -> Result<Vec<BetSwing>> {
    positions
        .par_iter()
        .map(|position| bet_swing(ledger, position.bettor, &position.bet))
        .collect()
}

/// Share of simulations spent in each tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TierOdds {
    pub elite: f64,
    pub citizen: f64,
    pub dreg: f64,
}

impl TierOdds {
    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Elite => self.elite,
            Tier::Citizen => self.citizen,
            Tier::Dreg => self.dreg,
        }
    }

    /// Most likely tier; ties favour the better tier.
    pub fn most_likely(&self) -> Tier {
        let mut best = Tier::Elite;
        for tier in Tier::ALL {
            if self.get(tier) > self.get(best) {
                best = tier;
            }
        }
        best
    }
}

/// Projected outcome for one user across all simulations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Projection {
    pub user_id: UserId,
    pub current_points: Points,
    pub mean_points: f64,
    pub std_dev_points: f64,
    pub min_points: Points,
    pub max_points: Points,
    pub expected_rank: f64,
    pub tier_odds: TierOdds,
}

struct Leg {
    seat: usize,
    win_probability: f64,
    win_delta: Points,
    loss_delta: Points,
}

struct SimOutcome {
    totals: Vec<Points>,
    ranks: Vec<usize>,
    tiers: Vec<Tier>,
}

/// Monte Carlo projection of standings once every open position resolves.
///
/// Each position resolves independently with its stated (or implied) win
/// probability. A seeded run is deterministic regardless of thread count.
///
/// # Arguments
/// * `ledger` - Ledger to project from; read once
/// * `positions` - Open bets and who holds them
/// * `n_simulations` - Number of simulated resolutions
/// * `seed` - Optional seed for reproducible runs
///
/// # Returns
/// One projection per user, in current rank order
pub fn project_standings(
    ledger: &ScoreLedger,
    positions: &[OpenPosition],
    n_simulations: usize,
    seed: Option<u64>,
) -> Result<Vec<Projection>> {
    if n_simulations == 0 {
        return Err(EngineError::InvalidSimulationCount);
    }

    let seats = ledger.seats();
    if seats.is_empty() {
        return Err(EngineError::EmptyPopulation);
    }
    let seat_of: HashMap<UserId, usize> = seats.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();

    let legs = positions
        .iter()
        .map(|position| -> Result<Leg> {
            let seat = *seat_of
                .get(&position.bettor)
                .ok_or(EngineError::UnknownUser(position.bettor))?;
            Ok(Leg {
                seat,
                win_probability: position.bet.effective_probability()? / 100.0,
                win_delta: position.bet.settlement_delta(true)?,
                loss_delta: position.bet.settlement_delta(false)?,
            })
        })
        .collect::<Result<Vec<Leg>>>()?;

    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    let sim_seeds: Vec<u64> = (0..n_simulations).map(|_| rng.gen::<u64>()).collect();

    let opening: Vec<Points> = seats.iter().map(|(_, total)| *total).collect();
    let policy = ledger.config().tiers;

    // Parallel computation over simulations
    let outcomes = sim_seeds
        .par_iter()
        .map(|&sim_seed| simulate_once(&opening, &legs, &policy, sim_seed))
        .collect::<Result<Vec<SimOutcome>>>()?;

    let mut projections: Vec<Projection> = seats
        .iter()
        .enumerate()
        .map(|(seat, (id, current))| summarize(*id, *current, seat, &outcomes))
        .collect();

    // Stable sort over registration order reproduces the ledger's rank order.
    projections.sort_by(|a, b| b.current_points.cmp(&a.current_points));

    Ok(projections)
}

fn simulate_once(opening: &[Points], legs: &[Leg], policy: &TierPolicy, seed: u64) -> Result<SimOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut totals = opening.to_vec();

    for leg in legs {
        let delta = if rng.gen::<f64>() < leg.win_probability {
            leg.win_delta
        } else {
            leg.loss_delta
        };
        totals[leg.seat] = totals[leg.seat]
            .checked_add(delta)
            .ok_or(EngineError::Overflow)?;
    }

    // Seats are in registration order, so a stable sort keeps the tie-break.
    let mut order: Vec<usize> = (0..totals.len()).collect();
    order.sort_by(|&a, &b| totals[b].cmp(&totals[a]));

    let population = totals.len();
    let mut ranks = vec![0; population];
    let mut tiers = vec![Tier::Citizen; population];
    for (position, &seat) in order.iter().enumerate() {
        ranks[seat] = position + 1;
        tiers[seat] = policy.classify(position + 1, population)?;
    }

    Ok(SimOutcome { totals, ranks, tiers })
}

fn summarize(user_id: UserId, current: Points, seat: usize, outcomes: &[SimOutcome]) -> Projection {
    let n = outcomes.len() as f64;
    let points: Vec<f64> = outcomes.iter().map(|o| o.totals[seat] as f64).collect();
    let ranks: Vec<f64> = outcomes.iter().map(|o| o.ranks[seat] as f64).collect();

    let std_dev = if points.len() > 1 {
        points.iter().std_dev()
    } else {
        0.0
    };

    let mut tier_odds = TierOdds::default();
    for outcome in outcomes {
        match outcome.tiers[seat] {
            Tier::Elite => tier_odds.elite += 1.0,
            Tier::Citizen => tier_odds.citizen += 1.0,
            Tier::Dreg => tier_odds.dreg += 1.0,
        }
    }
    tier_odds.elite /= n;
    tier_odds.citizen /= n;
    tier_odds.dreg /= n;

    let (min_points, max_points) = outcomes
        .iter()
        .map(|o| o.totals[seat])
        .fold((Points::MAX, Points::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)));

    Projection {
        user_id,
        current_points: current,
        mean_points: points.iter().mean(),
        std_dev_points: std_dev,
        min_points,
        max_points,
        expected_rank: ranks.iter().mean(),
        tier_odds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Creator;

    fn make_ledger() -> ScoreLedger {
        let ledger = ScoreLedger::default();
        for (id, total) in [(1, 500), (2, 400), (3, 300), (4, 200), (5, 100)] {
            ledger.register_with_total(id, format!("User {id}"), total).unwrap();
        }
        ledger
    }

    fn long_shot(id: u64) -> Bet {
        Bet::fair(id, "Long shot", Creator::unknown(), 100, 10.0).unwrap()
    }

    #[test]
    fn test_bet_swing() {
        let ledger = make_ledger();
        let swing = bet_swing(&ledger, 5, &long_shot(1)).unwrap();

        // Win: +900 -> 1000, rank 1. Loss: -100 -> 0, rank 5.
        assert_eq!(swing.win.total_points, 1000);
        assert_eq!(swing.win.rank, 1);
        assert_eq!(swing.win.tier, Tier::Elite);
        assert_eq!(swing.loss.total_points, 0);
        assert_eq!(swing.loss.rank, 5);
        assert_eq!(swing.points_at_stake(), 1000);
        assert_eq!(swing.rank_swing(), 4);

        // Ledger untouched
        assert_eq!(ledger.total_of(5).unwrap(), 100);
    }

    #[test]
    fn test_bet_swing_consistent_under_writers() {
        let ledger = std::sync::Arc::new(make_ledger());
        let writer = {
            let ledger = std::sync::Arc::clone(&ledger);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    let delta = if i % 2 == 0 { 700 } else { -700 };
                    ledger.apply_delta(1, delta).unwrap();
                }
            })
        };

        let bet = long_shot(1);
        for _ in 0..2000 {
            let swing = bet_swing(&ledger, 3, &bet).unwrap();
            assert_eq!(swing.points_at_stake(), 1000);
            assert!(swing.win.rank <= swing.loss.rank);
            assert_eq!(swing.win.total_points - 900, swing.loss.total_points + 100);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_all_bet_swings_keeps_order() {
        let ledger = make_ledger();
        let positions = vec![
            OpenPosition::new(5, long_shot(1)),
            OpenPosition::new(1, long_shot(2)),
        ];
        let swings = all_bet_swings(&ledger, &positions).unwrap();
        assert_eq!(swings.len(), 2);
        assert_eq!(swings[0].bet_id, 1);
        assert_eq!(swings[1].bet_id, 2);
        assert_eq!(swings[1].win.user_id, 1);
    }

    #[test]
    fn test_projection_without_positions_is_current_state() {
        let ledger = make_ledger();
        let projections = project_standings(&ledger, &[], 10, Some(1)).unwrap();
        assert_eq!(projections.len(), 5);
        assert_eq!(projections[0].user_id, 1);
        assert_eq!(projections[0].expected_rank, 1.0);
        assert_eq!(projections[0].tier_odds.elite, 1.0);
        assert_eq!(projections[4].tier_odds.dreg, 1.0);
        for p in &projections {
            assert_eq!(p.mean_points, p.current_points as f64);
            assert_eq!(p.std_dev_points, 0.0);
        }
    }

    #[test]
    fn test_projection_deterministic_with_seed() {
        let ledger = make_ledger();
        let positions = vec![
            OpenPosition::new(5, long_shot(1)),
            OpenPosition::new(3, Bet::fair(2, "Even", Creator::unknown(), 150, 50.0).unwrap()),
        ];
        let first = project_standings(&ledger, &positions, 500, Some(42)).unwrap();
        let second = project_standings(&ledger, &positions, 500, Some(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_projection_statistics() {
        let ledger = make_ledger();
        let positions = vec![OpenPosition::new(
            3,
            Bet::fair(2, "Even", Creator::unknown(), 150, 50.0).unwrap(),
        )];
        let projections = project_standings(&ledger, &positions, 4000, Some(7)).unwrap();
        let user3 = projections.iter().find(|p| p.user_id == 3).unwrap();

        // Fair even-money bet: expectation stays at the current total
        assert!((user3.mean_points - 300.0).abs() < 15.0, "mean {}", user3.mean_points);
        assert!(user3.std_dev_points > 100.0);
        assert_eq!(user3.min_points, 150);
        assert_eq!(user3.max_points, 450);

        for p in &projections {
            let total = p.tier_odds.elite + p.tier_odds.citizen + p.tier_odds.dreg;
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_projection_errors() {
        let ledger = make_ledger();
        assert_eq!(
            project_standings(&ledger, &[], 0, None),
            Err(EngineError::InvalidSimulationCount)
        );

        let stranger = vec![OpenPosition::new(99, long_shot(1))];
        assert_eq!(
            project_standings(&ledger, &stranger, 10, None),
            Err(EngineError::UnknownUser(99))
        );

        let mut settled = long_shot(3);
        settled.resolve(false).unwrap();
        let positions = vec![OpenPosition::new(1, settled)];
        assert_eq!(
            project_standings(&ledger, &positions, 10, None),
            Err(EngineError::BetAlreadyResolved(3))
        );

        assert_eq!(
            project_standings(&ScoreLedger::default(), &[], 10, None),
            Err(EngineError::EmptyPopulation)
        );
    }

    #[test]
    fn test_most_likely_tier() {
        let odds = TierOdds {
            elite: 0.2,
            citizen: 0.5,
            dreg: 0.3,
        };
        assert_eq!(odds.most_likely(), Tier::Citizen);
        assert_eq!(TierOdds::default().most_likely(), Tier::Elite);
    }
}
