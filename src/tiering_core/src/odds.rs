use crate::constants::{CERTAIN_WIN_MULTIPLIER, DEFAULT_WAGER, IMPOSSIBLE_ODDS_MULTIPLIER};
use crate::error::{EngineError, Result};
use crate::Points;

/// Decimal odds for a win probability.
///
/// Probabilities are percentages. At or below 0% the odds are pinned to the
/// impossible-odds multiple, at or above 100% to the nominal 1% profit.
pub fn decimal_odds(probability: f64) -> Result<f64> {
    if probability.is_nan() {
        return Err(EngineError::InvalidProbability(probability));
    }

    if probability <= 0.0 {
        Ok(IMPOSSIBLE_ODDS_MULTIPLIER as f64)
    } else if probability >= 100.0 {
        Ok(CERTAIN_WIN_MULTIPLIER)
    } else {
        Ok(100.0 / probability)
    }
}

/// Calculate the total payout (wager plus profit) for a winning bet.
///
/// # Arguments
/// * `probability` - Chance of winning, in percent (0-100)
/// * `wager` - Points staked, must be positive
///
/// # Returns
/// Total points returned on a win, rounded half-up
pub fn calculate_payout(probability: f64, wager: Points) -> Result<Points> {
    if wager <= 0 {
        return Err(EngineError::InvalidWager(wager));
    }
    if probability.is_nan() {
        return Err(EngineError::InvalidProbability(probability));
    }

    if probability <= 0.0 {
        return wager
            .checked_mul(IMPOSSIBLE_ODDS_MULTIPLIER)
            .ok_or(EngineError::Overflow);
    }

    let odds = decimal_odds(probability)?;
    round_points(wager as f64 * odds)
}

/// Payout for the default 100 point wager.
pub fn default_payout(probability: f64) -> Result<Points> {
    calculate_payout(probability, DEFAULT_WAGER)
}

/// Win probability (percent) implied by a payout on a wager.
///
/// Inverse of [`calculate_payout`] for the fair branch, clamped to 0-100.
pub fn implied_probability(payout: Points, wager: Points) -> Result<f64> {
    if wager <= 0 {
        return Err(EngineError::InvalidWager(wager));
    }
    if payout <= 0 {
        return Ok(0.0);
    }
    Ok((100.0 * wager as f64 / payout as f64).clamp(0.0, 100.0))
}

// Payout inputs are positive, so `round` is half-up here.
fn round_points(value: f64) -> Result<Points> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded >= Points::MAX as f64 {
        return Err(EngineError::Overflow);
    }
    Ok(rounded as Points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_odds_doubles_wager() {
        assert_eq!(calculate_payout(50.0, 100).unwrap(), 200);
        assert!((decimal_odds(50.0).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_documented_payouts() {
        assert_eq!(calculate_payout(25.0, 100).unwrap(), 400);
        assert_eq!(calculate_payout(1.0, 100).unwrap(), 10_000);
        assert_eq!(calculate_payout(99.9, 100).unwrap(), 100);
    }

    #[test]
    fn test_zero_probability_is_capped() {
        assert_eq!(calculate_payout(0.0, 100).unwrap(), 10_000);
        assert_eq!(calculate_payout(-5.0, 7).unwrap(), 700);
    }

    #[test]
    fn test_certain_win_pays_one_percent() {
        assert_eq!(calculate_payout(100.0, 100).unwrap(), 101);
        assert_eq!(calculate_payout(150.0, 300).unwrap(), 303);
    }

    #[test]
    fn test_default_wager() {
        assert_eq!(default_payout(50.0).unwrap(), 200);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(calculate_payout(50.0, 0), Err(EngineError::InvalidWager(0)));
        assert_eq!(calculate_payout(50.0, -10), Err(EngineError::InvalidWager(-10)));
        assert!(matches!(
            calculate_payout(f64::NAN, 100),
            Err(EngineError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_overflow_detected() {
        assert_eq!(calculate_payout(0.0, Points::MAX), Err(EngineError::Overflow));
        assert_eq!(calculate_payout(0.5, Points::MAX / 2), Err(EngineError::Overflow));
    }

    #[test]
    fn test_implied_probability_inverts_payout() {
        let p = implied_probability(400, 100).unwrap();
        assert!((p - 25.0).abs() < 1e-10);
        assert_eq!(implied_probability(0, 100).unwrap(), 0.0);
        assert_eq!(implied_probability(50, 100).unwrap(), 100.0);
    }

    proptest! {
        #[test]
        fn prop_fair_branch_matches_formula(p in 0.01f64..99.99, w in 1i64..100_000) {
            let expected = (w as f64 * (100.0 / p)).round() as i64;
            prop_assert_eq!(calculate_payout(p, w).unwrap(), expected);
        }

        #[test]
        fn prop_clamped_branches(w in 1i64..1_000_000) {
            prop_assert_eq!(calculate_payout(0.0, w).unwrap(), w * 100);
            prop_assert_eq!(calculate_payout(100.0, w).unwrap(), (w as f64 * 1.01).round() as i64);
        }

        #[test]
        fn prop_payout_non_increasing(p in 0.01f64..99.0, step in 0.0f64..1.0, w in 1i64..100_000) {
            let lower = calculate_payout(p, w).unwrap();
            let higher = calculate_payout(p + step, w).unwrap();
            prop_assert!(higher <= lower);
        }
    }
}
