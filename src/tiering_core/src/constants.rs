use crate::Points;

/// Wager assumed when a caller does not state one
pub const DEFAULT_WAGER: Points = 100;

/// Payout multiple for a bet stated at 0% (or less)
pub const IMPOSSIBLE_ODDS_MULTIPLIER: Points = 100;

/// Payout multiple for a bet stated at 100% (or more): a nominal 1% profit
pub const CERTAIN_WIN_MULTIPLIER: f64 = 1.01;

/// Share of the population classified elite, in percent
pub const DEFAULT_ELITE_PERCENT: u32 = 10;

/// Share of the population classified dreg, in percent
pub const DEFAULT_DREG_PERCENT: u32 = 20;

/// Points lost by the target of a citizen report
pub const DEFAULT_REPORT_PENALTY: Points = 100;

/// Points earned by the reporter of a citizen report
pub const DEFAULT_REPORT_BONUS: Points = 25;

/// Points per refined item in the refinement game
pub const REFINEMENT_ITEM_POINTS: Points = 10;

/// Bonus for completing every bin in the refinement game
pub const REFINEMENT_COMPLETION_BONUS: Points = 500;

/// Display name given to a creator that arrives without one
pub const UNKNOWN_CREATOR: &str = "Unknown";
