use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_DREG_PERCENT, DEFAULT_ELITE_PERCENT};
use crate::error::{EngineError, Result};

/// Coarse standing of a user, derived from rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Elite,
    Citizen,
    Dreg,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Elite, Tier::Citizen, Tier::Dreg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Elite => "elite",
            Tier::Citizen => "citizen",
            Tier::Dreg => "dreg",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elite" => Ok(Tier::Elite),
            "citizen" => Ok(Tier::Citizen),
            "dreg" => Ok(Tier::Dreg),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Percentile breakpoints for tier classification.
///
/// The top `elite_percent` of the population (rounded up, so a non-empty
/// population always has an elite when the share is non-zero) is elite, the
/// bottom `dreg_percent` (rounded down) is dreg, and everyone else is citizen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    #[serde(default = "default_elite_percent")]
    pub elite_percent: u32,

    #[serde(default = "default_dreg_percent")]
    pub dreg_percent: u32,
}

fn default_elite_percent() -> u32 {
    DEFAULT_ELITE_PERCENT
}

fn default_dreg_percent() -> u32 {
    DEFAULT_DREG_PERCENT
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            elite_percent: default_elite_percent(),
            dreg_percent: default_dreg_percent(),
        }
    }
}

impl TierPolicy {
    pub fn new(elite_percent: u32, dreg_percent: u32) -> Result<Self> {
        let policy = Self {
            elite_percent,
            dreg_percent,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.elite_percent as u64 + self.dreg_percent as u64 > 100 {
            return Err(EngineError::InvalidTierPolicy {
                elite_percent: self.elite_percent,
                dreg_percent: self.dreg_percent,
            });
        }
        Ok(())
    }

    /// Number of elite seats in a population.
    pub fn elite_seats(&self, population: usize) -> usize {
        (population * self.elite_percent as usize).div_ceil(100)
    }

    /// Number of dreg seats in a population.
    pub fn dreg_seats(&self, population: usize) -> usize {
        population * self.dreg_percent as usize / 100
    }

    /// Classify a 1-based rank within a population.
    pub fn classify(&self, rank: usize, population: usize) -> Result<Tier> {
        if population == 0 {
            return Err(EngineError::EmptyPopulation);
        }
        if rank == 0 || rank > population {
            return Err(EngineError::RankOutOfRange { rank, population });
        }
        self.validate()?;

        if rank <= self.elite_seats(population) {
            Ok(Tier::Elite)
        } else if rank > population - self.dreg_seats(population) {
            Ok(Tier::Dreg)
        } else {
            Ok(Tier::Citizen)
        }
    }
}

/// Classify with the default 10% / 70% / 20% breakpoints.
pub fn classify(rank: usize, total_users: usize) -> Result<Tier> {
    TierPolicy::default().classify(rank, total_users)
}
