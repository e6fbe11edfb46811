//! Error types for the scoring engine.
use std::path::PathBuf;

use thiserror::Error;

use crate::{Points, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    #[error("user already registered: {0}")]
    DuplicateUser(UserId),
    #[error("cannot classify a tier in an empty population")]
    EmptyPopulation,
    #[error("rank {rank} outside 1..={population}")]
    RankOutOfRange { rank: usize, population: usize },
    #[error("invalid tier policy: elite {elite_percent}% + dreg {dreg_percent}% exceeds 100%")]
    InvalidTierPolicy { elite_percent: u32, dreg_percent: u32 },
    #[error("wager must be positive, got {0}")]
    InvalidWager(Points),
    #[error("invalid win probability: {0}")]
    InvalidProbability(f64),
    #[error("penalty must be non-negative, got {0}")]
    InvalidPenalty(Points),
    #[error("{field} must be non-negative, got {value}")]
    InvalidReward { field: &'static str, value: Points },
    #[error("bet {0} is already resolved")]
    BetAlreadyResolved(u64),
    #[error("user {user} already claimed event {event}")]
    AlreadyClaimed { event: u64, user: UserId },
    #[error("user {0} cannot report themselves")]
    SelfReport(UserId),
    #[error("simulation count must be positive")]
    InvalidSimulationCount,
    #[error("point arithmetic overflow")]
    Overflow,
    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
