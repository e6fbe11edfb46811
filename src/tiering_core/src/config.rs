//! Engine configuration.
//!
//! Loaded from a TOML file with every field defaulted, then optionally
//! overridden from `TIERING_*` environment variables.

use serde::Deserialize;
use std::path::Path;

use crate::constants::{
    DEFAULT_REPORT_BONUS, DEFAULT_REPORT_PENALTY, DEFAULT_WAGER, REFINEMENT_COMPLETION_BONUS,
    REFINEMENT_ITEM_POINTS,
};
use crate::error::{EngineError, Result};
use crate::odds::calculate_payout;
use crate::tier::TierPolicy;
use crate::Points;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tiers: TierPolicy,

    #[serde(default)]
    pub wagering: WageringConfig,

    #[serde(default)]
    pub reports: ReportPolicy,

    #[serde(default)]
    pub refinement: RefinementRewards,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WageringConfig {
    #[serde(default = "default_wager")]
    pub default_wager: Points,
}

fn default_wager() -> Points {
    DEFAULT_WAGER
}

impl Default for WageringConfig {
    fn default() -> Self {
        Self {
            default_wager: default_wager(),
        }
    }
}

impl WageringConfig {
    /// Payout for `wager`, falling back to the configured default wager.
    pub fn payout(&self, probability: f64, wager: Option<Points>) -> Result<Points> {
        calculate_payout(probability, wager.unwrap_or(self.default_wager))
    }
}

/// Point movements caused by one citizen report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportPolicy {
    #[serde(default = "default_report_penalty")]
    pub target_penalty: Points,

    #[serde(default = "default_report_bonus")]
    pub reporter_bonus: Points,
}

fn default_report_penalty() -> Points {
    DEFAULT_REPORT_PENALTY
}

fn default_report_bonus() -> Points {
    DEFAULT_REPORT_BONUS
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            target_penalty: default_report_penalty(),
            reporter_bonus: default_report_bonus(),
        }
    }
}

/// Rewards paid by the refinement mini game.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefinementRewards {
    #[serde(default = "default_per_item")]
    pub per_item: Points,

    #[serde(default = "default_completion_bonus")]
    pub completion_bonus: Points,
}

fn default_per_item() -> Points {
    REFINEMENT_ITEM_POINTS
}

fn default_completion_bonus() -> Points {
    REFINEMENT_COMPLETION_BONUS
}

impl Default for RefinementRewards {
    fn default() -> Self {
        Self {
            per_item: default_per_item(),
            completion_bonus: default_completion_bonus(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            EngineError::Config { message, .. } => EngineError::Config {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).map_err(|e| EngineError::Config {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `TIERING_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(elite) = env_number("TIERING_ELITE_PERCENT")? {
            self.tiers.elite_percent = elite;
        }
        if let Some(dreg) = env_number("TIERING_DREG_PERCENT")? {
            self.tiers.dreg_percent = dreg;
        }
        if let Some(wager) = env_number("TIERING_DEFAULT_WAGER")? {
            self.wagering.default_wager = wager;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.tiers.validate()?;
        if self.wagering.default_wager <= 0 {
            return Err(EngineError::InvalidWager(self.wagering.default_wager));
        }
        if self.reports.target_penalty < 0 {
            return Err(EngineError::InvalidPenalty(self.reports.target_penalty));
        }
        let rewards = [
            ("reports.reporter_bonus", self.reports.reporter_bonus),
            ("refinement.per_item", self.refinement.per_item),
            ("refinement.completion_bonus", self.refinement.completion_bonus),
        ];
        for (field, value) in rewards {
            if value < 0 {
                return Err(EngineError::InvalidReward { field, value });
            }
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| EngineError::Config {
            path: format!("${key}").into(),
            message: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tiers.elite_percent, 10);
        assert_eq!(config.tiers.dreg_percent, 20);
        assert_eq!(config.wagering.default_wager, 100);
        assert_eq!(config.refinement.completion_bonus, 500);
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::parse(
            r#"
            [tiers]
            elite_percent = 5

            [reports]
            reporter_bonus = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.tiers.elite_percent, 5);
        assert_eq!(config.tiers.dreg_percent, 20);
        assert_eq!(config.reports.reporter_bonus, 40);
        assert_eq!(config.reports.target_penalty, 100);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let err = EngineConfig::parse("[tiers]\nelite_percent = 90\ndreg_percent = 20\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTierPolicy { .. }));

        let err = EngineConfig::parse("[wagering]\ndefault_wager = 0\n").unwrap_err();
        assert_eq!(err, EngineError::InvalidWager(0));
    }

    #[test]
    fn test_negative_rewards_rejected() {
        let err = EngineConfig::parse("[reports]\nreporter_bonus = -25\n").unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidReward {
                field: "reports.reporter_bonus",
                value: -25
            }
        );

        let err = EngineConfig::parse("[refinement]\nper_item = -1\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidReward { field: "refinement.per_item", .. }));

        let err = EngineConfig::parse("[refinement]\ncompletion_bonus = -500\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidReward { value: -500, .. }));

        let err = EngineConfig::parse("[reports]\ntarget_penalty = -1\n").unwrap_err();
        assert_eq!(err, EngineError::InvalidPenalty(-1));

        // Zero is allowed
        assert!(EngineConfig::parse("[refinement]\ncompletion_bonus = 0\n").is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::parse("[tiers\n").unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn test_load_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/tiering.toml")).unwrap_err();
        match err {
            EngineError::Config { path, .. } => assert!(path.ends_with("tiering.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_payout_uses_default_wager() {
        let wagering = WageringConfig { default_wager: 40 };
        assert_eq!(wagering.payout(50.0, None).unwrap(), 80);
        assert_eq!(wagering.payout(50.0, Some(10)).unwrap(), 20);
    }
}
