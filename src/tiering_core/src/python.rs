//! Python bindings via PyO3.
//!
//! Built only with the `python` feature; the module is importable as
//! `tiering_core`.

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::bet::Bet;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::Event;
use crate::ledger::ScoreLedger;
use crate::projection::{project_standings, OpenPosition, Projection};
use crate::tier::{Tier, TierPolicy};
use crate::user::{Creator, Standing};
use crate::{odds, Points, UserId};

impl From<EngineError> for PyErr {
    fn from(err: EngineError) -> PyErr {
        match err {
            EngineError::UnknownUser(_) => PyKeyError::new_err(err.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// A user's rank, tier and total.
#[pyclass(name = "Standing")]
#[derive(Clone, Debug)]
pub struct PyStanding {
    #[pyo3(get)]
    pub user_id: UserId,

    #[pyo3(get)]
    pub display_name: String,

    #[pyo3(get)]
    pub rank: usize,

    #[pyo3(get)]
    pub tier: String,

    #[pyo3(get)]
    pub total_points: Points,

    #[pyo3(get)]
    pub population: usize,
}

impl From<Standing> for PyStanding {
    fn from(s: Standing) -> Self {
        PyStanding {
            user_id: s.user_id,
            display_name: s.display_name,
            rank: s.rank,
            tier: s.tier.to_string(),
            total_points: s.total_points,
            population: s.population,
        }
    }
}

#[pymethods]
impl PyStanding {
    fn __repr__(&self) -> String {
        format!(
            "Standing({}, rank={}/{}, tier={}, points={})",
            self.display_name, self.rank, self.population, self.tier, self.total_points
        )
    }
}

/// Projected outcome for one user.
#[pyclass(name = "Projection")]
#[derive(Clone, Debug)]
pub struct PyProjection {
    #[pyo3(get)]
    pub user_id: UserId,

    #[pyo3(get)]
    pub current_points: Points,

    #[pyo3(get)]
    pub mean_points: f64,

    #[pyo3(get)]
    pub std_dev_points: f64,

    #[pyo3(get)]
    pub min_points: Points,

    #[pyo3(get)]
    pub max_points: Points,

    #[pyo3(get)]
    pub expected_rank: f64,

    /// Share of simulations in each tier, keyed by tier name
    #[pyo3(get)]
    pub tier_odds: HashMap<String, f64>,
}

impl From<Projection> for PyProjection {
    fn from(p: Projection) -> Self {
        PyProjection {
            user_id: p.user_id,
            current_points: p.current_points,
            mean_points: p.mean_points,
            std_dev_points: p.std_dev_points,
            min_points: p.min_points,
            max_points: p.max_points,
            expected_rank: p.expected_rank,
            tier_odds: Tier::ALL
                .iter()
                .map(|tier| (tier.to_string(), p.tier_odds.get(*tier)))
                .collect(),
        }
    }
}

#[pymethods]
impl PyProjection {
    fn __repr__(&self) -> String {
        format!(
            "Projection(user={}, mean={:.1}, expected_rank={:.2})",
            self.user_id, self.mean_points, self.expected_rank
        )
    }
}

/// A bet on the feed.
#[pyclass(name = "Bet")]
#[derive(Clone, Debug)]
pub struct PyBet {
    pub inner: Bet,
}

#[pymethods]
impl PyBet {
    /// Create a fair bet priced from `probability` (percent).
    #[new]
    #[pyo3(signature = (id, description, wager, probability, creator = None))]
    fn new(id: u64, description: String, wager: Points, probability: f64, creator: Option<String>) -> PyResult<Self> {
        let creator = creator.map(|name| Creator::new(None, name)).unwrap_or_default();
        Ok(PyBet {
            inner: Bet::fair(id, description, creator, wager, probability)?,
        })
    }

    #[getter]
    fn id(&self) -> u64 {
        self.inner.id
    }

    #[getter]
    fn wager_points(&self) -> Points {
        self.inner.wager_points
    }

    #[getter]
    fn payout_points(&self) -> Points {
        self.inner.payout_points
    }

    /// `None` while unresolved, otherwise whether the bet was won.
    #[getter]
    fn outcome(&self) -> Option<bool> {
        self.inner.outcome.into()
    }

    fn is_fair(&self) -> bool {
        self.inner.is_fair()
    }

    fn __repr__(&self) -> String {
        format!(
            "Bet({}, wager={}, payout={})",
            self.inner.id, self.inner.wager_points, self.inner.payout_points
        )
    }
}

/// An event with a per-participant reward.
#[pyclass(name = "Event")]
#[derive(Clone, Debug)]
pub struct PyEvent {
    pub inner: Event,
}

#[pymethods]
impl PyEvent {
    #[new]
    #[pyo3(signature = (id, title, reward, creator = None))]
    fn new(id: u64, title: String, reward: Points, creator: Option<String>) -> Self {
        let creator = creator.map(|name| Creator::new(None, name)).unwrap_or_default();
        PyEvent {
            inner: Event::new(id, title, creator, reward),
        }
    }

    #[getter]
    fn reward(&self) -> Points {
        self.inner.reward
    }

    fn is_claimed_by(&self, user_id: UserId) -> bool {
        self.inner.is_claimed_by(user_id)
    }

    fn __repr__(&self) -> String {
        format!("Event({}, {:?}, reward={})", self.inner.id, self.inner.title, self.inner.reward)
    }
}

/// Shared score ledger.
#[pyclass(name = "ScoreLedger")]
pub struct PyScoreLedger {
    inner: Arc<ScoreLedger>,
}

#[pymethods]
impl PyScoreLedger {
    /// Create a ledger from a TOML config file, or from defaults plus
    /// `TIERING_*` environment overrides.
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::load(Path::new(path))?,
            None => EngineConfig::from_env()?,
        };
        Ok(PyScoreLedger {
            inner: Arc::new(ScoreLedger::new(config)?),
        })
    }

    #[pyo3(signature = (user_id, display_name, total_points = 0))]
    fn register(&self, user_id: UserId, display_name: String, total_points: Points) -> PyResult<()> {
        Ok(self.inner.register_with_total(user_id, display_name, total_points)?)
    }

    fn apply_delta(&self, user_id: UserId, delta: Points) -> PyResult<Points> {
        Ok(self.inner.apply_delta(user_id, delta)?)
    }

    fn total_of(&self, user_id: UserId) -> PyResult<Points> {
        Ok(self.inner.total_of(user_id)?)
    }

    fn rank_of(&self, user_id: UserId) -> PyResult<usize> {
        Ok(self.inner.rank_of(user_id)?)
    }

    fn tier_of(&self, user_id: UserId) -> PyResult<String> {
        Ok(self.inner.tier_of(user_id)?.to_string())
    }

    fn standing(&self, user_id: UserId) -> PyResult<PyStanding> {
        Ok(self.inner.standing(user_id)?.into())
    }

    /// Standing for a display name, or `None`.
    fn find_by_name(&self, name: &str) -> Option<PyStanding> {
        self.inner.find_by_name(name).map(Into::into)
    }

    /// Returns a list of `(rank, user_id, display_name, total_points)`.
    #[pyo3(signature = (limit = None))]
    fn leaderboard(&self, limit: Option<usize>) -> Vec<(usize, UserId, String, Points)> {
        self.inner
            .leaderboard(limit)
            .into_iter()
            .map(|e| (e.rank, e.user_id, e.display_name, e.total_points))
            .collect()
    }

    /// Returns `(target_points_lost, report_points_earned)`.
    fn report(&self, reporter: UserId, target: UserId) -> PyResult<(Points, Points)> {
        let outcome = self.inner.report(reporter, target)?;
        Ok((outcome.target_points_lost, outcome.report_points_earned))
    }

    fn apply_compliance_penalty(&self, user_id: UserId, penalty_points: Points) -> PyResult<Points> {
        Ok(self.inner.apply_compliance_penalty(user_id, penalty_points)?)
    }

    #[pyo3(signature = (user_id, items, completed = false))]
    fn record_refinement(&self, user_id: UserId, items: u32, completed: bool) -> PyResult<Points> {
        Ok(self.inner.record_refinement(user_id, items, completed)?)
    }

    fn set_total(&self, user_id: UserId, total: Points) -> PyResult<Points> {
        Ok(self.inner.set_total(user_id, total)?)
    }

    fn settle_bet(&self, bettor: UserId, mut bet: PyRefMut<'_, PyBet>, won: bool) -> PyResult<Points> {
        Ok(self.inner.settle_bet(bettor, &mut bet.inner, won)?)
    }

    fn claim_event(&self, user_id: UserId, mut event: PyRefMut<'_, PyEvent>) -> PyResult<Points> {
        Ok(self.inner.claim_event(user_id, &mut event.inner)?)
    }

    /// Returns `(sequence, delta, balance)` for each entry of a user's history.
    fn history(&self, user_id: UserId) -> PyResult<Vec<(u64, Points, Points)>> {
        Ok(self
            .inner
            .history(user_id)?
            .into_iter()
            .map(|e| (e.sequence, e.delta, e.balance))
            .collect())
    }

    /// Monte Carlo projection over `(bettor, bet)` pairs.
    ///
    /// Returns one `Projection` per user, in current rank order.
    #[pyo3(signature = (positions, n_simulations, seed = None))]
    fn project(
        &self,
        py: Python<'_>,
        positions: Vec<(UserId, PyBet)>,
        n_simulations: usize,
        seed: Option<u64>,
    ) -> PyResult<Vec<PyProjection>> {
        let positions: Vec<OpenPosition> = positions
            .into_iter()
            .map(|(bettor, bet)| OpenPosition::new(bettor, bet.inner))
            .collect();
        let ledger = Arc::clone(&self.inner);
        let projections =
            py.allow_threads(move || project_standings(&ledger, &positions, n_simulations, seed))?;

        Ok(projections.into_iter().map(Into::into).collect())
    }

    /// Payout for `wager`, or for the ledger's configured default wager.
    #[pyo3(signature = (probability, wager = None))]
    fn quote(&self, probability: f64, wager: Option<Points>) -> PyResult<Points> {
        Ok(self.inner.quote(probability, wager)?)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("ScoreLedger({} users)", self.inner.len())
    }
}

/// Calculate the total payout for a winning bet.
///
/// Without a wager, uses the default wager (`TIERING_DEFAULT_WAGER` or 100).
#[pyfunction]
#[pyo3(signature = (probability, wager = None))]
fn calculate_payout(probability: f64, wager: Option<Points>) -> PyResult<Points> {
    let wager = match wager {
        Some(w) => w,
        None => EngineConfig::from_env()?.wagering.default_wager,
    };
    Ok(odds::calculate_payout(probability, wager)?)
}

/// Classify a rank within a population.
#[pyfunction]
#[pyo3(signature = (rank, total_users, elite_percent = None, dreg_percent = None))]
fn classify_tier(
    rank: usize,
    total_users: usize,
    elite_percent: Option<u32>,
    dreg_percent: Option<u32>,
) -> PyResult<String> {
    let defaults = TierPolicy::default();
    let policy = TierPolicy::new(
        elite_percent.unwrap_or(defaults.elite_percent),
        dreg_percent.unwrap_or(defaults.dreg_percent),
    )?;
    Ok(policy.classify(rank, total_users)?.to_string())
}

/// Install a `tracing` subscriber writing to stderr.
///
/// Returns `False` if a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (filter = "info"))]
fn init_logging(filter: &str) -> PyResult<bool> {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|e| PyValueError::new_err(format!("invalid log filter: {}", e)))?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}

/// Python module definition
#[pymodule]
fn tiering_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Classes
    m.add_class::<PyScoreLedger>()?;
    m.add_class::<PyStanding>()?;
    m.add_class::<PyBet>()?;
    m.add_class::<PyEvent>()?;
    m.add_class::<PyProjection>()?;

    // Functions
    m.add_function(wrap_pyfunction!(calculate_payout, m)?)?;
    m.add_function(wrap_pyfunction!(classify_tier, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    // Constants
    m.add("DEFAULT_WAGER", crate::constants::DEFAULT_WAGER)?;
    m.add("TIERS", crate::tier::Tier::ALL.map(|t| t.as_str()).to_vec())?;

    Ok(())
}
