//! Run configuration.
//!
//! Loaded from a TOML file with `RCVAR__SECTION__KEY` environment
//! overrides, e.g. `RCVAR__SOLVER__BACKEND=microlp`. Every field has a
//! default, so an empty file is a valid configuration.

use std::path::Path;

use serde::Deserialize;

use crate::builder::{Bounds, FirstStageRobustness, Mode, ModelParams};
use crate::error::{CvarError, Result};
use crate::portfolio::PortfolioProblem;
use crate::scenario::ScenarioSet;
use crate::solver::{BackendKind, Settings};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RCVAR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model: ModelConfig,
    pub bounds: BoundsConfig,
    pub solver: SolverConfig,
    pub frontier: FrontierConfig,
    /// Ellipsoidal first-stage constraint, off unless present.
    pub robustness: Option<FirstStageRobustness>,
}

impl RunConfig {
    /// Load from a file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: RunConfig = settings.try_deserialize()?;
        tracing::debug!(path = %path.display(), backend = %config.solver.backend, "loaded configuration");
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Model parameters for a scenario set with `num_instruments` assets.
    pub fn to_params(&self, num_instruments: usize) -> Result<ModelParams> {
        let m = &self.model;
        let initial_portfolio = match &m.initial_portfolio {
            InitialPortfolio::Preset(PortfolioPreset::Equal) => {
                vec![m.initial_wealth / num_instruments.max(1) as f64; num_instruments]
            }
            InitialPortfolio::Preset(PortfolioPreset::Cash) => vec![0.0; num_instruments],
            InitialPortfolio::Holdings(h) => h.clone(),
        };
        let mode = match m.mode {
            ModeKind::MinCvar => Mode::MinimiseCvar {
                return_target: m.return_target,
            },
            ModeKind::MaxReturn => Mode::MaximiseReturn,
        };
        let params = ModelParams {
            beta: m.beta,
            cost_to_buy: m.cost_to_buy,
            cost_to_sell: m.cost_to_sell,
            initial_wealth: m.initial_wealth,
            initial_portfolio,
            weight_bounds: self.bounds.weight,
            buy_bounds: self.bounds.buy,
            sell_bounds: self.bounds.sell,
            cvar_cap: m.cvar_cap,
            mode,
        };
        params.validate(num_instruments)?;
        Ok(params)
    }

    /// Problem over `scenarios` as configured.
    pub fn problem<'a>(&self, scenarios: &'a ScenarioSet) -> Result<PortfolioProblem<'a>> {
        let params = self.to_params(scenarios.instruments().len())?;
        let problem = PortfolioProblem::new(scenarios, params);
        Ok(match &self.robustness {
            Some(r) => problem.with_robustness(r.clone()),
            None => problem,
        })
    }
}

/// Objective selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    #[default]
    MinCvar,
    MaxReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioPreset {
    /// Wealth split evenly across instruments.
    Equal,
    /// All wealth held as cash.
    Cash,
}

/// Holdings before the first rebalancing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InitialPortfolio {
    Preset(PortfolioPreset),
    Holdings(Vec<f64>),
}

impl Default for InitialPortfolio {
    fn default() -> Self {
        InitialPortfolio::Preset(PortfolioPreset::Equal)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub beta: f64,
    pub cost_to_buy: f64,
    pub cost_to_sell: f64,
    pub initial_wealth: f64,
    pub initial_portfolio: InitialPortfolio,
    /// Floor on expected terminal wealth; only used by `min_cvar`.
    pub return_target: Option<f64>,
    pub cvar_cap: Option<f64>,
    pub mode: ModeKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            beta: 0.99,
            cost_to_buy: 0.01,
            cost_to_sell: 0.01,
            initial_wealth: 1.0,
            initial_portfolio: InitialPortfolio::default(),
            return_target: Some(1.01),
            cvar_cap: None,
            mode: ModeKind::MinCvar,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    pub weight: Bounds,
    pub buy: Bounds,
    pub sell: Bounds,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        BoundsConfig {
            weight: Bounds::new(0.0, 1.0),
            buy: Bounds::new(0.0, 0.2),
            sell: Bounds::new(0.0, 0.2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: BackendKind,
    pub verbose: bool,
    pub max_iter: u32,
    /// Seconds; unlimited when absent.
    pub time_limit: Option<f64>,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
}

impl SolverConfig {
    pub fn settings(&self) -> Result<Settings> {
        let time_limit = self.time_limit.unwrap_or(f64::INFINITY);
        if time_limit.is_nan() || time_limit <= 0.0 {
            return Err(CvarError::InvalidParameter(format!(
                "time_limit must be positive, got {}",
                time_limit
            )));
        }
        Ok(Settings {
            verbose: self.verbose,
            max_iter: self.max_iter,
            time_limit,
            tol_gap_abs: self.tol_gap_abs,
            tol_gap_rel: self.tol_gap_rel,
        })
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        let s = Settings::default();
        SolverConfig {
            backend: BackendKind::default(),
            verbose: s.verbose,
            max_iter: s.max_iter,
            time_limit: None,
            tol_gap_abs: s.tol_gap_abs,
            tol_gap_rel: s.tol_gap_rel,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    pub points: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        FrontierConfig { points: 20 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_defaults() {
        let config: RunConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.beta, 0.99);
        assert_eq!(config.model.return_target, Some(1.01));
        assert_eq!(config.bounds.buy, Bounds::new(0.0, 0.2));
        assert_eq!(config.solver.backend, BackendKind::Clarabel);
        assert_eq!(config.frontier.points, 20);
        assert!(config.robustness.is_none());
    }

    #[test]
    fn test_equal_portfolio_params() {
        let config: RunConfig = toml::from_str("[model]\ninitial_wealth = 2.0\n").unwrap();
        let params = config.to_params(4).unwrap();
        assert_eq!(params.initial_portfolio, vec![0.5; 4]);
        assert_eq!(
            params.mode,
            Mode::MinimiseCvar {
                return_target: Some(1.01)
            }
        );
    }

    #[test]
    fn test_explicit_sections() {
        let toml_str = r#"
[model]
beta = 0.95
initial_portfolio = [0.2, 0.8]
mode = "max_return"

[bounds]
weight = [0.0, 0.6]
sell = [0.0, 0.1]

[solver]
backend = "microlp"
time_limit = 5.0
"#;
        let config: RunConfig = toml::from_str(toml_str).unwrap();
        let params = config.to_params(2).unwrap();
        assert_eq!(params.initial_portfolio, vec![0.2, 0.8]);
        assert_eq!(params.mode, Mode::MaximiseReturn);
        assert_eq!(params.weight_bounds, Bounds::new(0.0, 0.6));
        assert_eq!(params.buy_bounds, Bounds::new(0.0, 0.2));
        assert_eq!(config.solver.backend, BackendKind::Microlp);
        assert_eq!(config.solver.settings().unwrap().time_limit, 5.0);
    }

    #[test]
    fn test_cash_preset() {
        let config: RunConfig = toml::from_str("[model]\ninitial_portfolio = \"cash\"\n").unwrap();
        assert_eq!(config.to_params(3).unwrap().initial_portfolio, vec![0.0; 3]);
    }

    #[test]
    fn test_wrong_holdings_length_rejected() {
        let config: RunConfig = toml::from_str("[model]\ninitial_portfolio = [1.0]\n").unwrap();
        assert!(matches!(
            config.to_params(2),
            Err(CvarError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_robustness_section() {
        let toml_str = r#"
[robustness]
mean = [1.01, 1.02]
covariance = [[0.01, 0.0], [0.0, 0.02]]
kappa = 1.5
min_return = 0.98
"#;
        let config: RunConfig = toml::from_str(toml_str).unwrap();
        let r = config.robustness.unwrap();
        assert_eq!(r.kappa, 1.5);
        assert_eq!(r.covariance[1][1], 0.02);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[model]\nbeta = 0.9\n\n[frontier]\npoints = 5").unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.model.beta, 0.9);
        assert_eq!(config.frontier.points, 5);
        assert_eq!(config.model.cost_to_buy, 0.01);
    }
}
