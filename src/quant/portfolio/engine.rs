//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(\mathbf{w}_0;\ \mu, \Sigma)
//! $$
//!
//! High-level orchestration: returns model, initial guess, Monte Carlo
//! frontier and Sharpe maximization from one explicit configuration.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::info;
use tracing::warn;

use super::data::compute_returns;
use super::data::PriceSeries;
use super::data::ReturnsMatrix;
use super::data::ReturnsModel;
use super::error::Result;
use super::monte_carlo::sample_frontier;
use super::optimizers::optimize;
use super::optimizers::Minimizer;
use super::optimizers::NelderMeadOptions;
use super::optimizers::NelderMeadPenalty;
use super::optimizers::Slsqp;
use super::optimizers::SlsqpOptions;
use super::simplex::random_simplex;
use super::statistics::statistics;
use super::types::Frontier;
use super::types::OptimizationResult;
use super::types::OptimizerMethod;
use super::types::PortfolioStatistics;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Number of Monte Carlo portfolios.
  pub trials: usize,
  /// Seed for the weight generator; `None` draws from OS entropy.
  pub seed: Option<u64>,
  /// Optimizer used for the Sharpe maximization.
  pub optimizer: OptimizerMethod,
  /// Iteration cap of the optimizer.
  pub max_iter: usize,
  /// Convergence tolerance of the optimizer.
  pub ftol: f64,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      trials: 10_000,
      seed: None,
      optimizer: OptimizerMethod::Slsqp,
      max_iter: 100,
      ftol: 1e-6,
    }
  }
}

/// Everything one engine run produces.
#[derive(Clone, Debug)]
pub struct PortfolioAnalysis {
  pub returns: ReturnsMatrix,
  pub model: ReturnsModel,
  /// Random starting point handed to the optimizer.
  pub initial_weights: Array1<f64>,
  /// `None` when the starting point is degenerate.
  pub initial_statistics: Option<PortfolioStatistics>,
  pub frontier: Frontier,
  pub optimum: OptimizationResult,
}

/// Single entry point for the mean-variance workflow.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Minimizer selected by the configuration.
  pub fn minimizer(&self) -> Box<dyn Minimizer> {
    match self.config.optimizer {
      OptimizerMethod::Slsqp => Box::new(Slsqp::new(SlsqpOptions {
        max_iter: self.config.max_iter,
        ftol: self.config.ftol,
        ..SlsqpOptions::default()
      })),
      OptimizerMethod::NelderMead => Box::new(NelderMeadPenalty::new(NelderMeadOptions {
        max_iters: self.config.max_iter as u64,
        ..NelderMeadOptions::default()
      })),
    }
  }

  /// Run the full analysis on a price table.
  ///
  /// Rows with missing prices are dropped first. The weight generator is
  /// seeded from `config.seed` when set, so a seeded run is reproducible.
  pub fn run(&self, prices: &PriceSeries) -> Result<PortfolioAnalysis> {
    match self.config.seed {
      Some(seed) => self.run_with_rng(prices, &mut StdRng::seed_from_u64(seed)),
      None => self.run_with_rng(prices, &mut StdRng::from_entropy()),
    }
  }

  /// Same as [`Self::run`] with a caller-supplied generator.
  pub fn run_with_rng<R: Rng + ?Sized>(
    &self,
    prices: &PriceSeries,
    rng: &mut R,
  ) -> Result<PortfolioAnalysis> {
    let cleaned;
    let prices = if prices.has_missing() {
      cleaned = prices.drop_missing();
      warn!(
        dropped = prices.len() - cleaned.len(),
        kept = cleaned.len(),
        "dropped price rows with missing values"
      );
      &cleaned
    } else {
      prices
    };

    let returns = compute_returns(prices)?;
    let model = ReturnsModel::from_returns(&returns)?;
    let n = model.n_assets();
    info!(assets = n, observations = returns.len(), "estimated returns model");

    let initial_weights = random_simplex(n, rng)?;
    let initial_statistics = statistics(&initial_weights, &model).ok();

    let frontier = sample_frontier(n, &model, self.config.trials, rng)?;
    info!(
      trials = frontier.len(),
      invalid = frontier.invalid_count(),
      best_sharpe = frontier
        .best()
        .and_then(|t| t.outcome.as_ref().ok())
        .map(|s| s.sharpe),
      "sampled frontier"
    );

    let minimizer = self.minimizer();
    let optimum = optimize(&initial_weights, &model, minimizer.as_ref())?;

    Ok(PortfolioAnalysis {
      returns,
      model,
      initial_weights,
      initial_statistics,
      frontier,
      optimum,
    })
  }
}
