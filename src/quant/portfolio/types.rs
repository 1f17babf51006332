//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for sampling and optimization.

use ndarray::Array1;

use super::error::PortfolioError;
use super::error::Result;

/// Expected return, volatility and Sharpe ratio of one weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioStatistics {
  /// Annualized expected portfolio return.
  pub expected_return: f64,
  /// Annualized portfolio volatility.
  pub volatility: f64,
  /// `expected_return / volatility`.
  pub sharpe: f64,
}

/// Supported solvers for the Sharpe maximization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizerMethod {
  /// Sequential least-squares quadratic programming.
  #[default]
  Slsqp,
  /// Nelder-Mead on a penalized objective.
  NelderMead,
}

impl OptimizerMethod {
  /// Parse a string into an [`OptimizerMethod`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "nelder-mead" | "neldermead" | "nm" => Self::NelderMead,
      _ => Self::Slsqp,
    }
  }
}

/// One Monte Carlo draw and its evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierTrial {
  pub weights: Array1<f64>,
  pub outcome: Result<PortfolioStatistics>,
}

/// Empirical return/volatility cloud of randomly weighted portfolios.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frontier {
  pub trials: Vec<FrontierTrial>,
}

impl Frontier {
  pub fn len(&self) -> usize {
    self.trials.len()
  }

  pub fn is_empty(&self) -> bool {
    self.trials.is_empty()
  }

  /// Statistics of the trials that evaluated successfully.
  pub fn valid(&self) -> impl Iterator<Item = &PortfolioStatistics> + '_ {
    self.trials.iter().filter_map(|t| t.outcome.as_ref().ok())
  }

  pub fn invalid_count(&self) -> usize {
    self.trials.iter().filter(|t| t.outcome.is_err()).count()
  }

  /// Expected returns of the valid trials.
  pub fn returns(&self) -> Vec<f64> {
    self.valid().map(|s| s.expected_return).collect()
  }

  /// Volatilities of the valid trials.
  pub fn volatilities(&self) -> Vec<f64> {
    self.valid().map(|s| s.volatility).collect()
  }

  pub fn sharpe_ratios(&self) -> Vec<f64> {
    self.valid().map(|s| s.sharpe).collect()
  }

  /// Valid trial with the highest Sharpe ratio.
  pub fn best(&self) -> Option<&FrontierTrial> {
    self
      .trials
      .iter()
      .filter(|t| t.outcome.is_ok())
      .max_by(|a, b| {
        let sa = a.outcome.as_ref().map(|s| s.sharpe).unwrap_or(f64::NEG_INFINITY);
        let sb = b.outcome.as_ref().map(|s| s.sharpe).unwrap_or(f64::NEG_INFINITY);
        sa.total_cmp(&sb)
      })
  }
}

/// Output of a Sharpe maximization run.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationResult {
  /// Best weights found, clipped to `[0, 1]`.
  pub weights: Array1<f64>,
  /// Statistics of `weights`; `None` when they are degenerate.
  pub statistics: Option<PortfolioStatistics>,
  /// Whether the solver met its convergence criteria.
  pub success: bool,
  pub iterations: usize,
  /// Final objective value (negative Sharpe ratio).
  pub objective: f64,
  pub message: String,
}

impl OptimizationResult {
  /// Weights rounded to `decimals` places, as shown in reports.
  pub fn rounded_weights(&self, decimals: i32) -> Array1<f64> {
    let factor = 10f64.powi(decimals);
    self.weights.mapv(|w| (w * factor).round() / factor)
  }

  /// Turn a non-converged result into [`PortfolioError::OptimizationFailure`].
  pub fn into_converged(self) -> Result<Self> {
    if self.success {
      Ok(self)
    } else {
      Err(PortfolioError::OptimizationFailure {
        weights: self.weights.to_vec(),
        iterations: self.iterations,
        message: self.message,
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  #[test]
  fn optimizer_method_parsing_defaults_to_slsqp() {
    assert_eq!(OptimizerMethod::from_str("Nelder-Mead"), OptimizerMethod::NelderMead);
    assert_eq!(OptimizerMethod::from_str("slsqp"), OptimizerMethod::Slsqp);
    assert_eq!(OptimizerMethod::from_str("whatever"), OptimizerMethod::Slsqp);
  }

  #[test]
  fn frontier_skips_invalid_trials() {
    let ok = PortfolioStatistics {
      expected_return: 0.1,
      volatility: 0.2,
      sharpe: 0.5,
    };
    let better = PortfolioStatistics {
      expected_return: 0.2,
      volatility: 0.2,
      sharpe: 1.0,
    };
    let frontier = Frontier {
      trials: vec![
        FrontierTrial {
          weights: array![1.0, 0.0],
          outcome: Ok(ok),
        },
        FrontierTrial {
          weights: array![0.0, 1.0],
          outcome: Err(PortfolioError::DegenerateStatistics { volatility: 0.0 }),
        },
        FrontierTrial {
          weights: array![0.5, 0.5],
          outcome: Ok(better),
        },
      ],
    };

    assert_eq!(frontier.len(), 3);
    assert_eq!(frontier.invalid_count(), 1);
    assert_eq!(frontier.returns(), vec![0.1, 0.2]);
    assert_eq!(frontier.volatilities(), vec![0.2, 0.2]);
    assert_eq!(frontier.best().map(|t| t.weights.clone()), Some(array![0.5, 0.5]));
  }

  #[test]
  fn non_converged_result_becomes_failure() {
    let result = OptimizationResult {
      weights: array![0.12345, 0.87655],
      statistics: None,
      success: false,
      iterations: 100,
      objective: -0.4,
      message: "Iteration limit reached".to_string(),
    };

    assert_eq!(result.rounded_weights(3), array![0.123, 0.877]);
    match result.into_converged() {
      Err(PortfolioError::OptimizationFailure {
        weights,
        iterations,
        ..
      }) => {
        assert_eq!(weights, vec![0.12345, 0.87655]);
        assert_eq!(iterations, 100);
      }
      other => panic!("unexpected {other:?}"),
    }
  }
}
