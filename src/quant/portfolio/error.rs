//! # Portfolio Errors
//!
//! $$
//! \sigma_p = 0 \Rightarrow \frac{\mu_p}{\sigma_p}\ \text{undefined}
//! $$
//!
//! Error taxonomy shared by the returns model, statistics and optimizer.

use thiserror::Error;

/// Result alias for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Invalid input handed to the returns model, statistics or optimizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
  /// Not enough observations for the requested statistic.
  #[error("insufficient data: need at least {required} observations, got {available}")]
  InsufficientData { required: usize, available: usize },

  /// NaN or infinite value in prices or weights.
  #[error("missing or non-finite value for '{column}' at row {row}")]
  MissingValue { column: String, row: usize },

  /// Price that cannot be log-transformed.
  #[error("non-positive price {price} for '{asset}' at row {row}")]
  NonPositivePrice {
    asset: String,
    row: usize,
    price: f64,
  },

  /// Lengths of paired inputs disagree.
  #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
  DimensionMismatch {
    context: String,
    expected: usize,
    actual: usize,
  },

  /// Dates are duplicated or out of order.
  #[error("dates must be strictly increasing (row {row})")]
  UnorderedDates { row: usize },

  /// Mean/covariance pair violating the model invariants.
  #[error("invalid returns model: {0}")]
  InvalidModel(String),

  /// Asset listed more than once in a price table.
  #[error("duplicate asset '{0}'")]
  DuplicateAsset(String),

  /// Empty input where at least one element is required.
  #[error("empty input: {0}")]
  Empty(String),
}

/// Errors raised by the portfolio core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  #[error(transparent)]
  Input(#[from] InputError),

  /// Sharpe ratio requested for a portfolio with zero volatility.
  #[error("degenerate statistics: portfolio volatility is {volatility}")]
  DegenerateStatistics { volatility: f64 },

  /// Solver stopped without meeting its convergence criteria.
  #[error("optimization did not converge after {iterations} iterations: {message}")]
  OptimizationFailure {
    /// Best weights found before the solver stopped.
    weights: Vec<f64>,
    iterations: usize,
    message: String,
  },
}

impl InputError {
  pub(crate) fn mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch {
      context: context.into(),
      expected,
      actual,
    }
  }
}
