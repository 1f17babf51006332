//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Returns model, portfolio statistics, Monte Carlo frontier sampling and
//! Sharpe-ratio optimization.

pub mod data;
pub mod engine;
pub mod error;
pub mod monte_carlo;
pub mod optimizers;
mod qp;
pub mod report;
pub mod simplex;
pub mod statistics;
pub mod types;

pub use data::annualized_covariance;
pub use data::annualized_mean;
pub use data::compute_returns;
pub use data::PriceSeries;
pub use data::ReturnsMatrix;
pub use data::ReturnsModel;
pub use data::TRADING_DAYS_PER_YEAR;
pub use engine::PortfolioAnalysis;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use error::InputError;
pub use error::PortfolioError;
pub use error::Result;
pub use monte_carlo::sample_frontier;
pub use optimizers::optimize;
pub use optimizers::Bounds;
pub use optimizers::Constraint;
pub use optimizers::MinimizeResult;
pub use optimizers::Minimizer;
pub use optimizers::NelderMeadOptions;
pub use optimizers::NelderMeadPenalty;
pub use optimizers::Slsqp;
pub use optimizers::SlsqpOptions;
pub use report::PortfolioReport;
pub use simplex::random_simplex;
pub use statistics::portfolio_return;
pub use statistics::portfolio_volatility;
pub use statistics::statistics;
pub use types::Frontier;
pub use types::FrontierTrial;
pub use types::OptimizationResult;
pub use types::OptimizerMethod;
pub use types::PortfolioStatistics;
