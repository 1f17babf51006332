//! # markowitz-rs
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\Delta} \frac{\mathbf{w}^\top\mu}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Mean-variance portfolio analysis: log-return covariance model, Monte Carlo
//! frontier sampling and long-only Sharpe-ratio maximization.

pub mod quant;
pub mod visualization;

pub use quant::portfolio;
