//! # Quant
//!
//! $$
//! P_t \mapsto r_t=\ln\frac{P_t}{P_{t-1}} \mapsto (\mu,\Sigma) \mapsto \mathbf{w}^\*
//! $$
//!
pub mod market_data;
pub mod portfolio;
#[cfg(feature = "yahoo")]
pub mod yahoo;
