//! # Monte Carlo Frontier
//!
//! $$
//! \{(\sigma_p(\mathbf{w}^{(k)}),\ \mu_p(\mathbf{w}^{(k)}))\}_{k=1}^{N},\qquad \mathbf{w}^{(k)}\sim\text{normalized }\mathcal U[0,1)^n
//! $$
//!
//! Random portfolios evaluated against a [`ReturnsModel`].

use rand::Rng;
use tracing::debug;
use tracing::warn;

use super::data::ReturnsModel;
use super::error::InputError;
use super::error::Result;
use super::simplex::random_simplex;
use super::statistics::statistics;
use super::types::Frontier;
use super::types::FrontierTrial;

/// Draw `trials` random portfolios and evaluate each one.
///
/// A trial whose statistics cannot be computed is kept as invalid and the
/// batch continues. Reuse a seeded generator to reproduce a frontier exactly.
pub fn sample_frontier<R: Rng + ?Sized>(
  n_assets: usize,
  model: &ReturnsModel,
  trials: usize,
  rng: &mut R,
) -> Result<Frontier> {
  if n_assets != model.n_assets() {
    return Err(InputError::mismatch("frontier assets", model.n_assets(), n_assets).into());
  }

  let mut frontier = Frontier {
    trials: Vec::with_capacity(trials),
  };

  for _ in 0..trials {
    let weights = random_simplex(n_assets, rng)?;
    let outcome = statistics(&weights, model);
    frontier.trials.push(FrontierTrial { weights, outcome });
  }

  let invalid = frontier.invalid_count();
  if invalid > 0 {
    warn!(invalid, trials, "frontier contains degenerate portfolios");
  }
  debug!(trials, n_assets, "sampled Monte Carlo frontier");

  Ok(frontier)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use tracing_test::traced_test;

  use super::*;
  use crate::quant::portfolio::error::PortfolioError;

  fn model() -> ReturnsModel {
    ReturnsModel::from_moments(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.08, 0.12, 0.05],
      array![[0.04, 0.006, 0.0], [0.006, 0.09, 0.01], [0.0, 0.01, 0.02]],
    )
    .unwrap()
  }

  #[test]
  fn fixed_seed_reproduces_frontier_bit_for_bit() {
    let m = model();
    let a = sample_frontier(3, &m, 500, &mut StdRng::seed_from_u64(42)).unwrap();
    let b = sample_frontier(3, &m, 500, &mut StdRng::seed_from_u64(42)).unwrap();

    assert_eq!(a.len(), 500);
    for (x, y) in a.trials.iter().zip(b.trials.iter()) {
      assert_eq!(x.weights, y.weights);
      let (sx, sy) = (x.outcome.as_ref().unwrap(), y.outcome.as_ref().unwrap());
      assert_eq!(sx.expected_return.to_bits(), sy.expected_return.to_bits());
      assert_eq!(sx.volatility.to_bits(), sy.volatility.to_bits());
    }

    let c = sample_frontier(3, &m, 500, &mut StdRng::seed_from_u64(43)).unwrap();
    assert_ne!(a, c);
  }

  #[test]
  fn sampled_weights_are_on_the_simplex_and_bounded_by_assets() {
    let m = model();
    let frontier = sample_frontier(3, &m, 1000, &mut StdRng::seed_from_u64(1)).unwrap();

    assert_eq!(frontier.invalid_count(), 0);
    for trial in &frontier.trials {
      assert_abs_diff_eq!(trial.weights.sum(), 1.0, epsilon = 1e-9);
      assert!(trial.weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }
    for r in frontier.returns() {
      assert!((0.05..=0.12).contains(&r));
    }
  }

  #[traced_test]
  #[test]
  fn degenerate_trials_are_marked_and_batch_continues() {
    let cash = ReturnsModel::from_moments(
      vec!["CASH1".into(), "CASH2".into()],
      array![0.01, 0.02],
      array![[0.0, 0.0], [0.0, 0.0]],
    )
    .unwrap();

    let frontier = sample_frontier(2, &cash, 25, &mut StdRng::seed_from_u64(5)).unwrap();

    assert_eq!(frontier.len(), 25);
    assert_eq!(frontier.invalid_count(), 25);
    assert!(frontier.returns().is_empty());
    assert!(frontier
      .trials
      .iter()
      .all(|t| matches!(t.outcome, Err(PortfolioError::DegenerateStatistics { .. }))));
    assert!(logs_contain("frontier contains degenerate portfolios"));
  }

  #[test]
  fn asset_count_must_match_model() {
    let m = model();
    assert!(sample_frontier(2, &m, 10, &mut StdRng::seed_from_u64(0)).is_err());
    assert!(sample_frontier(3, &m, 0, &mut StdRng::seed_from_u64(0))
      .unwrap()
      .is_empty());
  }
}
