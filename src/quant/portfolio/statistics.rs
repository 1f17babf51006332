//! # Portfolio Statistics
//!
//! $$
//! \mu_p=\mathbf{w}^\top\mu,\qquad \sigma_p=\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}},\qquad S=\frac{\mu_p}{\sigma_p}
//! $$
//!
use ndarray::ArrayView1;

use super::data::ReturnsModel;
use super::error::InputError;
use super::error::PortfolioError;
use super::error::Result;
use super::types::PortfolioStatistics;

// Quadratic forms below this are round-off, not a real negative variance.
const NEGATIVE_VARIANCE_TOL: f64 = 1e-12;

fn check_weights(weights: ArrayView1<'_, f64>, model: &ReturnsModel) -> Result<()> {
  if weights.len() != model.n_assets() {
    return Err(InputError::mismatch("weights", model.n_assets(), weights.len()).into());
  }
  if let Some(row) = weights.iter().position(|w| !w.is_finite()) {
    return Err(
      InputError::MissingValue {
        column: "weights".to_string(),
        row,
      }
      .into(),
    );
  }
  Ok(())
}

/// Expected annualized portfolio return `w · μ`.
pub fn portfolio_return<'a>(
  weights: impl Into<ArrayView1<'a, f64>>,
  model: &ReturnsModel,
) -> Result<f64> {
  let w = weights.into();
  check_weights(w, model)?;
  Ok(w.dot(model.mean()))
}

/// Expected annualized portfolio volatility `sqrt(wᵀ Σ w)`.
pub fn portfolio_volatility<'a>(
  weights: impl Into<ArrayView1<'a, f64>>,
  model: &ReturnsModel,
) -> Result<f64> {
  let w = weights.into();
  check_weights(w, model)?;
  volatility_unchecked(w, model)
}

fn volatility_unchecked(w: ArrayView1<'_, f64>, model: &ReturnsModel) -> Result<f64> {
  variance_unchecked(w, model).map(|(variance, _)| variance.sqrt())
}

// Portfolio variance (clamped at zero) and the largest covariance magnitude.
fn variance_unchecked(w: ArrayView1<'_, f64>, model: &ReturnsModel) -> Result<(f64, f64)> {
  let variance = w.dot(&model.covariance().dot(&w));
  let scale = model
    .covariance()
    .iter()
    .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    .max(f64::MIN_POSITIVE);

  if variance < -NEGATIVE_VARIANCE_TOL * scale {
    return Err(
      InputError::InvalidModel(format!(
        "covariance produced a negative portfolio variance ({variance:e})"
      ))
      .into(),
    );
  }

  Ok((variance.max(0.0), scale))
}

/// Expected return, volatility and Sharpe ratio of a weight vector.
///
/// A portfolio whose variance is zero up to round-off (at most `f64::EPSILON`
/// times the largest covariance entry) has no Sharpe ratio and yields
/// [`PortfolioError::DegenerateStatistics`].
pub fn statistics<'a>(
  weights: impl Into<ArrayView1<'a, f64>>,
  model: &ReturnsModel,
) -> Result<PortfolioStatistics> {
  let w = weights.into();
  check_weights(w, model)?;

  let expected_return = w.dot(model.mean());
  let (variance, scale) = variance_unchecked(w, model)?;
  let volatility = variance.sqrt();
  // variance at round-off level of the covariance entries counts as zero
  if variance <= f64::EPSILON * scale || !volatility.is_finite() {
    return Err(PortfolioError::DegenerateStatistics { volatility });
  }

  Ok(PortfolioStatistics {
    expected_return,
    volatility,
    sharpe: expected_return / volatility,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;
  use ndarray::Array1;

  use super::*;

  fn two_asset_model() -> ReturnsModel {
    // daily means 0.001 / 0.002, daily variances 1e-4 / 4e-4, uncorrelated
    ReturnsModel::from_moments(
      vec!["AAA".into(), "BBB".into()],
      array![0.001, 0.002] * 252.0,
      array![[1e-4, 0.0], [0.0, 4e-4]] * 252.0,
    )
    .unwrap()
  }

  #[test]
  fn two_uncorrelated_assets_equal_weight() {
    let model = two_asset_model();
    let stats = statistics(&array![0.5, 0.5], &model).unwrap();

    let expected_vol = (0.25 * 1e-4 * 252.0 + 0.25 * 4e-4 * 252.0_f64).sqrt();
    assert_abs_diff_eq!(stats.expected_return, 0.0015 * 252.0, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.volatility, expected_vol, epsilon = 1e-9);
    assert_abs_diff_eq!(
      stats.sharpe,
      0.0015 * 252.0 / expected_vol,
      epsilon = 1e-9
    );
  }

  #[test]
  fn split_helpers_agree_with_statistics() {
    let model = two_asset_model();
    let w = array![0.3, 0.7];
    let stats = statistics(&w, &model).unwrap();

    assert_eq!(portfolio_return(&w, &model).unwrap(), stats.expected_return);
    assert_eq!(portfolio_volatility(&w, &model).unwrap(), stats.volatility);
  }

  #[test]
  fn zero_variance_asset_is_degenerate() {
    let model =
      ReturnsModel::from_moments(vec!["CASH".into()], array![0.02], array![[0.0]]).unwrap();

    assert_eq!(
      statistics(&array![1.0], &model),
      Err(PortfolioError::DegenerateStatistics { volatility: 0.0 })
    );
    assert_eq!(portfolio_volatility(&array![1.0], &model), Ok(0.0));
  }

  #[test]
  fn round_off_volatility_is_degenerate() {
    let model = ReturnsModel::from_moments(
      vec!["CASH".into(), "RISK".into()],
      array![0.02, 0.10],
      array![[0.0, 0.0], [0.0, 0.04]],
    )
    .unwrap();

    // sqrt(0.04) * 1.7e-17: a volatility left over by round-off in the weights
    match statistics(&array![1.0, 1.7e-17], &model) {
      Err(PortfolioError::DegenerateStatistics { volatility }) => assert!(volatility < 1e-15),
      other => panic!("unexpected {other:?}"),
    }
    assert!(statistics(&array![0.999, 0.001], &model).is_ok());
  }

  #[test]
  fn weight_length_must_match_assets() {
    let model = two_asset_model();
    assert!(matches!(
      statistics(&array![1.0], &model),
      Err(PortfolioError::Input(InputError::DimensionMismatch {
        expected: 2,
        actual: 1,
        ..
      }))
    ));
    assert!(matches!(
      statistics(&array![f64::NAN, 1.0], &model),
      Err(PortfolioError::Input(InputError::MissingValue { .. }))
    ));
  }

  #[test]
  fn renormalized_scaling_leaves_statistics_unchanged() {
    let model = ReturnsModel::from_moments(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.08, 0.12, 0.05],
      array![[0.04, 0.006, 0.0], [0.006, 0.09, 0.01], [0.0, 0.01, 0.02]],
    )
    .unwrap();

    let raw = array![0.2, 0.5, 0.9];
    let base = &raw / raw.sum();
    let reference = statistics(&base, &model).unwrap();

    for c in [0.01, 3.0, 250.0] {
      let scaled: Array1<f64> = &raw * c;
      let renormalized = &scaled / scaled.sum();
      let stats = statistics(&renormalized, &model).unwrap();
      assert_relative_eq!(stats.expected_return, reference.expected_return, epsilon = 1e-12);
      assert_relative_eq!(stats.volatility, reference.volatility, epsilon = 1e-12);
    }
  }

  #[test]
  fn sharpe_sign_follows_expected_return() {
    let model = ReturnsModel::from_moments(
      vec!["UP".into(), "DOWN".into()],
      array![0.1, -0.3],
      array![[0.04, 0.0], [0.0, 0.04]],
    )
    .unwrap();

    for w in [array![0.9, 0.1], array![0.5, 0.5], array![0.1, 0.9]] {
      let stats = statistics(&w, &model).unwrap();
      assert!(stats.volatility > 0.0);
      assert_eq!(stats.sharpe.signum(), stats.expected_return.signum());
    }
  }
}
