//! # Portfolio Data
//!
//! $$
//! r_t=\ln\frac{P_t}{P_{t-1}},\qquad \mu=252\,\bar r,\qquad \Sigma=252\,\widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Price tables, log-return preprocessing and the annualized mean/covariance model.

use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::error::InputError;
use super::error::Result;

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

const SYMMETRY_TOL: f64 = 1e-12;

fn ensure_strictly_increasing(dates: &[NaiveDate]) -> Result<()> {
  for (row, pair) in dates.windows(2).enumerate() {
    if pair[1] <= pair[0] {
      return Err(InputError::UnorderedDates { row: row + 1 }.into());
    }
  }
  Ok(())
}

/// Adjusted close prices, one row per date and one column per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  prices: Array2<f64>,
}

impl PriceSeries {
  /// Build a price table. Dates must be strictly increasing and the matrix
  /// shape must be `dates x assets`. Missing prices may be stored as NaN.
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    if assets.is_empty() {
      return Err(InputError::Empty("price series has no assets".to_string()).into());
    }

    let mut seen = HashSet::with_capacity(assets.len());
    for asset in &assets {
      if !seen.insert(asset.as_str()) {
        return Err(InputError::DuplicateAsset(asset.clone()).into());
      }
    }

    if prices.nrows() != dates.len() {
      return Err(InputError::mismatch("price rows", dates.len(), prices.nrows()).into());
    }
    if prices.ncols() != assets.len() {
      return Err(InputError::mismatch("price columns", assets.len(), prices.ncols()).into());
    }

    ensure_strictly_increasing(&dates)?;

    Ok(Self {
      dates,
      assets,
      prices,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of observations (dates).
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// True when any price is NaN, infinite or non-positive.
  pub fn has_missing(&self) -> bool {
    self.prices.iter().any(|&p| !p.is_finite() || p <= 0.0)
  }

  /// Drop every date on which at least one asset has an unusable price.
  pub fn drop_missing(&self) -> Self {
    let keep: Vec<usize> = self
      .prices
      .axis_iter(Axis(0))
      .enumerate()
      .filter(|(_, row)| row.iter().all(|&p| p.is_finite() && p > 0.0))
      .map(|(i, _)| i)
      .collect();

    Self {
      dates: keep.iter().map(|&i| self.dates[i]).collect(),
      assets: self.assets.clone(),
      prices: self.prices.select(Axis(0), &keep),
    }
  }
}

/// Daily log-returns. One row fewer than the price table it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnsMatrix {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  values: Array2<f64>,
}

impl ReturnsMatrix {
  /// Wrap precomputed daily log-returns.
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if values.nrows() == 0 {
      return Err(
        InputError::InsufficientData {
          required: 1,
          available: 0,
        }
        .into(),
      );
    }
    if values.nrows() != dates.len() {
      return Err(InputError::mismatch("return rows", dates.len(), values.nrows()).into());
    }
    if values.ncols() != assets.len() {
      return Err(InputError::mismatch("return columns", assets.len(), values.ncols()).into());
    }
    ensure_strictly_increasing(&dates)?;

    if let Some(((row, col), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
      return Err(
        InputError::MissingValue {
          column: assets[col].clone(),
          row,
        }
        .into(),
      );
    }

    Ok(Self {
      dates,
      assets,
      values,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn len(&self) -> usize {
    self.values.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.values.nrows() == 0
  }
}

/// Convert a price table into daily log-returns.
///
/// Fails on fewer than two observations and on missing or non-positive prices;
/// clean the table with [`PriceSeries::drop_missing`] first.
pub fn compute_returns(series: &PriceSeries) -> Result<ReturnsMatrix> {
  if series.len() < 2 {
    return Err(
      InputError::InsufficientData {
        required: 2,
        available: series.len(),
      }
      .into(),
    );
  }

  for ((row, col), &price) in series.prices.indexed_iter() {
    if !price.is_finite() {
      return Err(
        InputError::MissingValue {
          column: series.assets[col].clone(),
          row,
        }
        .into(),
      );
    }
    if price <= 0.0 {
      return Err(
        InputError::NonPositivePrice {
          asset: series.assets[col].clone(),
          row,
          price,
        }
        .into(),
      );
    }
  }

  let prev = series.prices.slice(s![..-1, ..]);
  let next = series.prices.slice(s![1.., ..]);
  let values = (&next / &prev).mapv(f64::ln);

  Ok(ReturnsMatrix {
    dates: series.dates[1..].to_vec(),
    assets: series.assets.clone(),
    values,
  })
}

/// Column means of the daily returns scaled by [`TRADING_DAYS_PER_YEAR`].
pub fn annualized_mean(returns: &ReturnsMatrix) -> Array1<f64> {
  let n = returns.values.nrows() as f64;
  returns.values.sum_axis(Axis(0)) * (TRADING_DAYS_PER_YEAR / n)
}

/// Sample covariance (ddof = 1) of the daily returns scaled by [`TRADING_DAYS_PER_YEAR`].
pub fn annualized_covariance(returns: &ReturnsMatrix) -> Result<Array2<f64>> {
  let n = returns.values.nrows();
  if n < 2 {
    return Err(
      InputError::InsufficientData {
        required: 2,
        available: n,
      }
      .into(),
    );
  }

  // rows are variables for ndarray-stats
  let cov = returns
    .values
    .t()
    .cov(1.0)
    .map_err(|_| InputError::Empty("returns matrix".to_string()))?;
  let cov = (&cov + &cov.t()) * (0.5 * TRADING_DAYS_PER_YEAR);

  Ok(cov)
}

/// Annualized first and second moments of daily log-returns.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnsModel {
  assets: Vec<String>,
  mean: Array1<f64>,
  covariance: Array2<f64>,
}

impl ReturnsModel {
  /// Estimate the model from a price table.
  pub fn from_prices(series: &PriceSeries) -> Result<Self> {
    let returns = compute_returns(series)?;
    Self::from_returns(&returns)
  }

  /// Estimate the model from daily log-returns.
  pub fn from_returns(returns: &ReturnsMatrix) -> Result<Self> {
    let mean = annualized_mean(returns);
    let covariance = annualized_covariance(returns)?;
    Self::from_moments(returns.assets.clone(), mean, covariance)
  }

  /// Build the model from already annualized moments.
  pub fn from_moments(
    assets: Vec<String>,
    mean: Array1<f64>,
    covariance: Array2<f64>,
  ) -> Result<Self> {
    let n = mean.len();
    if n == 0 {
      return Err(InputError::Empty("mean return vector".to_string()).into());
    }
    if assets.len() != n {
      return Err(InputError::mismatch("asset names", n, assets.len()).into());
    }
    if covariance.dim() != (n, n) {
      return Err(
        InputError::InvalidModel(format!(
          "covariance must be {n}x{n}, got {}x{}",
          covariance.nrows(),
          covariance.ncols()
        ))
        .into(),
      );
    }
    if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(InputError::InvalidModel("non-finite moment".to_string()).into());
    }

    let scale = covariance.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    for i in 0..n {
      if covariance[[i, i]] < 0.0 {
        return Err(
          InputError::InvalidModel(format!("negative variance for asset {i}")).into(),
        );
      }
      for j in (i + 1)..n {
        if (covariance[[i, j]] - covariance[[j, i]]).abs() > SYMMETRY_TOL * scale.max(1.0) {
          return Err(
            InputError::InvalidModel(format!("covariance is not symmetric at ({i}, {j})")).into(),
          );
        }
      }
    }

    Ok(Self {
      assets,
      mean,
      covariance,
    })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Annualized mean return per asset.
  pub fn mean(&self) -> &Array1<f64> {
    &self.mean
  }

  /// Annualized covariance matrix.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }
}

#[cfg(test)]
pub(crate) fn synthetic_prices(assets: &[&str], daily_returns: &[Vec<f64>]) -> PriceSeries {
  use chrono::Days;

  let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
  let n_assets = assets.len();
  let n_rows = daily_returns.len() + 1;
  let mut prices = Array2::<f64>::zeros((n_rows, n_assets));
  prices.row_mut(0).fill(100.0);
  for (t, row) in daily_returns.iter().enumerate() {
    for j in 0..n_assets {
      prices[[t + 1, j]] = prices[[t, j]] * row[j].exp();
    }
  }

  let dates = (0..n_rows)
    .map(|i| start.checked_add_days(Days::new(i as u64)).unwrap())
    .collect();

  PriceSeries::new(
    dates,
    assets.iter().map(|a| a.to_string()).collect(),
    prices,
  )
  .unwrap()
}
