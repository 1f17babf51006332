//! # Portfolio Report
//!
//! Console tables for an engine run: annualized moments, the optimal
//! allocation rounded for display, and the statistics of that rounded
//! allocation.

use std::fmt;

use ndarray::Array1;
use ndarray::Array2;
use prettytable::format;
use prettytable::row;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;

use super::engine::PortfolioAnalysis;
use super::statistics::statistics;
use super::types::PortfolioStatistics;

/// Decimal places of the reported weights.
pub const WEIGHT_DECIMALS: i32 = 3;

/// Snapshot of a [`PortfolioAnalysis`] ready for printing.
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioReport {
  pub assets: Vec<String>,
  pub mean: Array1<f64>,
  pub covariance: Array2<f64>,
  pub initial_statistics: Option<PortfolioStatistics>,
  /// Optimal weights rounded to [`WEIGHT_DECIMALS`].
  pub weights: Array1<f64>,
  /// Statistics of the rounded weights; `None` if they are degenerate.
  pub statistics: Option<PortfolioStatistics>,
  pub success: bool,
  pub iterations: usize,
  pub message: String,
}

impl PortfolioReport {
  pub fn from_analysis(analysis: &PortfolioAnalysis) -> Self {
    let weights = analysis.optimum.rounded_weights(WEIGHT_DECIMALS);
    let stats = statistics(&weights, &analysis.model).ok();

    Self {
      assets: analysis.model.assets().to_vec(),
      mean: analysis.model.mean().clone(),
      covariance: analysis.model.covariance().clone(),
      initial_statistics: analysis.initial_statistics,
      weights,
      statistics: stats,
      success: analysis.optimum.success,
      iterations: analysis.optimum.iterations,
      message: analysis.optimum.message.clone(),
    }
  }

  fn table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table
  }

  /// Annualized mean return per asset.
  pub fn mean_table(&self) -> Table {
    let mut table = Self::table();
    table.set_titles(row!["Asset", "Annualized mean"]);
    for (asset, mu) in self.assets.iter().zip(self.mean.iter()) {
      table.add_row(row![asset, format!("{mu:.6}")]);
    }
    table
  }

  /// Annualized covariance matrix.
  pub fn covariance_table(&self) -> Table {
    let mut table = Self::table();
    let mut titles = vec![Cell::new("")];
    titles.extend(self.assets.iter().map(|a| Cell::new(a)));
    table.set_titles(Row::new(titles));

    for (asset, cov_row) in self.assets.iter().zip(self.covariance.rows()) {
      let mut cells = vec![Cell::new(asset)];
      cells.extend(cov_row.iter().map(|c| Cell::new(&format!("{c:.6}"))));
      table.add_row(Row::new(cells));
    }
    table
  }

  /// Rounded optimal weights.
  pub fn weights_table(&self) -> Table {
    let mut table = Self::table();
    table.set_titles(row!["Asset", "Optimal weight"]);
    for (asset, w) in self.assets.iter().zip(self.weights.iter()) {
      table.add_row(row![asset, format!("{w:.3}")]);
    }
    table
  }

  pub fn summary_table(&self) -> Table {
    let fmt_stats = |s: Option<PortfolioStatistics>| match s {
      Some(s) => [
        format!("{:.6}", s.expected_return),
        format!("{:.6}", s.volatility),
        format!("{:.6}", s.sharpe),
      ],
      None => ["n/a".to_string(), "n/a".to_string(), "n/a".to_string()],
    };

    let mut table = Self::table();
    table.set_titles(row!["Portfolio", "Expected return", "Volatility", "Sharpe ratio"]);
    let [r, v, s] = fmt_stats(self.initial_statistics);
    table.add_row(row!["Initial guess", r, v, s]);
    let [r, v, s] = fmt_stats(self.statistics);
    table.add_row(row!["Optimal (rounded)", r, v, s]);
    table
  }
}

impl fmt::Display for PortfolioReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Annualized mean returns")?;
    write!(f, "{}", self.mean_table())?;
    writeln!(f, "Annualized covariance")?;
    write!(f, "{}", self.covariance_table())?;
    writeln!(f, "Optimal weights")?;
    write!(f, "{}", self.weights_table())?;
    write!(f, "{}", self.summary_table())?;
    writeln!(
      f,
      "Optimizer: {} after {} iterations ({})",
      if self.success { "converged" } else { "did not converge" },
      self.iterations,
      self.message
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::data::synthetic_prices;
  use crate::quant::portfolio::data::ReturnsModel;
  use crate::quant::portfolio::engine::PortfolioEngine;
  use crate::quant::portfolio::engine::PortfolioEngineConfig;
  use crate::quant::portfolio::types::Frontier;
  use crate::quant::portfolio::types::OptimizationResult;

  fn analysis_with_weights(weights: Array1<f64>) -> PortfolioAnalysis {
    let prices = synthetic_prices(
      &["AAA", "BBB"],
      &[
        vec![0.01, -0.02],
        vec![-0.01, 0.02],
        vec![0.012, 0.018],
        vec![-0.008, -0.022],
      ],
    );
    let returns = crate::quant::portfolio::data::compute_returns(&prices).unwrap();
    let model = ReturnsModel::from_returns(&returns).unwrap();

    PortfolioAnalysis {
      returns,
      initial_statistics: statistics(&array![0.5, 0.5], &model).ok(),
      model,
      initial_weights: array![0.5, 0.5],
      frontier: Frontier::default(),
      optimum: OptimizationResult {
        weights,
        statistics: None,
        success: true,
        iterations: 4,
        objective: -1.0,
        message: "Optimization terminated successfully".to_string(),
      },
    }
  }

  #[test]
  fn reports_statistics_of_the_rounded_weights() {
    let analysis = analysis_with_weights(array![0.61234, 0.38766]);
    let report = PortfolioReport::from_analysis(&analysis);

    assert_eq!(report.weights, array![0.612, 0.388]);
    let expected = statistics(&array![0.612, 0.388], &analysis.model).unwrap();
    let got = report.statistics.unwrap();
    assert_abs_diff_eq!(got.expected_return, expected.expected_return, epsilon = 1e-15);
    assert_abs_diff_eq!(got.sharpe, expected.sharpe, epsilon = 1e-15);
  }

  #[test]
  fn rendering_lists_every_asset_and_the_solver_status() {
    let report = PortfolioReport::from_analysis(&analysis_with_weights(array![1.0, 0.0]));
    let text = report.to_string();

    for needle in [
      "Annualized mean returns",
      "Annualized covariance",
      "AAA",
      "BBB",
      "1.000",
      "0.000",
      "Optimal (rounded)",
      "converged after 4 iterations",
    ] {
      assert!(text.contains(needle), "missing {needle:?} in\n{text}");
    }
  }

  #[test]
  fn report_from_engine_run() {
    let rows: Vec<Vec<f64>> = (0..60)
      .map(|t| {
        let s = if t % 2 == 0 { 1.0 } else { -1.0 };
        let q = if (t / 2) % 2 == 0 { 1.0 } else { -1.0 };
        vec![0.001 + 0.01 * s, 0.0005 + 0.02 * q]
      })
      .collect();
    let prices = synthetic_prices(&["AAA", "BBB"], &rows);
    let engine = PortfolioEngine::new(PortfolioEngineConfig {
      trials: 50,
      seed: Some(1),
      ..PortfolioEngineConfig::default()
    });
    let report = PortfolioReport::from_analysis(&engine.run(&prices).unwrap());

    assert_eq!(report.assets, vec!["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(report.covariance.dim(), (2, 2));
    assert_abs_diff_eq!(report.weights.sum(), 1.0, epsilon = 2e-3);
    assert_eq!(report.mean_table().len(), 2);
    assert_eq!(report.covariance_table().len(), 2);
  }
}
