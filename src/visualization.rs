//! # Visualization
//!
//! $$
//! \{(\sigma_p^{(k)}, \mu_p^{(k)})\}_{k=1}^{N} \mapsto \text{scatter colored by } S^{(k)}
//! $$
//!
//! Plotly charts for price histories, daily log-returns and the Monte Carlo
//! frontier with the optimal portfolio marked.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::Axis as ArrayAxis;
use plotly::common::ColorBar;
use plotly::common::ColorScale;
use plotly::common::ColorScalePalette;
use plotly::common::Line;
use plotly::common::Marker;
use plotly::common::MarkerSymbol;
use plotly::common::Mode;
use plotly::common::Title;
use plotly::layout::Axis;
use plotly::layout::Margin;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;

use crate::quant::portfolio::Frontier;
use crate::quant::portfolio::PortfolioStatistics;
use crate::quant::portfolio::PriceSeries;
use crate::quant::portfolio::ReturnsMatrix;

fn layout(title: &str, x: &str, y: &str) -> Layout {
  Layout::new()
    .title(title)
    .auto_size(true)
    .height(500)
    .margin(Margin::new().left(64).right(24).top(64).bottom(48))
    .x_axis(Axis::new().title(Title::from(x)).show_grid(true))
    .y_axis(Axis::new().title(Title::from(y)).show_grid(true))
}

// One line per column; NaN cells are left out of their trace.
fn time_series(
  title: &str,
  y_label: &str,
  dates: &[NaiveDate],
  assets: &[String],
  values: &Array2<f64>,
) -> Plot {
  let mut plot = Plot::new();
  plot.set_layout(layout(title, "Date", y_label));

  for (asset, column) in assets.iter().zip(values.axis_iter(ArrayAxis(1))) {
    let (x, y): (Vec<String>, Vec<f64>) = dates
      .iter()
      .zip(column.iter())
      .filter(|(_, v)| v.is_finite())
      .map(|(d, v)| (d.format("%Y-%m-%d").to_string(), *v))
      .unzip();

    plot.add_trace(
      Scatter::new(x, y)
        .mode(Mode::Lines)
        .line(Line::new().width(1.2))
        .name(asset.as_str()),
    );
  }

  plot
}

/// Price history of every asset.
pub fn plot_prices(prices: &PriceSeries) -> Plot {
  time_series(
    "Adjusted close prices",
    "Price",
    prices.dates(),
    prices.assets(),
    prices.prices(),
  )
}

/// Daily log-returns of every asset.
pub fn plot_returns(returns: &ReturnsMatrix) -> Plot {
  time_series(
    "Daily log-returns",
    "Log-return",
    returns.dates(),
    returns.assets(),
    returns.values(),
  )
}

fn frontier_trace(frontier: &Frontier) -> Box<Scatter<f64, f64>> {
  Scatter::new(frontier.volatilities(), frontier.returns())
    .mode(Mode::Markers)
    .name("Random portfolios")
    .marker(
      Marker::new()
        .size(5)
        .color_array(frontier.sharpe_ratios())
        .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
        .show_scale(true)
        .color_bar(ColorBar::new().title(Title::from("Sharpe Ratio"))),
    )
}

/// Expected return against volatility of the sampled portfolios, colored by
/// Sharpe ratio. Invalid trials are not drawn.
pub fn plot_frontier(frontier: &Frontier) -> Plot {
  let mut plot = Plot::new();
  plot.set_layout(layout(
    "Monte Carlo portfolios",
    "Expected Volatility",
    "Expected Return",
  ));
  plot.add_trace(frontier_trace(frontier));
  plot
}

/// [`plot_frontier`] with the optimal portfolio drawn as a green star.
pub fn plot_optimal_portfolio(frontier: &Frontier, optimum: &PortfolioStatistics) -> Plot {
  let mut plot = Plot::new();
  plot.set_layout(layout(
    "Optimal portfolio",
    "Expected Volatility",
    "Expected Return",
  ));
  plot.add_trace(frontier_trace(frontier));
  plot.add_trace(
    Scatter::new(vec![optimum.volatility], vec![optimum.expected_return])
      .mode(Mode::Markers)
      .name(format!("Max Sharpe ({:.3})", optimum.sharpe).as_str())
      .marker(Marker::new().symbol(MarkerSymbol::Star).size(20).color("green")),
  );
  plot
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::compute_returns;
  use crate::quant::portfolio::FrontierTrial;
  use crate::quant::portfolio::PortfolioError;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
  }

  fn prices() -> PriceSeries {
    PriceSeries::new(
      vec![day(1), day(2), day(3)],
      vec!["AAA".into(), "BBB".into()],
      array![[10.0, 20.0], [11.0, f64::NAN], [12.0, 21.0]],
    )
    .unwrap()
  }

  fn frontier() -> Frontier {
    let stats = |r: f64, v: f64| PortfolioStatistics {
      expected_return: r,
      volatility: v,
      sharpe: r / v,
    };
    Frontier {
      trials: vec![
        FrontierTrial {
          weights: array![0.3, 0.7],
          outcome: Ok(stats(0.10, 0.20)),
        },
        FrontierTrial {
          weights: array![0.6, 0.4],
          outcome: Ok(stats(0.12, 0.18)),
        },
        FrontierTrial {
          weights: array![0.5, 0.5],
          outcome: Err(PortfolioError::DegenerateStatistics { volatility: 0.0 }),
        },
      ],
    }
  }

  #[test]
  fn price_chart_has_one_trace_per_asset_and_skips_gaps() {
    let json = plot_prices(&prices()).to_json();

    assert!(json.contains("\"name\":\"AAA\""));
    assert!(json.contains("\"name\":\"BBB\""));
    assert!(json.contains("2024-05-02"));
    assert!(!json.contains("NaN"));
  }

  #[test]
  fn returns_chart_uses_return_dates() {
    let clean = prices().drop_missing();
    let returns = compute_returns(&clean).unwrap();
    let json = plot_returns(&returns).to_json();

    assert!(json.contains("Daily log-returns"));
    assert!(json.contains("2024-05-03"));
    assert!(!json.contains("2024-05-01"));
  }

  #[test]
  fn frontier_chart_colors_by_sharpe() {
    let json = plot_frontier(&frontier()).to_json();

    assert!(json.contains("Sharpe Ratio"));
    assert!(json.contains("Expected Volatility"));
    assert!(json.contains("0.18"));
  }

  #[test]
  fn optimum_is_marked_with_a_green_star() {
    let optimum = PortfolioStatistics {
      expected_return: 0.15,
      volatility: 0.19,
      sharpe: 0.15 / 0.19,
    };
    let json = plot_optimal_portfolio(&frontier(), &optimum).to_json();

    assert!(json.contains("star"));
    assert!(json.contains("green"));
    assert!(json.contains("Max Sharpe"));
  }
}
