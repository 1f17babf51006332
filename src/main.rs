use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use markowitz_rs::portfolio::OptimizerMethod;
use markowitz_rs::portfolio::PortfolioEngine;
use markowitz_rs::portfolio::PortfolioEngineConfig;
use markowitz_rs::portfolio::PortfolioReport;
use markowitz_rs::portfolio::PriceSeries;
use markowitz_rs::quant::market_data::CsvProvider;
use markowitz_rs::quant::market_data::MarketDataProvider;
use markowitz_rs::quant::market_data::MarketDataRequest;
use markowitz_rs::visualization;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
  "usage: markowitz-rs [--optimizer=slsqp|nelder-mead] <prices.csv> [out_dir]";

fn load_prices(csv: Option<&str>) -> anyhow::Result<PriceSeries> {
  match csv {
    Some(path) => {
      // every column of the file, whole date range
      let request =
        MarketDataRequest::new(Vec::new(), chrono::NaiveDate::MIN, chrono::NaiveDate::MAX);
      CsvProvider::new(path).fetch(&request)
    }
    None => download_default(),
  }
}

#[cfg(feature = "yahoo")]
fn download_default() -> anyhow::Result<PriceSeries> {
  let request = MarketDataRequest::default();
  info!(
    tickers = ?request.tickers,
    start = %request.start,
    end = %request.end,
    "downloading prices"
  );
  markowitz_rs::quant::yahoo::YahooProvider::new()?.fetch(&request)
}

#[cfg(not(feature = "yahoo"))]
fn download_default() -> anyhow::Result<PriceSeries> {
  anyhow::bail!("{USAGE}\n(build with --features yahoo to download prices instead)")
}

fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let (flags, args): (Vec<String>, Vec<String>) =
    env::args().skip(1).partition(|a| a.starts_with("--"));
  let mut config = PortfolioEngineConfig::default();
  for flag in &flags {
    match flag.split_once('=') {
      Some(("--optimizer", method)) => config.optimizer = OptimizerMethod::from_str(method),
      _ => anyhow::bail!("unknown option {flag}\n{USAGE}"),
    }
  }
  let csv = args.first().map(String::as_str);
  let out_dir = PathBuf::from(args.get(1).map(String::as_str).unwrap_or("target/markowitz"));

  let prices = load_prices(csv)?;
  info!(assets = prices.n_assets(), rows = prices.len(), "loaded prices");

  info!(optimizer = ?config.optimizer, "running analysis");
  let engine = PortfolioEngine::new(config);
  let analysis = engine.run(&prices)?;

  println!("{}", PortfolioReport::from_analysis(&analysis));

  fs::create_dir_all(&out_dir)
    .with_context(|| format!("failed to create {}", out_dir.display()))?;
  visualization::plot_prices(&prices).write_html(out_dir.join("prices.html"));
  visualization::plot_returns(&analysis.returns).write_html(out_dir.join("returns.html"));
  visualization::plot_frontier(&analysis.frontier).write_html(out_dir.join("frontier.html"));
  match analysis.optimum.statistics {
    Some(optimum) => visualization::plot_optimal_portfolio(&analysis.frontier, &optimum)
      .write_html(out_dir.join("optimal_portfolio.html")),
    None => warn!("optimal portfolio is degenerate, skipping its chart"),
  }
  info!(dir = %out_dir.display(), "wrote charts");

  Ok(())
}
