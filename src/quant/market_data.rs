//! # Market Data
//!
//! Price sources feeding the portfolio pipeline: a provider trait, a CSV
//! reader and the outer join used to align per-ticker close series.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use ndarray::Array2;
use ndarray::Axis;
use tracing::debug;

use crate::quant::portfolio::InputError;
use crate::quant::portfolio::PriceSeries;
use crate::quant::portfolio::Result;

/// Tickers analysed when nothing else is configured.
pub const DEFAULT_TICKERS: [&str; 8] = [
  "AAPL", "GOOG", "MSFT", "AMZN", "META", "TSLA", "NVDA", "JPM",
];

/// What to download: tickers and an inclusive date range.
#[derive(Clone, Debug, PartialEq, ImplNew)]
pub struct MarketDataRequest {
  pub tickers: Vec<String>,
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl Default for MarketDataRequest {
  fn default() -> Self {
    Self::new(
      DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
      NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default(),
      NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
    )
  }
}

/// Source of daily close prices.
pub trait MarketDataProvider {
  fn fetch(&self, request: &MarketDataRequest) -> anyhow::Result<PriceSeries>;
}

/// Outer-join per-ticker `(date, close)` lists on their dates.
///
/// Dates missing for a ticker become NaN. Duplicate dates keep the last price.
pub fn align_close_series(series: &[(String, Vec<(NaiveDate, f64)>)]) -> Result<PriceSeries> {
  if series.is_empty() {
    return Err(InputError::Empty("no close series to align".to_string()).into());
  }

  let n = series.len();
  let mut table: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
  for (j, (_, closes)) in series.iter().enumerate() {
    for &(date, close) in closes {
      table.entry(date).or_insert_with(|| vec![f64::NAN; n])[j] = close;
    }
  }

  let mut prices = Array2::from_elem((table.len(), n), f64::NAN);
  for (mut row, values) in prices.axis_iter_mut(Axis(0)).zip(table.values()) {
    for (cell, v) in row.iter_mut().zip(values.iter()) {
      *cell = *v;
    }
  }

  PriceSeries::new(
    table.keys().copied().collect(),
    series.iter().map(|(ticker, _)| ticker.clone()).collect(),
    prices,
  )
}

/// Parse a `date,ASSET1,ASSET2,...` table with ISO dates.
///
/// Fields may be quoted. Empty and `NaN` cells are read as missing.
pub fn read_price_csv<R: BufRead>(reader: R) -> anyhow::Result<PriceSeries> {
  let mut rdr = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(reader);

  let assets: Vec<String> = rdr
    .headers()
    .context("failed to read header")?
    .iter()
    .skip(1)
    .map(str::to_string)
    .collect();
  if assets.is_empty() {
    bail!("header must list at least one asset after the date column");
  }

  let mut dates = Vec::new();
  let mut values = Vec::new();
  for record in rdr.records() {
    let record = record.context("malformed csv record")?;
    let lineno = record.position().map_or(0, |p| p.line());
    let date_field = record.get(0).unwrap_or_default();
    let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
      .with_context(|| format!("line {lineno}: invalid date {date_field:?}"))?;

    let row: Vec<f64> = record
      .iter()
      .skip(1)
      .map(|cell| match cell {
        "" => Ok(f64::NAN),
        c if c.eq_ignore_ascii_case("nan") => Ok(f64::NAN),
        c => c
          .parse::<f64>()
          .with_context(|| format!("line {lineno}: invalid price {c:?}")),
      })
      .collect::<anyhow::Result<_>>()?;
    if row.len() != assets.len() {
      bail!("line {lineno}: expected {} prices, found {}", assets.len(), row.len());
    }

    dates.push(date);
    values.extend(row);
  }

  let prices = Array2::from_shape_vec((dates.len(), assets.len()), values)?;
  Ok(PriceSeries::new(dates, assets, prices)?)
}

/// Restrict a price table to the requested tickers and date range.
///
/// An empty ticker list keeps every column.
pub fn select(series: &PriceSeries, request: &MarketDataRequest) -> anyhow::Result<PriceSeries> {
  let columns: Vec<usize> = if request.tickers.is_empty() {
    (0..series.n_assets()).collect()
  } else {
    request
      .tickers
      .iter()
      .map(|t| {
        series
          .assets()
          .iter()
          .position(|a| a == t)
          .with_context(|| format!("ticker {t} not found in price table"))
      })
      .collect::<anyhow::Result<_>>()?
  };
  let rows: Vec<usize> = series
    .dates()
    .iter()
    .enumerate()
    .filter(|(_, d)| (request.start..=request.end).contains(*d))
    .map(|(i, _)| i)
    .collect();

  let prices = series
    .prices()
    .select(Axis(0), &rows)
    .select(Axis(1), &columns);

  Ok(PriceSeries::new(
    rows.iter().map(|&i| series.dates()[i]).collect(),
    columns.iter().map(|&j| series.assets()[j].clone()).collect(),
    prices,
  )?)
}

/// Prices stored in a local CSV file.
#[derive(Clone, Debug)]
pub struct CsvProvider {
  path: PathBuf,
}

impl CsvProvider {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl MarketDataProvider for CsvProvider {
  fn fetch(&self, request: &MarketDataRequest) -> anyhow::Result<PriceSeries> {
    let file = File::open(&self.path)
      .with_context(|| format!("failed to open {}", self.path.display()))?;
    let series = read_price_csv(BufReader::new(file))
      .with_context(|| format!("failed to parse {}", self.path.display()))?;
    debug!(path = %self.path.display(), rows = series.len(), "loaded price file");
    select(&series, request)
  }
}
