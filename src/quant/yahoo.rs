//! # Yahoo Finance
//!
//! Adjusted daily closes downloaded with `yahoo_finance_api`, one request per
//! ticker, aligned on their trading dates.

use anyhow::Context;
use chrono::DateTime;
use chrono::Datelike;
use chrono::NaiveDate;
use time::Month;
use time::OffsetDateTime;
use tracing::info;
use yahoo_finance_api as yahoo;

use super::market_data::align_close_series;
use super::market_data::MarketDataProvider;
use super::market_data::MarketDataRequest;
use crate::quant::portfolio::PriceSeries;

/// [`MarketDataProvider`] backed by the public Yahoo Finance chart API.
pub struct YahooProvider {
  connector: yahoo::YahooConnector,
}

impl YahooProvider {
  pub fn new() -> anyhow::Result<Self> {
    Ok(Self {
      connector: yahoo::YahooConnector::new().context("failed to build Yahoo connector")?,
    })
  }

  fn history(
    &self,
    ticker: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
  ) -> anyhow::Result<Vec<(NaiveDate, f64)>> {
    let response = tokio_test::block_on(self.connector.get_quote_history(ticker, start, end))
      .with_context(|| format!("failed to download {ticker}"))?;
    let quotes = response
      .quotes()
      .with_context(|| format!("no quotes for {ticker}"))?;

    let closes = quotes
      .iter()
      .filter_map(|q| {
        DateTime::from_timestamp(q.timestamp as i64, 0).map(|dt| (dt.date_naive(), q.adjclose))
      })
      .collect::<Vec<_>>();
    info!(ticker, quotes = closes.len(), "downloaded price history");

    Ok(closes)
  }
}

fn to_offset_datetime(date: NaiveDate) -> anyhow::Result<OffsetDateTime> {
  let month = Month::try_from(date.month() as u8)?;
  let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)?;
  Ok(day.midnight().assume_utc())
}

impl MarketDataProvider for YahooProvider {
  fn fetch(&self, request: &MarketDataRequest) -> anyhow::Result<PriceSeries> {
    let start = to_offset_datetime(request.start)?;
    let end = to_offset_datetime(request.end)?;

    let series = request
      .tickers
      .iter()
      .map(|ticker| Ok((ticker.clone(), self.history(ticker, start, end)?)))
      .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(align_close_series(&series)?)
  }
}
