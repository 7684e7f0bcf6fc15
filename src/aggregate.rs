//! Interval model and period aggregation.
//!
//! Daily bars are rolled up into weekly, monthly, quarterly or annual bars by a
//! single running-candle algorithm, [`aggregate`], parameterised by a
//! period-boundary predicate.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{price::Ohlc, ChartError, Result};

// ============================================================
// INTERVAL
// ============================================================

/// Bar interval, ordered from finest to coarsest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Interval {
    /// Returns a short label for this interval.
    pub fn label(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
            Interval::Quarterly => "quarterly",
            Interval::Yearly => "yearly",
        }
    }

    /// Approximate number of trading days per bar, used as a capacity hint.
    pub fn trading_days(&self) -> usize {
        match self {
            Interval::Daily => 1,
            Interval::Weekly => 5,
            Interval::Monthly => 21,
            Interval::Quarterly => 63,
            Interval::Yearly => 252,
        }
    }

    /// Infer the natural interval of a bar from its start/end span.
    pub fn infer(bar: &Ohlc) -> Interval {
        let span = bar.end() - bar.start();
        if span <= TimeDelta::days(1) {
            Interval::Daily
        } else if span <= TimeDelta::days(7) {
            Interval::Weekly
        } else if span <= TimeDelta::days(31) {
            Interval::Monthly
        } else if span <= TimeDelta::days(92) {
            Interval::Quarterly
        } else {
            Interval::Yearly
        }
    }

    /// True if `current` opens a new period after `previous`.
    pub fn is_new_period(&self, previous: &Ohlc, current: &Ohlc) -> bool {
        let (prev, cur) = (previous.date(), current.date());
        match self {
            Interval::Daily => cur != prev,
            // weekday wraps around, or a whole week was skipped
            Interval::Weekly => {
                cur.weekday().num_days_from_monday() < prev.weekday().num_days_from_monday()
                    || (cur - prev).num_days() >= 7
            }
            Interval::Monthly => (cur.year(), cur.month()) != (prev.year(), prev.month()),
            Interval::Quarterly => (cur.year(), quarter(cur)) != (prev.year(), quarter(prev)),
            Interval::Yearly => cur.year() != prev.year(),
        }
    }
}

fn quarter(date: NaiveDate) -> u32 {
    date.month0() / 3
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interval {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" | "1d" => Ok(Interval::Daily),
            "weekly" | "week" | "w" | "1w" => Ok(Interval::Weekly),
            "monthly" | "month" | "m" | "1mo" => Ok(Interval::Monthly),
            "quarterly" | "quarter" | "q" => Ok(Interval::Quarterly),
            "yearly" | "annual" | "year" | "y" => Ok(Interval::Yearly),
            other => Err(ChartError::InvalidConfig(format!("unknown interval '{other}'"))),
        }
    }
}

impl TryFrom<String> for Interval {
    type Error = ChartError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

// ============================================================
// AGGREGATION
// ============================================================

/// Candle being accumulated for the current period.
struct RunningCandle {
    symbol: String,
    date: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: u64,
    factor: Decimal,
}

impl RunningCandle {
    fn open(bar: &Ohlc) -> Self {
        Self {
            symbol: bar.symbol().to_string(),
            date: bar.date(),
            start: bar.start(),
            end: bar.end(),
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            volume: bar.volume(),
            factor: bar.factor(),
        }
    }

    fn update(&mut self, bar: &Ohlc) {
        self.end = bar.end();
        self.high = self.high.max(bar.high());
        self.low = self.low.min(bar.low());
        self.close = bar.close();
        self.volume = self.volume.saturating_add(bar.volume());
    }

    fn finish(self) -> Result<Ohlc> {
        Ok(Ohlc::new(
            self.symbol,
            self.date,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )?
        .with_span(self.start, self.end)?
        .with_factor(self.factor))
    }
}

/// Roll `bars` up into coarser bars.
///
/// A running candle takes the first bar's open, the running high/low, the last
/// bar's close and the summed volume. It is flushed whenever
/// `is_new_period(previous, current)` holds between consecutive source bars,
/// and at the end of input. Bars must be strictly ordered by start time.
pub fn aggregate<F>(bars: &[Ohlc], mut is_new_period: F, capacity_hint: usize) -> Result<Vec<Ohlc>>
where
    F: FnMut(&Ohlc, &Ohlc) -> bool,
{
    let mut output = Vec::with_capacity(capacity_hint);
    let Some(first) = bars.first() else {
        return Ok(output);
    };

    let mut running = RunningCandle::open(first);
    for (offset, pair) in bars.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.start() <= previous.start() {
            return Err(ChartError::NonMonotonic {
                index: offset + 1,
                previous: previous.start(),
                current: current.start(),
            });
        }

        if is_new_period(previous, current) {
            output.push(running.finish()?);
            running = RunningCandle::open(current);
        } else {
            running.update(current);
        }
    }
    output.push(running.finish()?);

    Ok(output)
}

/// Aggregate bars into `interval` bars using the calendar period predicates.
pub fn aggregate_to(bars: &[Ohlc], interval: Interval) -> Result<Vec<Ohlc>> {
    let capacity = bars.len() / interval.trading_days() + 1;
    let output = aggregate(bars, |prev, cur| interval.is_new_period(prev, cur), capacity)?;
    tracing::debug!(
        interval = %interval,
        source_bars = bars.len(),
        bars = output.len(),
        "aggregated bars"
    );
    Ok(output)
}

// ============================================================
// TESTS
// ============================================================
