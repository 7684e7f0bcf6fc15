//! Chart build pipeline.
//!
//! A [`ChartBuilder`] accumulates bars, requested moving averages and an
//! optional trend. [`ChartBuilder::build`] consumes it and produces an
//! immutable [`Chart`] carrying candlesticks, moving averages, trend values,
//! running statistics and lookback sentiment, all index-aligned to the bars.

use chrono::NaiveDate;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Interval,
    candlestick::Candlestick,
    moving_average::{MovingAverage, MovingAverageKey},
    price::Ohlc,
    trend::Trend,
    ChartError, Result, Sentiment,
};

/// Bars required before any signal can be evaluated, unless configured
pub const DEFAULT_PROLOGUE_LENGTH: usize = 15;

// ============================================================
// CHART INFO
// ============================================================

/// Instrument metadata carried by a chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartInfo {
    pub code: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub interval: Interval,
}

impl ChartInfo {
    pub fn new(code: impl Into<String>, interval: Interval) -> Self {
        Self {
            code: code.into(),
            source: None,
            industry: None,
            sector: None,
            interval,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

// ============================================================
// BUILDER (UNBUILT)
// ============================================================

/// Mutable accumulation stage of a chart.
///
/// # Example
/// ```rust
/// use candlescan::prelude::*;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let bar = Ohlc::new("XYZ", day, dec!(5), dec!(6), dec!(4), dec!(5.5), 10).unwrap();
///
/// let chart = ChartBuilder::new(ChartInfo::new("XYZ", Interval::Daily), vec![bar])
///     .prologue_length(0)
///     .build()
///     .unwrap();
/// assert_eq!(chart.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChartBuilder {
    info: ChartInfo,
    bars: Vec<Ohlc>,
    moving_averages: Vec<MovingAverageKey>,
    trend: Option<Trend>,
    prologue_length: usize,
}

impl ChartBuilder {
    pub fn new(info: ChartInfo, bars: Vec<Ohlc>) -> Self {
        Self {
            info,
            bars,
            moving_averages: Vec::new(),
            trend: None,
            prologue_length: DEFAULT_PROLOGUE_LENGTH,
        }
    }

    /// Request a moving average. Duplicate keys are ignored.
    pub fn moving_average(mut self, key: MovingAverageKey) -> Self {
        if !self.moving_averages.contains(&key) {
            self.moving_averages.push(key);
        }
        self
    }

    pub fn moving_averages(self, keys: impl IntoIterator<Item = MovingAverageKey>) -> Self {
        keys.into_iter().fold(self, Self::moving_average)
    }

    pub fn trend(mut self, trend: Trend) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn prologue_length(mut self, length: usize) -> Self {
        self.prologue_length = length;
        self
    }

    pub fn info(&self) -> &ChartInfo {
        &self.info
    }

    pub fn bars(&self) -> &[Ohlc] {
        &self.bars
    }

    /// Run the build pipeline.
    ///
    /// Fails on an empty bar set or on bars not strictly ordered by start time.
    pub fn build(self) -> Result<Chart> {
        let Self {
            info,
            bars,
            moving_averages,
            mut trend,
            prologue_length,
        } = self;

        if bars.is_empty() {
            return Err(ChartError::EmptyChart);
        }
        for (offset, pair) in bars.windows(2).enumerate() {
            if pair[1].start() <= pair[0].start() {
                return Err(ChartError::NonMonotonic {
                    index: offset + 1,
                    previous: pair[0].start(),
                    current: pair[1].start(),
                });
            }
        }

        let candlesticks: Vec<Candlestick> = bars.iter().map(Candlestick::from).collect();

        let moving_averages: Vec<MovingAverage> = moving_averages
            .into_iter()
            .map(|key| MovingAverage::calculate(key, &bars))
            .collect();

        let trend_values = match trend.as_mut() {
            Some(trend) => trend.calculate(&bars).to_vec(),
            None => vec![Sentiment::Neutral; bars.len()],
        };

        let average_length = running_mean(bars.iter().map(Ohlc::length));
        let average_body = running_mean(candlesticks.iter().map(|c| c.body().length()));
        let average_volume = running_mean(bars.iter().map(|b| Decimal::from(b.volume())))
            .into_iter()
            .map(|avg| avg.ceil().to_u64().unwrap_or(u64::MAX))
            .collect();
        let lookback_sentiment = lookback_sentiment(&bars, prologue_length);

        tracing::debug!(
            code = %info.code,
            interval = %info.interval,
            bars = bars.len(),
            moving_averages = moving_averages.len(),
            trend = %trend.as_ref().map(Trend::name).unwrap_or_default(),
            "built chart"
        );

        Ok(Chart {
            info,
            price_actions: bars,
            candlesticks,
            moving_averages,
            trend,
            trend_values,
            average_length,
            average_body,
            average_volume,
            lookback_sentiment,
            prologue_length,
        })
    }
}

/// Incremental mean: `avg[i] = avg[i-1] + (x[i] - avg[i-1]) / (i + 1)`
fn running_mean(values: impl Iterator<Item = Decimal>) -> Vec<Decimal> {
    let mut mean = Decimal::ZERO;
    values
        .enumerate()
        .map(|(i, x)| {
            mean += (x - mean) / Decimal::from(i as u64 + 1);
            mean
        })
        .collect()
}

/// Local dominance over the `length` bars before `p - 1`, window `[p-length-1, p-1)`.
fn lookback_sentiment(bars: &[Ohlc], length: usize) -> Vec<Sentiment> {
    (0..bars.len())
        .map(|p| {
            if length == 0 || p <= length {
                return Sentiment::Neutral;
            }
            let window = &bars[p - length - 1..p - 1];
            let current = &bars[p];
            if window.iter().all(|b| b.high() < current.high()) {
                Sentiment::Bullish
            } else if window.iter().all(|b| b.low() > current.low()) {
                Sentiment::Bearish
            } else {
                Sentiment::Neutral
            }
        })
        .collect()
}

// ============================================================
// CHART (BUILT)
// ============================================================

/// Immutable, fully derived chart.
///
/// Identity (equality and hashing) is `(info, trend name, prologue length)`.
#[derive(Debug, Clone)]
pub struct Chart {
    info: ChartInfo,
    price_actions: Vec<Ohlc>,
    candlesticks: Vec<Candlestick>,
    moving_averages: Vec<MovingAverage>,
    trend: Option<Trend>,
    trend_values: Vec<Sentiment>,
    average_length: Vec<Decimal>,
    average_body: Vec<Decimal>,
    average_volume: Vec<u64>,
    lookback_sentiment: Vec<Sentiment>,
    prologue_length: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Chart {
    #[inline]
    pub fn info(&self) -> &ChartInfo {
        &self.info
    }

    /// Number of bars; never zero for a built chart
    #[inline]
    pub fn len(&self) -> usize {
        self.price_actions.len()
    }

    #[inline]
    pub fn price_actions(&self) -> &[Ohlc] {
        &self.price_actions
    }

    #[inline]
    pub fn candlesticks(&self) -> &[Candlestick] {
        &self.candlesticks
    }

    #[inline]
    pub fn moving_averages(&self) -> &[MovingAverage] {
        &self.moving_averages
    }

    pub fn moving_average(&self, key: &MovingAverageKey) -> Option<&MovingAverage> {
        self.moving_averages.iter().find(|ma| ma.key() == key)
    }

    #[inline]
    pub fn trend(&self) -> Option<&Trend> {
        self.trend.as_ref()
    }

    pub fn trend_name(&self) -> Option<String> {
        self.trend.as_ref().map(Trend::name)
    }

    /// Per-bar trend sentiment; all neutral when no trend is attached
    #[inline]
    pub fn trend_values(&self) -> &[Sentiment] {
        &self.trend_values
    }

    #[inline]
    pub fn average_length(&self) -> &[Decimal] {
        &self.average_length
    }

    #[inline]
    pub fn average_body(&self) -> &[Decimal] {
        &self.average_body
    }

    #[inline]
    pub fn average_volume(&self) -> &[u64] {
        &self.average_volume
    }

    #[inline]
    pub fn lookback_sentiment(&self) -> &[Sentiment] {
        &self.lookback_sentiment
    }

    #[inline]
    pub fn prologue_length(&self) -> usize {
        self.prologue_length
    }

    /// Index of the first bar dated `date`.
    pub fn index_of_date(&self, date: NaiveDate) -> Option<usize> {
        self.price_actions.iter().position(|bar| bar.date() == date)
    }

    /// Sentiment leading into `position`: the trend value at `position - 1`
    /// when a trend is attached, otherwise the lookback sentiment there.
    pub fn prior_sentiment(&self, position: usize) -> Sentiment {
        let Some(previous) = position.checked_sub(1) else {
            return Sentiment::Neutral;
        };
        let values = if self.trend.is_some() {
            &self.trend_values
        } else {
            &self.lookback_sentiment
        };
        values.get(previous).copied().unwrap_or_default()
    }

    /// Mean body length the bar at `position` is compared against.
    ///
    /// With `lookback == 0` this is the running average at `position - 1`,
    /// otherwise the mean over the `lookback` bars before `position`. The
    /// first bar has no reference.
    fn reference_body(&self, position: usize, lookback: usize) -> Option<Decimal> {
        if position >= self.len() {
            return None;
        }
        if lookback == 0 {
            return self.average_body.get(position.checked_sub(1)?).copied();
        }
        let window = &self.candlesticks[position.saturating_sub(lookback)..position];
        if window.is_empty() {
            return None;
        }
        let total: Decimal = window.iter().map(|c| c.body().length()).sum();
        Some(total / Decimal::from(window.len() as u64))
    }

    /// Body longer than the reference body scaled by `tolerance` (at least 1).
    pub fn is_tall(&self, position: usize, lookback: usize, tolerance: Decimal) -> bool {
        let Some(reference) = self.reference_body(position, lookback) else {
            return false;
        };
        self.candlesticks[position].body().length() > reference * tolerance.max(Decimal::ONE)
    }

    /// Body shorter than the reference body scaled by `tolerance` (at most 1).
    pub fn is_short(&self, position: usize, lookback: usize, tolerance: Decimal) -> bool {
        let Some(reference) = self.reference_body(position, lookback) else {
            return false;
        };
        self.candlesticks[position].body().length() < reference * tolerance.min(Decimal::ONE)
    }

    /// View of bars `[start, finish)`.
    pub fn span(&self, start: usize, finish: usize) -> Result<ChartSpan<'_>> {
        if start > finish || finish > self.len() {
            return Err(ChartError::SpanOutOfBounds {
                start,
                finish,
                len: self.len(),
            });
        }
        Ok(ChartSpan {
            chart: self,
            start,
            finish,
        })
    }

    /// Return to the unbuilt stage with the same bars and configuration.
    pub fn into_builder(self) -> ChartBuilder {
        ChartBuilder {
            info: self.info,
            bars: self.price_actions,
            moving_averages: self.moving_averages.iter().map(|ma| *ma.key()).collect(),
            trend: self.trend,
            prologue_length: self.prologue_length,
        }
    }
}

impl PartialEq for Chart {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
            && self.prologue_length == other.prologue_length
            && self.trend_name() == other.trend_name()
    }
}

impl Eq for Chart {}

impl std::hash::Hash for Chart {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.info.hash(state);
        self.trend_name().hash(state);
        self.prologue_length.hash(state);
    }
}

// ============================================================
// CHART SPAN
// ============================================================

/// Borrowed sub-range `[start, finish)` of a built chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartSpan<'a> {
    chart: &'a Chart,
    start: usize,
    finish: usize,
}

impl<'a> ChartSpan<'a> {
    #[inline]
    pub fn chart(&self) -> &'a Chart {
        self.chart
    }

    #[inline]
    pub fn info(&self) -> &'a ChartInfo {
        &self.chart.info
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn finish(&self) -> usize {
        self.finish
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.finish - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.finish
    }

    pub fn price_actions(&self) -> &'a [Ohlc] {
        &self.chart.price_actions[self.start..self.finish]
    }

    pub fn candlesticks(&self) -> &'a [Candlestick] {
        &self.chart.candlesticks[self.start..self.finish]
    }

    pub fn trend_values(&self) -> &'a [Sentiment] {
        &self.chart.trend_values[self.start..self.finish]
    }

    pub fn lookback_sentiment(&self) -> &'a [Sentiment] {
        &self.chart.lookback_sentiment[self.start..self.finish]
    }
}

// ============================================================
// TESTS
// ============================================================
