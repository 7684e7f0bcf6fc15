//! Trend sentiment strategies.
//!
//! Every strategy exposes the same surface through [`Trend`]: a `name`, the
//! per-bar `trend_values`, and `calculate`, which computes the values and
//! memoizes them against the bars they were computed from.
//! [`CombinedWeightedTrend`] blends other trends by composition.
//!
//! `calculate` takes `&mut self`; a trend shared between threads must be
//! calculated before it is shared.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    moving_average::{MovingAverage, MovingAverageKey},
    notation::{self, TrendNotation},
    price::Ohlc,
    ChartError, Period, Result, Sentiment,
};

/// Blended score at or beyond which a combined trend is bullish/bearish
pub const BLEND_THRESHOLD: Decimal = dec!(0.5);

/// Default weight of a trend entry without an explicit weight
pub const DEFAULT_WEIGHT: Decimal = Decimal::ONE;

/// Calculated values and the fingerprint of the bars they came from.
#[derive(Debug, Clone, PartialEq)]
struct Memo {
    fingerprint: u64,
    values: Vec<Sentiment>,
}

/// Content hash of a bar series: span and prices of every bar.
fn fingerprint(bars: &[Ohlc]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bars.len().hash(&mut hasher);
    for bar in bars {
        bar.start().hash(&mut hasher);
        bar.end().hash(&mut hasher);
        bar.open().hash(&mut hasher);
        bar.high().hash(&mut hasher);
        bar.low().hash(&mut hasher);
        bar.close().hash(&mut hasher);
        bar.volume().hash(&mut hasher);
    }
    hasher.finish()
}

// ============================================================
// MOVING AVERAGE TREND
// ============================================================

/// Sentiment from where each bar sits relative to a moving-average line.
///
/// A bar entirely above the line is bullish, entirely below is bearish, and a
/// bar touching or crossing the line (or still in warm-up) is neutral.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageTrend {
    key: MovingAverageKey,
    values: Option<Memo>,
}

impl MovingAverageTrend {
    pub fn new(key: MovingAverageKey) -> Self {
        Self { key, values: None }
    }

    #[inline]
    pub fn key(&self) -> &MovingAverageKey {
        &self.key
    }

    fn compute(&self, bars: &[Ohlc]) -> Vec<Sentiment> {
        let line = MovingAverage::calculate(self.key, bars);
        bars.iter()
            .enumerate()
            .map(|(i, bar)| match line.value(i) {
                Some(value) if bar.low() > value => Sentiment::Bullish,
                Some(value) if bar.high() < value => Sentiment::Bearish,
                _ => Sentiment::Neutral,
            })
            .collect()
    }
}

// ============================================================
// EXTREME TREND
// ============================================================

/// Sentiment from proximity of the close to a rolling high/low extreme.
///
/// Over the trailing `period` bars (current bar included), a close in the top
/// third of the window's range is bullish and one in the bottom third bearish.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeTrend {
    period: Period,
    values: Option<Memo>,
}

impl ExtremeTrend {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            values: None,
        }
    }

    #[inline]
    pub fn period(&self) -> Period {
        self.period
    }

    fn compute(&self, bars: &[Ohlc]) -> Vec<Sentiment> {
        let period = self.period.get();
        (0..bars.len())
            .map(|i| {
                if i + 1 < period {
                    return Sentiment::Neutral;
                }
                let window = &bars[i + 1 - period..=i];
                let high = window.iter().map(Ohlc::high).max().unwrap_or_default();
                let low = window.iter().map(Ohlc::low).min().unwrap_or_default();
                let span = high - low;
                if span <= Decimal::ZERO {
                    return Sentiment::Neutral;
                }

                let above_low = (bars[i].close() - low) * dec!(3);
                if above_low >= span * Decimal::TWO {
                    Sentiment::Bullish
                } else if above_low <= span {
                    Sentiment::Bearish
                } else {
                    Sentiment::Neutral
                }
            })
            .collect()
    }
}

// ============================================================
// WEIGHTED COMBINATION
// ============================================================

/// A trend with its weight in a [`CombinedWeightedTrend`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTrend {
    pub trend: Trend,
    pub weight: Decimal,
}

impl WeightedTrend {
    /// Weight must be positive
    pub fn new(trend: Trend, weight: Decimal) -> Result<Self> {
        if weight <= Decimal::ZERO {
            return Err(ChartError::InvalidValue("Trend weight must be > 0"));
        }
        Ok(Self { trend, weight })
    }
}

/// Weight-normalized blend of several trends, thresholded back to a sentiment.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedWeightedTrend {
    trends: Vec<WeightedTrend>,
    values: Option<Memo>,
}

impl CombinedWeightedTrend {
    pub fn new(trends: Vec<WeightedTrend>) -> Self {
        Self {
            trends,
            values: None,
        }
    }

    #[inline]
    pub fn trends(&self) -> &[WeightedTrend] {
        &self.trends
    }

    fn compute(&mut self, bars: &[Ohlc]) -> Vec<Sentiment> {
        let total_weight: Decimal = self.trends.iter().map(|w| w.weight).sum();
        for weighted in &mut self.trends {
            weighted.trend.calculate(bars);
        }
        if total_weight <= Decimal::ZERO {
            return vec![Sentiment::Neutral; bars.len()];
        }

        (0..bars.len())
            .map(|i| {
                let blended = self
                    .trends
                    .iter()
                    .map(|w| w.weight * w.trend.value(i).score())
                    .sum::<Decimal>()
                    / total_weight;
                if blended >= BLEND_THRESHOLD {
                    Sentiment::Bullish
                } else if blended <= -BLEND_THRESHOLD {
                    Sentiment::Bearish
                } else {
                    Sentiment::Neutral
                }
            })
            .collect()
    }
}

// ============================================================
// TREND
// ============================================================

/// Closed set of trend strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum Trend {
    MovingAverage(MovingAverageTrend),
    Extreme(ExtremeTrend),
    Combined(CombinedWeightedTrend),
}

impl Trend {
    /// Parse a single trend token (see [`crate::notation`]).
    pub fn parse(token: &str) -> Result<Self> {
        notation::parse_trend(token).map(Trend::from)
    }

    /// Stable name, used in chart identity and cache keys.
    pub fn name(&self) -> String {
        match self {
            Trend::MovingAverage(t) => t.key.to_string(),
            Trend::Extreme(t) => format!("X{}", t.period),
            Trend::Combined(t) => t
                .trends
                .iter()
                .map(|w| format!("{}*{}", w.trend.name(), w.weight.normalize()))
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    /// Memoized values; empty until [`Trend::calculate`] has run.
    pub fn trend_values(&self) -> &[Sentiment] {
        self.memo().map(|memo| memo.values.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn is_calculated(&self) -> bool {
        self.memo().is_some()
    }

    /// Compute per-bar sentiment for `bars`. Calling again with the same bars
    /// returns the memoized values; any other series is recomputed.
    pub fn calculate(&mut self, bars: &[Ohlc]) -> &[Sentiment] {
        let fingerprint = fingerprint(bars);
        if self.memo().map(|memo| memo.fingerprint) != Some(fingerprint) {
            let values = match self {
                Trend::MovingAverage(t) => t.compute(bars),
                Trend::Extreme(t) => t.compute(bars),
                Trend::Combined(t) => t.compute(bars),
            };
            *self.memo_mut() = Some(Memo {
                fingerprint,
                values,
            });
        }
        self.trend_values()
    }

    /// Sentiment at `index`, neutral if not calculated or out of range.
    #[inline]
    pub fn value(&self, index: usize) -> Sentiment {
        self.trend_values().get(index).copied().unwrap_or_default()
    }

    fn memo(&self) -> Option<&Memo> {
        match self {
            Trend::MovingAverage(t) => t.values.as_ref(),
            Trend::Extreme(t) => t.values.as_ref(),
            Trend::Combined(t) => t.values.as_ref(),
        }
    }

    fn memo_mut(&mut self) -> &mut Option<Memo> {
        match self {
            Trend::MovingAverage(t) => &mut t.values,
            Trend::Extreme(t) => &mut t.values,
            Trend::Combined(t) => &mut t.values,
        }
    }
}

impl From<TrendNotation> for Trend {
    fn from(notation: TrendNotation) -> Self {
        match notation {
            TrendNotation::MovingAverage(key) => Trend::MovingAverage(MovingAverageTrend::new(key)),
            TrendNotation::Extreme(period) => Trend::Extreme(ExtremeTrend::new(period)),
        }
    }
}

impl From<MovingAverageTrend> for Trend {
    fn from(trend: MovingAverageTrend) -> Self {
        Trend::MovingAverage(trend)
    }
}

impl From<ExtremeTrend> for Trend {
    fn from(trend: ExtremeTrend) -> Self {
        Trend::Extreme(trend)
    }
}

impl From<CombinedWeightedTrend> for Trend {
    fn from(trend: CombinedWeightedTrend) -> Self {
        Trend::Combined(trend)
    }
}

// ============================================================
// TESTS
// ============================================================
