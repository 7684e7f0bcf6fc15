//! # candlescan - candlestick chart analytics
//!
//! Classifies price-bar series into candlesticks, derives moving averages,
//! trend sentiment and running statistics, and scans the result for a library
//! of named reversal/continuation signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlescan::prelude::*;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bars: Vec<Ohlc> = (0..30u64)
//!     .map(|i| {
//!         let date = start + chrono::Days::new(i);
//!         Ohlc::new("ACME", date, dec!(10), dec!(11), dec!(9), dec!(10.5), 1_000).unwrap()
//!     })
//!     .collect();
//!
//! let chart = ChartBuilder::new(ChartInfo::new("ACME", Interval::Daily), bars)
//!     .moving_average(MovingAverageKey::parse("S5C").unwrap())
//!     .build()
//!     .unwrap();
//!
//! for signal in library() {
//!     let matches = signal.discover_matches(&chart, None, false).unwrap();
//!     assert!(matches.iter().all(|m| m.signal_range.end < chart.len()));
//! }
//! ```

pub mod aggregate;
pub mod candlestick;
pub mod chart;
pub mod factory;
pub mod moving_average;
pub mod notation;
pub mod price;
pub mod signals;
pub mod trend;

pub mod prelude {
    pub use crate::{
        // Aggregation
        aggregate::{aggregate, aggregate_to, Interval},
        // Bars
        candlestick::Candlestick,
        // Chart
        chart::{Chart, ChartBuilder, ChartInfo, ChartSpan},
        // Factory
        factory::{ChartCache, ChartCacheKey, ChartConfig, ChartFactory, Instrument, TrendSetting},
        // Moving averages
        moving_average::{MovingAverage, MovingAverageKey, MovingAverageType, PricePoint},
        price::{round_money, tolerance, Ohlc, OhlcRecord, PriceRange},
        // Signals
        signals::{
            find_signal, library, scan_parallel, IndexRange, ScanError, ScanResult, Signal,
            SignalMatch,
        },
        // Trends
        trend::{CombinedWeightedTrend, ExtremeTrend, MovingAverageTrend, Trend, WeightedTrend},
        // Errors
        ChartError,
        Period,
        Result,
        Sentiment,
    };
}

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ChartError>;

/// Errors raised while building or scanning charts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid price range: low {low} > high {high}")]
    InvalidPriceRange { low: Decimal, high: Decimal },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Chart has no price bars")]
    EmptyChart,

    #[error("Bars out of order at index {index}: {current} does not follow {previous}")]
    NonMonotonic {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error(
        "{signal}: position {position} with {number_required} bars and prologue \
         {prologue_length} is outside a chart of {len} bars"
    )]
    PositionOutOfBounds {
        signal: &'static str,
        position: usize,
        number_required: usize,
        prologue_length: usize,
        len: usize,
    },

    #[error("Span [{start}, {finish}) out of range for {len} bars")]
    SpanOutOfBounds {
        start: usize,
        finish: usize,
        len: usize,
    },

    #[error("Invalid notation: {0}")]
    InvalidNotation(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Scan cancelled")]
    Cancelled,
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ChartError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// SENTIMENT
// ============================================================

/// Trend classification of a bar
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Sentiment {
    Bullish,
    #[default]
    Neutral,
    Bearish,
}

impl Sentiment {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Sentiment::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Sentiment::Bearish)
    }

    /// Signed score: bullish +1, neutral 0, bearish -1
    #[inline]
    pub fn score(self) -> Decimal {
        match self {
            Sentiment::Bullish => Decimal::ONE,
            Sentiment::Neutral => Decimal::ZERO,
            Sentiment::Bearish => Decimal::NEGATIVE_ONE,
        }
    }
}

// ============================================================
// TESTS
// ============================================================
