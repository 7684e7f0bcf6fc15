//! Price-bar value types.
//!
//! [`PriceRange`] and [`Ohlc`] are immutable once constructed. Every price is
//! rounded to [`MONEY_SCALE`] fractional digits, so two bars built from the same
//! quotes compare equal regardless of how the input decimals were written.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{ChartError, Result};

// ============================================================
// MONEY PRECISION & TOLERANCE
// ============================================================

/// Number of fractional digits kept for every price
pub const MONEY_SCALE: u32 = 4;

/// Default relative tolerance (1%)
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.01);

/// Round a price to money precision (midpoint away from zero).
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Relative tolerance: a fraction of a reference magnitude.
///
/// Comparisons such as "approximately equal" scale with the instrument's
/// price level instead of using an absolute epsilon.
#[inline]
pub fn tolerance(base: Decimal, factor: Decimal) -> Decimal {
    factor * base
}

// ============================================================
// PRICE RANGE
// ============================================================

/// A closed price interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PriceRange {
    high: Decimal,
    low: Decimal,
}

impl PriceRange {
    /// Create a range from its bounds; both are rounded to money precision.
    pub fn new(low: Decimal, high: Decimal) -> Result<Self> {
        let low = round_money(low);
        let high = round_money(high);
        if low > high {
            return Err(ChartError::InvalidPriceRange { low, high });
        }
        Ok(Self { high, low })
    }

    /// Build from bounds already rounded and ordered by the caller.
    pub(crate) fn from_ordered(low: Decimal, high: Decimal) -> Self {
        debug_assert!(low <= high);
        Self { high, low }
    }

    #[inline]
    pub fn high(&self) -> Decimal {
        self.high
    }

    #[inline]
    pub fn low(&self) -> Decimal {
        self.low
    }

    #[inline]
    pub fn length(&self) -> Decimal {
        self.high - self.low
    }

    #[inline]
    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::TWO
    }

    /// True if `other` lies entirely within this range (bounds may touch).
    #[inline]
    pub fn contains(&self, other: &PriceRange) -> bool {
        self.low <= other.low && other.high <= self.high
    }

    /// True if `other` lies strictly inside this range.
    #[inline]
    pub fn strictly_contains(&self, other: &PriceRange) -> bool {
        self.low < other.low && other.high < self.high
    }

    /// Containment with a strictly longer length: one bound may touch, not both.
    #[inline]
    pub fn engulfs(&self, other: &PriceRange) -> bool {
        self.contains(other) && self.length() > other.length()
    }

    /// True if `price` lies within `[low, high]`.
    #[inline]
    pub fn includes(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

// ============================================================
// OHLC BAR
// ============================================================

/// One period of open/high/low/close/volume for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OhlcRecord", into = "OhlcRecord")]
pub struct Ohlc {
    symbol: String,
    date: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    open: Decimal,
    range: PriceRange,
    close: Decimal,
    volume: u64,
    factor: Decimal,
}

impl Ohlc {
    /// Create a daily bar. The bar spans `date 00:00` to the following midnight.
    ///
    /// Fails if `low > high` or if `open`/`close` fall outside `[low, high]`
    /// after rounding.
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Result<Self> {
        let range = PriceRange::new(low, high)?;
        let open = round_money(open);
        let close = round_money(close);

        if !range.includes(open) {
            return Err(ChartError::InvalidBar {
                index: 0,
                reason: "open outside [low, high]",
            });
        }
        if !range.includes(close) {
            return Err(ChartError::InvalidBar {
                index: 0,
                reason: "close outside [low, high]",
            });
        }

        let start = date.and_time(NaiveTime::MIN);
        Ok(Self {
            symbol: symbol.into(),
            date,
            start,
            end: start + TimeDelta::days(1),
            open,
            range,
            close,
            volume,
            factor: Decimal::ONE,
        })
    }

    /// Replace the bar's time span. `end` must be after `start`.
    pub fn with_span(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(ChartError::InvalidBar {
                index: 0,
                reason: "span end not after start",
            });
        }
        self.start = start;
        self.end = end;
        Ok(self)
    }

    /// Set the price adjustment multiplier (splits, dividends).
    pub fn with_factor(mut self, factor: Decimal) -> Self {
        self.factor = factor;
        self
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[inline]
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    #[inline]
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    #[inline]
    pub fn open(&self) -> Decimal {
        self.open
    }

    #[inline]
    pub fn high(&self) -> Decimal {
        self.range.high()
    }

    #[inline]
    pub fn low(&self) -> Decimal {
        self.range.low()
    }

    #[inline]
    pub fn close(&self) -> Decimal {
        self.close
    }

    #[inline]
    pub fn volume(&self) -> u64 {
        self.volume
    }

    #[inline]
    pub fn factor(&self) -> Decimal {
        self.factor
    }

    /// The `[low, high]` range of the bar
    #[inline]
    pub fn range(&self) -> &PriceRange {
        &self.range
    }

    #[inline]
    pub fn length(&self) -> Decimal {
        self.range.length()
    }

    #[inline]
    pub fn midpoint(&self) -> Decimal {
        self.range.midpoint()
    }

    /// Mean of open, high, low and close
    pub fn average_price(&self) -> Decimal {
        (self.open + self.high() + self.low() + self.close) / dec!(4)
    }

    /// Traded value: `close * volume`
    pub fn liquidity(&self) -> Decimal {
        self.close * Decimal::from(self.volume)
    }

    #[inline]
    pub fn is_light(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_dark(&self) -> bool {
        self.open > self.close
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.open == self.close
    }
}

/// Flat, serde-friendly form of [`Ohlc`] used at the input boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
}

impl TryFrom<OhlcRecord> for Ohlc {
    type Error = ChartError;

    fn try_from(record: OhlcRecord) -> Result<Self> {
        let mut bar = Ohlc::new(
            record.symbol,
            record.date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )?;
        if let Some(factor) = record.factor {
            bar = bar.with_factor(factor);
        }
        match (record.start, record.end) {
            (Some(start), Some(end)) => bar.with_span(start, end),
            (None, None) => Ok(bar),
            _ => Err(ChartError::InvalidBar {
                index: 0,
                reason: "start and end must be given together",
            }),
        }
    }
}

impl From<Ohlc> for OhlcRecord {
    fn from(bar: Ohlc) -> Self {
        Self {
            symbol: bar.symbol,
            date: bar.date,
            open: bar.open,
            high: bar.range.high(),
            low: bar.range.low(),
            close: bar.close,
            volume: bar.volume,
            factor: (bar.factor != Decimal::ONE).then_some(bar.factor),
            start: Some(bar.start),
            end: Some(bar.end),
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(PriceRange::new(dec!(10), dec!(9)).is_err());
        assert!(PriceRange::new(dec!(9), dec!(9)).is_ok());
    }

    #[test]
    fn test_range_derived_values() {
        let range = PriceRange::new(dec!(99.90), dec!(100.20)).unwrap();
        assert_eq!(range.length(), dec!(0.30));
        assert_eq!(range.midpoint(), dec!(100.05));
    }

    #[test]
    fn test_range_rounds_to_money_precision() {
        let range = PriceRange::new(dec!(1.00005), dec!(2.123449)).unwrap();
        assert_eq!(range.low(), dec!(1.0001));
        assert_eq!(range.high(), dec!(2.1234));
    }

    #[test]
    fn test_engulfs_requires_longer_range() {
        let outer = PriceRange::new(dec!(1), dec!(5)).unwrap();
        let same = PriceRange::new(dec!(1), dec!(5)).unwrap();
        let inner = PriceRange::new(dec!(1), dec!(3)).unwrap();
        assert!(outer.engulfs(&inner));
        assert!(!outer.engulfs(&same));
        assert!(!inner.engulfs(&outer));
    }

    #[test]
    fn test_ohlc_derived_values() {
        let bar = Ohlc::new("ABC", date(2024, 1, 2), dec!(10), dec!(12), dec!(9), dec!(11), 200)
            .unwrap();
        assert!(bar.is_light());
        assert!(!bar.is_dark());
        assert_eq!(bar.average_price(), dec!(10.5));
        assert_eq!(bar.liquidity(), dec!(2200));
        assert_eq!(bar.factor(), Decimal::ONE);
        assert_eq!(bar.end() - bar.start(), TimeDelta::days(1));
    }

    #[test]
    fn test_ohlc_rejects_close_outside_range() {
        let err = Ohlc::new("ABC", date(2024, 1, 2), dec!(10), dec!(12), dec!(9), dec!(13), 1);
        assert!(matches!(err, Err(ChartError::InvalidBar { .. })));
    }

    #[test]
    fn test_ohlc_rejects_empty_span() {
        let bar = Ohlc::new("ABC", date(2024, 1, 2), dec!(10), dec!(12), dec!(9), dec!(11), 1)
            .unwrap();
        let start = bar.start();
        assert!(bar.with_span(start, start).is_err());
    }
}
