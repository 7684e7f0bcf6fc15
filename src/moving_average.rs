//! Simple and exponential moving averages aligned to a bar series.
//!
//! Output arrays always have the same length as the input. The first
//! `period - 1` entries are zero (warm-up); a series shorter than `period`
//! yields an all-zero array.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{notation, price::Ohlc, Period, Result};

// ============================================================
// KEY
// ============================================================

/// Which price of a bar feeds the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricePoint {
    Open,
    High,
    Low,
    Close,
    /// (High + Low) / 2
    Midpoint,
}

impl PricePoint {
    /// Extract the price from a bar based on this point.
    #[inline]
    pub fn extract(&self, bar: &Ohlc) -> Decimal {
        match self {
            PricePoint::Open => bar.open(),
            PricePoint::High => bar.high(),
            PricePoint::Low => bar.low(),
            PricePoint::Close => bar.close(),
            PricePoint::Midpoint => bar.midpoint(),
        }
    }

    /// Notation letter
    pub fn code(&self) -> char {
        match self {
            PricePoint::Open => 'O',
            PricePoint::High => 'H',
            PricePoint::Low => 'L',
            PricePoint::Close => 'C',
            PricePoint::Midpoint => 'M',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'O' => Some(PricePoint::Open),
            'H' => Some(PricePoint::High),
            'L' => Some(PricePoint::Low),
            'C' => Some(PricePoint::Close),
            'M' => Some(PricePoint::Midpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovingAverageType {
    Simple,
    Exponential,
}

impl MovingAverageType {
    pub fn code(&self) -> char {
        match self {
            MovingAverageType::Simple => 'S',
            MovingAverageType::Exponential => 'E',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'S' => Some(MovingAverageType::Simple),
            'E' => Some(MovingAverageType::Exponential),
            _ => None,
        }
    }
}

/// Identity of a moving average: period, price point and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovingAverageKey {
    pub period: Period,
    pub price_point: PricePoint,
    pub kind: MovingAverageType,
}

impl MovingAverageKey {
    pub fn new(period: usize, price_point: PricePoint, kind: MovingAverageType) -> Result<Self> {
        Ok(Self {
            period: Period::new(period)?,
            price_point,
            kind,
        })
    }

    /// Parse the compact notation, e.g. `S200C` or `E20M`.
    pub fn parse(token: &str) -> Result<Self> {
        notation::parse_moving_average(token)
    }
}

impl std::fmt::Display for MovingAverageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.kind.code(), self.period, self.price_point.code())
    }
}

// ============================================================
// MOVING AVERAGE
// ============================================================

/// Moving average values index-aligned to the bars they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovingAverage {
    key: MovingAverageKey,
    values: Vec<Decimal>,
}

impl MovingAverage {
    /// Compute the average described by `key` over `bars`.
    pub fn calculate(key: MovingAverageKey, bars: &[Ohlc]) -> Self {
        let prices: Vec<Decimal> = bars.iter().map(|b| key.price_point.extract(b)).collect();
        let values = match key.kind {
            MovingAverageType::Simple => sma(&prices, key.period),
            MovingAverageType::Exponential => ema(&prices, key.period),
        };
        Self { key, values }
    }

    #[inline]
    pub fn key(&self) -> &MovingAverageKey {
        &self.key
    }

    #[inline]
    pub fn values(&self) -> &[Decimal] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, or None during warm-up or past the end.
    pub fn value(&self, index: usize) -> Option<Decimal> {
        if !self.is_warm(index) {
            return None;
        }
        self.values.get(index).copied()
    }

    /// True once `index` is past the warm-up window and the series was long enough.
    #[inline]
    pub fn is_warm(&self, index: usize) -> bool {
        let period = self.key.period.get();
        self.values.len() >= period && index + 1 >= period && index < self.values.len()
    }
}

/// Simple moving average with an O(n) rolling sum.
pub fn sma(prices: &[Decimal], period: Period) -> Vec<Decimal> {
    let period = period.get();
    let mut values = vec![Decimal::ZERO; prices.len()];
    if prices.len() < period {
        return values;
    }

    let divisor = Decimal::from(period as u64);
    let mut sum: Decimal = prices[..period].iter().copied().sum();
    values[period - 1] = sum / divisor;

    for i in period..prices.len() {
        sum += prices[i] - prices[i - period];
        values[i] = sum / divisor;
    }

    values
}

/// Exponential moving average seeded with the SMA of the first window.
pub fn ema(prices: &[Decimal], period: Period) -> Vec<Decimal> {
    let period = period.get();
    let mut values = vec![Decimal::ZERO; prices.len()];
    if prices.len() < period {
        return values;
    }

    let factor = Decimal::TWO / Decimal::from(period as u64 + 1);
    let seed: Decimal = prices[..period].iter().copied().sum();
    values[period - 1] = seed / Decimal::from(period as u64);

    for i in period..prices.len() {
        let previous = values[i - 1];
        values[i] = previous + factor * (prices[i] - previous);
    }

    values
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn closes() -> Vec<Decimal> {
        vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]
    }

    #[test]
    fn test_sma_values() {
        let values = sma(&closes(), Period::new_const(3));
        assert_eq!(values, vec![dec!(0), dec!(0), dec!(2), dec!(3), dec!(4)]);
    }

    #[test]
    fn test_ema_values() {
        // factor = 2 / (3 + 1) = 0.5
        let values = ema(&closes(), Period::new_const(3));
        assert_eq!(values, vec![dec!(0), dec!(0), dec!(2), dec!(3), dec!(4)]);

        let values = ema(&[dec!(1), dec!(2), dec!(3), dec!(10)], Period::new_const(3));
        assert_eq!(values[3], dec!(6));
    }

    #[test]
    fn test_short_series_is_zero_filled() {
        assert_eq!(sma(&closes(), Period::new_const(6)), vec![Decimal::ZERO; 5]);
        assert_eq!(ema(&closes(), Period::new_const(6)), vec![Decimal::ZERO; 5]);
        assert!(sma(&[], Period::new_const(2)).is_empty());
    }

    #[test]
    fn test_period_one_is_identity() {
        assert_eq!(sma(&closes(), Period::new_const(1)), closes());
        assert_eq!(ema(&closes(), Period::new_const(1)), closes());
    }

    #[test]
    fn test_key_display() {
        let key = MovingAverageKey::new(200, PricePoint::Close, MovingAverageType::Simple).unwrap();
        assert_eq!(key.to_string(), "S200C");
        assert!(MovingAverageKey::new(0, PricePoint::Close, MovingAverageType::Simple).is_err());
    }

    #[test]
    fn test_warm_up() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Ohlc> = (0..4u64)
            .map(|i| {
                let p = Decimal::from(i + 1);
                Ohlc::new("MA", date + chrono::Days::new(i), p, p, p, p, 1).unwrap()
            })
            .collect();
        let key = MovingAverageKey::parse("S3C").unwrap();
        let ma = MovingAverage::calculate(key, &bars);
        assert_eq!(ma.len(), 4);
        assert_eq!(ma.value(1), None);
        assert_eq!(ma.value(2), Some(dec!(2)));
        assert_eq!(ma.value(3), Some(dec!(3)));
        assert_eq!(ma.value(4), None);
    }
}
