//! Candlestick geometry and single-bar classification.
//!
//! A [`Candlestick`] is derived 1:1 from an [`Ohlc`] bar. All predicates use
//! relative tolerances (a fraction of the bar length or of its average price),
//! so a penny stock and an index future are classified by the same rules.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::price::{tolerance, Ohlc, PriceRange, DEFAULT_TOLERANCE};

// ============================================================
// THRESHOLDS
// ============================================================

/// Doji body floor as a fraction of average price
pub const DOJI_PRICE_FACTOR: Decimal = dec!(0.001);
/// Four-price doji: bar length below this fraction of average price
pub const FOUR_PRICE_FACTOR: Decimal = dec!(0.001);
/// Shaven end: shadow below this fraction of average price
pub const SHAVEN_FACTOR: Decimal = dec!(0.001);
/// Share of total shadow that counts as "almost none"
pub const MINOR_SHADOW_SHARE: Decimal = dec!(0.1);
/// Share of total shadow that counts as "almost all"
pub const MAJOR_SHADOW_SHARE: Decimal = dec!(0.9);
/// Long-legged doji: each shadow holds at least this share of total shadow
pub const BALANCED_SHADOW_SHARE: Decimal = dec!(0.3);
/// Umbrella: dominant shadow at least this multiple of the body
pub const UMBRELLA_SHADOW_MULTIPLE: Decimal = dec!(2);
/// Umbrella: opposite shadow at most this share of bar length
pub const UMBRELLA_OPPOSITE_SHARE: Decimal = dec!(0.1);

// ============================================================
// CANDLESTICK
// ============================================================

/// Body and shadow geometry of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candlestick {
    open: Decimal,
    close: Decimal,
    range: PriceRange,
    volume: u64,
    body: PriceRange,
    upper_shadow: PriceRange,
    lower_shadow: PriceRange,
}

impl From<&Ohlc> for Candlestick {
    fn from(bar: &Ohlc) -> Self {
        let body_low = bar.open().min(bar.close());
        let body_high = bar.open().max(bar.close());
        // Ohlc guarantees open/close inside [low, high]
        Self {
            open: bar.open(),
            close: bar.close(),
            range: *bar.range(),
            volume: bar.volume(),
            body: PriceRange::from_ordered(body_low, body_high),
            upper_shadow: PriceRange::from_ordered(body_high, bar.high()),
            lower_shadow: PriceRange::from_ordered(bar.low(), body_low),
        }
    }
}

impl Candlestick {
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
    pub fn range(&self) -> &PriceRange {
        &self.range
    }

    #[inline]
    pub fn body(&self) -> &PriceRange {
        &self.body
    }

    #[inline]
    pub fn upper_shadow(&self) -> &PriceRange {
        &self.upper_shadow
    }

    #[inline]
    pub fn lower_shadow(&self) -> &PriceRange {
        &self.lower_shadow
    }

    #[inline]
    pub fn length(&self) -> Decimal {
        self.range.length()
    }

    #[inline]
    pub fn midpoint(&self) -> Decimal {
        self.range.midpoint()
    }

    pub fn average_price(&self) -> Decimal {
        (self.open + self.high() + self.low() + self.close) / dec!(4)
    }

    #[inline]
    pub fn total_shadow(&self) -> Decimal {
        self.upper_shadow.length() + self.lower_shadow.length()
    }

    #[inline]
    pub fn is_light(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_dark(&self) -> bool {
        self.open > self.close
    }

    /// Shares of the total shadow held by (upper, lower). None if there is no shadow.
    fn shadow_shares(&self) -> Option<(Decimal, Decimal)> {
        let total = self.total_shadow();
        (total > Decimal::ZERO).then(|| {
            (
                self.upper_shadow.length() / total,
                self.lower_shadow.length() / total,
            )
        })
    }

    // ===========================================
    // Doji family
    // ===========================================

    /// Body negligible relative to the bar length, with a floor scaled to price level.
    pub fn is_doji(&self) -> bool {
        let by_length = tolerance(self.length(), DEFAULT_TOLERANCE);
        let floor = tolerance(self.average_price(), DOJI_PRICE_FACTOR);
        self.body.length() < by_length.max(floor)
    }

    /// Doji whose whole bar is negligible: open, high, low, close nearly equal.
    pub fn is_four_price_doji(&self) -> bool {
        self.is_doji() && self.length() < tolerance(self.average_price(), FOUR_PRICE_FACTOR)
    }

    pub fn is_long_legged_doji(&self) -> bool {
        if !self.is_doji() || self.is_four_price_doji() {
            return false;
        }
        matches!(
            self.shadow_shares(),
            Some((upper, lower)) if upper >= BALANCED_SHADOW_SHARE && lower >= BALANCED_SHADOW_SHARE
        )
    }

    pub fn is_dragonfly_doji(&self) -> bool {
        if !self.is_doji() {
            return false;
        }
        matches!(
            self.shadow_shares(),
            Some((upper, lower)) if upper <= MINOR_SHADOW_SHARE && lower >= MAJOR_SHADOW_SHARE
        )
    }

    pub fn is_gravestone_doji(&self) -> bool {
        if !self.is_doji() {
            return false;
        }
        matches!(
            self.shadow_shares(),
            Some((upper, lower)) if lower <= MINOR_SHADOW_SHARE && upper >= MAJOR_SHADOW_SHARE
        )
    }

    // ===========================================
    // Shaven ends, marubozu, belt-hold
    // ===========================================

    pub fn has_shaven_head(&self) -> bool {
        self.upper_shadow.length() < tolerance(self.average_price(), SHAVEN_FACTOR)
    }

    pub fn has_shaven_bottom(&self) -> bool {
        self.lower_shadow.length() < tolerance(self.average_price(), SHAVEN_FACTOR)
    }

    /// Body spans the whole bar.
    pub fn is_marubozu(&self) -> bool {
        !self.is_doji() && self.body.length() == self.length()
    }

    /// Body covers at least ~2/3 of the bar, widened by the default tolerance.
    fn has_dominant_body(&self) -> bool {
        let length = self.length();
        let required = length * Decimal::TWO / dec!(3) - tolerance(length, DEFAULT_TOLERANCE);
        self.body.length() >= required
    }

    fn is_belthold_candidate(&self) -> bool {
        !self.is_doji()
            && !self.is_marubozu()
            && self.high() > Decimal::ZERO
            && self.low() > Decimal::ZERO
            && self.volume > 0
            && self.has_dominant_body()
    }

    /// Light bar opening on its low and closing near its high.
    pub fn is_bullish_belthold(&self) -> bool {
        self.is_belthold_candidate() && self.has_shaven_bottom() && self.is_light()
    }

    /// Dark bar opening on its high and closing near its low.
    pub fn is_bearish_belthold(&self) -> bool {
        self.is_belthold_candidate() && self.has_shaven_head() && self.is_dark()
    }

    // ===========================================
    // Umbrella family and spinning top
    // ===========================================

    /// Hammer / hanging-man shape: long lower shadow, body in the upper half.
    pub fn is_umbrella(&self) -> bool {
        let length = self.length();
        length > Decimal::ZERO
            && self.lower_shadow.length() >= self.body.length() * UMBRELLA_SHADOW_MULTIPLE
            && self.upper_shadow.length() <= length * UMBRELLA_OPPOSITE_SHARE
            && self.body.midpoint() > self.midpoint()
    }

    /// Shooting-star / inverted-hammer shape: long upper shadow, body in the lower half.
    pub fn is_inverted_umbrella(&self) -> bool {
        let length = self.length();
        length > Decimal::ZERO
            && self.upper_shadow.length() >= self.body.length() * UMBRELLA_SHADOW_MULTIPLE
            && self.lower_shadow.length() <= length * UMBRELLA_OPPOSITE_SHARE
            && self.body.midpoint() < self.midpoint()
    }

    pub fn is_spinning_top(&self) -> bool {
        let body = self.body.length();
        self.upper_shadow.length() > body
            && self.lower_shadow.length() > body
            && !self.is_doji()
            && !self.is_umbrella()
            && !self.is_inverted_umbrella()
    }
}

// ============================================================
// TESTS
// ============================================================
