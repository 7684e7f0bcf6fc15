//! Shared bounds checks and candlestick relations used by the matchers.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    candlestick::Candlestick,
    chart::Chart,
    price::tolerance,
    ChartError, Result,
};

// ============================================================
// THRESHOLDS
// ============================================================

/// Star body at most this share of the first bar's body
pub const STAR_BODY_SHARE: Decimal = dec!(0.5);
/// Prices closer than this fraction of the reference price are equal
pub const EQUAL_PRICE_FACTOR: Decimal = dec!(0.001);

// ============================================================
// CONTRACT
// ============================================================

/// `position >= prologue_length` and `position + number_required <= len`.
pub fn check_bounds(
    signal: &'static str,
    chart: &Chart,
    position: usize,
    number_required: usize,
    prologue_length: usize,
) -> Result<()> {
    let fits = position >= prologue_length
        && position
            .checked_add(number_required)
            .is_some_and(|end| end <= chart.len());
    if fits {
        return Ok(());
    }
    Err(ChartError::PositionOutOfBounds {
        signal,
        position,
        number_required,
        prologue_length,
        len: chart.len(),
    })
}

/// Candlesticks `[position, position + max(number_required, width))` after a
/// bounds check.
pub fn window<'a>(
    signal: &'static str,
    chart: &'a Chart,
    position: usize,
    number_required: usize,
    prologue_length: usize,
    width: usize,
) -> Result<&'a [Candlestick]> {
    let span = number_required.max(width);
    check_bounds(signal, chart, position, span, prologue_length)?;
    Ok(&chart.candlesticks()[position..position + span])
}

/// Volume of `terminal` is at least `factor` times the running average
/// volume at the bar before the pattern. Always true without a factor; with
/// a factor, a pattern starting at bar 0 has no reference and fails.
pub fn volume_confirmed(
    chart: &Chart,
    position: usize,
    terminal: usize,
    factor: Option<Decimal>,
) -> bool {
    let Some(factor) = factor else {
        return true;
    };
    let Some(&reference) = position.checked_sub(1).and_then(|p| chart.average_volume().get(p))
    else {
        return false;
    };
    let volume = chart.candlesticks()[terminal].volume();
    Decimal::from(volume) >= factor * Decimal::from(reference)
}

pub fn confirm(
    chart: &Chart,
    position: usize,
    terminal: usize,
    factor: Option<Decimal>,
    matched: bool,
) -> Option<usize> {
    (matched && volume_confirmed(chart, position, terminal, factor)).then_some(terminal)
}

// ============================================================
// RELATIONS
// ============================================================

/// Real body that is not a doji
#[inline]
pub fn has_body(c: &Candlestick) -> bool {
    c.body().length() > Decimal::ZERO && !c.is_doji()
}

#[inline]
pub fn is_light_body(c: &Candlestick) -> bool {
    c.is_light() && has_body(c)
}

#[inline]
pub fn is_dark_body(c: &Candlestick) -> bool {
    c.is_dark() && has_body(c)
}

/// Hammer / hanging-man shape
#[inline]
pub fn is_hammer_shape(c: &Candlestick) -> bool {
    c.is_umbrella() && has_body(c)
}

/// Shooting-star / inverted-hammer shape
#[inline]
pub fn is_inverted_hammer_shape(c: &Candlestick) -> bool {
    c.is_inverted_umbrella() && has_body(c)
}

/// `b` opens its body above `a`'s body
#[inline]
pub fn body_gaps_up(a: &Candlestick, b: &Candlestick) -> bool {
    b.body().low() > a.body().high()
}

/// `b` opens its body below `a`'s body
#[inline]
pub fn body_gaps_down(a: &Candlestick, b: &Candlestick) -> bool {
    b.body().high() < a.body().low()
}

/// Equal within [`EQUAL_PRICE_FACTOR`] of `reference`
#[inline]
pub fn nearly_equal(a: Decimal, b: Decimal, reference: Decimal) -> bool {
    (a - b).abs() <= tolerance(reference, EQUAL_PRICE_FACTOR)
}

/// Dark body followed by a light body that engulfs it
pub fn is_bullish_engulfing(first: &Candlestick, second: &Candlestick) -> bool {
    is_dark_body(first) && is_light_body(second) && second.body().engulfs(first.body())
}

/// Light body followed by a dark body that engulfs it
pub fn is_bearish_engulfing(first: &Candlestick, second: &Candlestick) -> bool {
    is_light_body(first) && is_dark_body(second) && second.body().engulfs(first.body())
}

/// `second`'s body lies inside a longer `first` body; one bound may touch
pub fn is_harami(first: &Candlestick, second: &Candlestick) -> bool {
    has_body(first) && first.body().engulfs(second.body())
}

/// Small body relative to the first bar of a star pattern
#[inline]
pub fn is_star_body(first: &Candlestick, star: &Candlestick) -> bool {
    star.body().length() <= first.body().length() * STAR_BODY_SHARE
}

// ============================================================
// TESTS
// ============================================================
