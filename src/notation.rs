//! Compact notation for moving averages and trends.
//!
//! ```text
//! moving average : [S|E] <period> [O|H|L|C|M]     e.g. S200C, E20M
//! trend          : <moving average> | X <period>    e.g. S50C, X20
//! ```
//!
//! `S`/`E` select a simple or exponential average; the trailing letter picks
//! the price point (open, high, low, close, midpoint). `X<period>` selects an
//! extreme-proximity trend over a rolling window of `period` bars.

use crate::{
    moving_average::{MovingAverageKey, MovingAverageType, PricePoint},
    ChartError, Period, Result,
};

/// Parsed trend token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendNotation {
    MovingAverage(MovingAverageKey),
    Extreme(Period),
}

fn invalid(token: &str) -> ChartError {
    ChartError::InvalidNotation(token.to_string())
}

fn parse_period(digits: &str, token: &str) -> Result<Period> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(token));
    }
    let value: usize = digits.parse().map_err(|_| invalid(token))?;
    Period::new(value).map_err(|_| invalid(token))
}

/// Parse `[S|E]<period><O|H|L|C|M>`.
pub fn parse_moving_average(token: &str) -> Result<MovingAverageKey> {
    let trimmed = token.trim();
    let mut chars = trimmed.chars();

    let kind = chars
        .next()
        .and_then(MovingAverageType::from_code)
        .ok_or_else(|| invalid(token))?;
    let price_point = chars
        .next_back()
        .and_then(PricePoint::from_code)
        .ok_or_else(|| invalid(token))?;
    let period = parse_period(chars.as_str(), token)?;

    Ok(MovingAverageKey {
        period,
        price_point,
        kind,
    })
}

/// Parse a trend token: moving-average notation or `X<period>`.
pub fn parse_trend(token: &str) -> Result<TrendNotation> {
    let trimmed = token.trim();
    if let Some(digits) = trimmed.strip_prefix(&['X', 'x'][..]) {
        return Ok(TrendNotation::Extreme(parse_period(digits, token)?));
    }
    parse_moving_average(trimmed).map(TrendNotation::MovingAverage)
}
