//! Three-bar signals: stars, two crows, three crows/soldiers and engulfing
//! follow-through

use super::helpers::{
  body_gaps_down, body_gaps_up, is_bearish_engulfing, is_bullish_engulfing, is_dark_body,
  is_light_body, is_star_body,
};

// ============================================================
// STARS
// ============================================================

matcher!(
  /// Dark bar, a small body gapping below it, then a light bar closing
  /// above the midpoint of the first body
  morning_star,
  "MorningStar",
  3,
  |chart, position, bars| {
    let (first, star, last) = (&bars[0], &bars[1], &bars[2]);
    is_dark_body(first)
      && !star.is_doji()
      && is_star_body(first, star)
      && body_gaps_down(first, star)
      && is_light_body(last)
      && last.close() > first.body().midpoint()
  }
);

matcher!(
  /// Light bar, a small body gapping above it, then a dark bar closing
  /// below the midpoint of the first body
  evening_star,
  "EveningStar",
  3,
  |chart, position, bars| {
    let (first, star, last) = (&bars[0], &bars[1], &bars[2]);
    is_light_body(first)
      && !star.is_doji()
      && is_star_body(first, star)
      && body_gaps_up(first, star)
      && is_dark_body(last)
      && last.close() < first.body().midpoint()
  }
);

matcher!(morning_doji_star, "MorningDojiStar", 3, |chart, position, bars| {
  let (first, star, last) = (&bars[0], &bars[1], &bars[2]);
  is_dark_body(first)
    && star.is_doji()
    && body_gaps_down(first, star)
    && is_light_body(last)
    && last.close() > first.body().midpoint()
});

matcher!(evening_doji_star, "EveningDojiStar", 3, |chart, position, bars| {
  let (first, star, last) = (&bars[0], &bars[1], &bars[2]);
  is_light_body(first)
    && star.is_doji()
    && body_gaps_up(first, star)
    && is_dark_body(last)
    && last.close() < first.body().midpoint()
});

// ============================================================
// CROWS & SOLDIERS
// ============================================================

matcher!(
  /// Light bar, a dark bar gapping up, then a dark bar engulfing the
  /// second while the gap over the first stays open
  upside_gap_two_crows,
  "UpsideGapTwoCrows",
  3,
  |chart, position, bars| {
    let (first, crow, last) = (&bars[0], &bars[1], &bars[2]);
    is_light_body(first)
      && is_dark_body(crow)
      && body_gaps_up(first, crow)
      && is_dark_body(last)
      && last.open() > crow.open()
      && last.close() < crow.close()
      && last.close() > first.close()
  }
);

matcher!(
  /// Three dark bars, each opening inside the prior body and closing lower
  three_black_crows,
  "ThreeBlackCrows",
  3,
  |chart, position, bars| {
    bars[..3].iter().all(is_dark_body)
      && bars[..3].windows(2).all(|pair| {
        pair[0].body().includes(pair[1].open()) && pair[1].close() < pair[0].close()
      })
  }
);

matcher!(
  /// Three light bars, each opening inside the prior body and closing higher
  three_white_soldiers,
  "ThreeWhiteSoldiers",
  3,
  |chart, position, bars| {
    bars[..3].iter().all(is_light_body)
      && bars[..3].windows(2).all(|pair| {
        pair[0].body().includes(pair[1].open()) && pair[1].close() > pair[0].close()
      })
  }
);

// ============================================================
// ENGULFING FOLLOW-THROUGH
// ============================================================

matcher!(
  bullish_engulfing_follow_through,
  "BullishEngulfingFollowThrough",
  3,
  |chart, position, bars| {
    is_bullish_engulfing(&bars[0], &bars[1])
      && is_light_body(&bars[2])
      && bars[2].close() > bars[1].close()
  }
);

matcher!(
  bearish_engulfing_follow_through,
  "BearishEngulfingFollowThrough",
  3,
  |chart, position, bars| {
    is_bearish_engulfing(&bars[0], &bars[1])
      && is_dark_body(&bars[2])
      && bars[2].close() < bars[1].close()
  }
);

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use chrono::{Days, NaiveDate};
  use rust_decimal::Decimal;
  use rust_decimal_macros::dec;

  use super::*;
  use crate::{
    aggregate::Interval,
    chart::{Chart, ChartBuilder, ChartInfo},
    price::Ohlc,
  };

  type Row = (Decimal, Decimal, Decimal, Decimal);

  fn chart_with(rows: [Row; 3]) -> Chart {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let quiet: Row = (dec!(10), dec!(10.2), dec!(9.9), dec!(10.1));
    let bars = [quiet, quiet]
      .into_iter()
      .chain(rows)
      .enumerate()
      .map(|(i, (o, h, l, c))| Ohlc::new("T", date + Days::new(i as u64), o, h, l, c, 100).unwrap())
      .collect();
    ChartBuilder::new(ChartInfo::new("T", Interval::Daily), bars)
      .prologue_length(2)
      .build()
      .unwrap()
  }

  #[test]
  fn test_morning_stars() {
    let chart = chart_with([
      (dec!(11), dec!(11.1), dec!(9.9), dec!(10)),
      (dec!(9.6), dec!(9.7), dec!(9.4), dec!(9.5)),
      (dec!(9.8), dec!(10.8), dec!(9.7), dec!(10.7)),
    ]);
    assert_eq!(morning_star(&chart, 2, 3, 2, None).unwrap(), Some(4));
    assert_eq!(morning_doji_star(&chart, 2, 3, 2, None).unwrap(), None);
    assert_eq!(evening_star(&chart, 2, 3, 2, None).unwrap(), None);

    let chart = chart_with([
      (dec!(11), dec!(11.1), dec!(9.9), dec!(10)),
      (dec!(9.5), dec!(9.7), dec!(9.3), dec!(9.5)),
      (dec!(9.8), dec!(10.8), dec!(9.7), dec!(10.7)),
    ]);
    assert_eq!(morning_doji_star(&chart, 2, 3, 2, None).unwrap(), Some(4));
    assert_eq!(morning_star(&chart, 2, 3, 2, None).unwrap(), None);
  }

  #[test]
  fn test_evening_stars() {
    let chart = chart_with([
      (dec!(10), dec!(11.1), dec!(9.9), dec!(11)),
      (dec!(11.4), dec!(11.6), dec!(11.3), dec!(11.5)),
      (dec!(11.2), dec!(11.3), dec!(10.2), dec!(10.3)),
    ]);
    assert_eq!(evening_star(&chart, 2, 3, 2, None).unwrap(), Some(4));

    let chart = chart_with([
      (dec!(10), dec!(11.1), dec!(9.9), dec!(11)),
      (dec!(11.5), dec!(11.7), dec!(11.3), dec!(11.5)),
      (dec!(11.2), dec!(11.3), dec!(10.2), dec!(10.3)),
    ]);
    assert_eq!(evening_doji_star(&chart, 2, 3, 2, None).unwrap(), Some(4));
  }

  #[test]
  fn test_upside_gap_two_crows() {
    let chart = chart_with([
      (dec!(10), dec!(11.1), dec!(9.9), dec!(11)),
      (dec!(11.6), dec!(11.7), dec!(11.3), dec!(11.4)),
      (dec!(11.8), dec!(11.9), dec!(11.1), dec!(11.2)),
    ]);
    assert_eq!(upside_gap_two_crows(&chart, 2, 3, 2, None).unwrap(), Some(4));
  }

  #[test]
  fn test_crows_and_soldiers() {
    let chart = chart_with([
      (dec!(12), dec!(12.1), dec!(11.2), dec!(11.3)),
      (dec!(11.5), dec!(11.6), dec!(10.7), dec!(10.8)),
      (dec!(11), dec!(11.1), dec!(10.2), dec!(10.3)),
    ]);
    assert_eq!(three_black_crows(&chart, 2, 3, 2, None).unwrap(), Some(4));
    assert_eq!(three_white_soldiers(&chart, 2, 3, 2, None).unwrap(), None);

    let chart = chart_with([
      (dec!(10), dec!(10.8), dec!(9.9), dec!(10.7)),
      (dec!(10.5), dec!(11.3), dec!(10.4), dec!(11.2)),
      (dec!(11), dec!(11.8), dec!(10.9), dec!(11.7)),
    ]);
    assert_eq!(three_white_soldiers(&chart, 2, 3, 2, None).unwrap(), Some(4));
  }

  #[test]
  fn test_engulfing_follow_through() {
    let chart = chart_with([
      (dec!(10), dec!(10.5), dec!(8.5), dec!(9)),
      (dec!(8.8), dec!(10.6), dec!(8.7), dec!(10.2)),
      (dec!(10.3), dec!(11), dec!(10.2), dec!(10.9)),
    ]);
    assert_eq!(bullish_engulfing_follow_through(&chart, 2, 3, 2, None).unwrap(), Some(4));
    assert_eq!(bearish_engulfing_follow_through(&chart, 2, 3, 2, None).unwrap(), None);
  }
}
