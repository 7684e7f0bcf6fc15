//! Five-bar signals: engulfing after four same-colored predecessors

use super::helpers::{is_bearish_engulfing, is_bullish_engulfing, is_dark_body, is_light_body};

matcher!(
  /// Four dark bars with falling closes, then a light bar engulfing the fourth
  bullish_engulfing_four_predecessors,
  "BullishEngulfingFourPredecessors",
  5,
  |chart, position, bars| {
    let predecessors = &bars[..4];
    predecessors.iter().all(is_dark_body)
      && predecessors.windows(2).all(|pair| pair[1].close() < pair[0].close())
      && is_bullish_engulfing(&bars[3], &bars[4])
  }
);

matcher!(
  /// Four light bars with rising closes, then a dark bar engulfing the fourth
  bearish_engulfing_four_predecessors,
  "BearishEngulfingFourPredecessors",
  5,
  |chart, position, bars| {
    let predecessors = &bars[..4];
    predecessors.iter().all(is_light_body)
      && predecessors.windows(2).all(|pair| pair[1].close() > pair[0].close())
      && is_bearish_engulfing(&bars[3], &bars[4])
  }
);

#[cfg(test)]
mod tests {
  use chrono::{Days, NaiveDate};
  use rust_decimal_macros::dec;

  use super::*;
  use crate::{
    aggregate::Interval,
    chart::{ChartBuilder, ChartInfo},
    price::Ohlc,
  };

  #[test]
  fn test_four_predecessors() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let rows = [
      (dec!(12), dec!(12.1), dec!(11.4), dec!(11.5)),
      (dec!(11.5), dec!(11.6), dec!(10.9), dec!(11)),
      (dec!(11), dec!(11.1), dec!(10.4), dec!(10.5)),
      (dec!(10.5), dec!(10.6), dec!(9.9), dec!(10)),
      (dec!(9.8), dec!(10.7), dec!(9.7), dec!(10.6)),
    ];
    let bars = rows
      .into_iter()
      .enumerate()
      .map(|(i, (o, h, l, c))| Ohlc::new("M", date + Days::new(i as u64), o, h, l, c, 10).unwrap())
      .collect();
    let chart = ChartBuilder::new(ChartInfo::new("M", Interval::Daily), bars)
      .prologue_length(0)
      .build()
      .unwrap();

    assert_eq!(bullish_engulfing_four_predecessors(&chart, 0, 5, 0, None).unwrap(), Some(4));
    assert_eq!(bearish_engulfing_four_predecessors(&chart, 0, 5, 0, None).unwrap(), None);
    assert!(bullish_engulfing_four_predecessors(&chart, 1, 5, 0, None).is_err());
  }
}
