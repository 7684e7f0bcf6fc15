//! Signal library and scanning engine
//!
//! A [`Signal`] is declarative: a name, the number of bars the pattern spans,
//! the sentiment it predicts, an optional sentiment required going into the
//! pattern, and a matcher function. Matchers return the index of the bar that
//! completes the pattern, or `None`.
//!
//! # Signal Groups
//!
//! - **Single-bar (10)**: Doji family, Hammer/Hanging Man, Shooting Star, Belt-hold
//! - **Two-bar (16)**: Engulfing, Harami, Piercing/Dark Cloud, Tweezers, Counterattack
//! - **Three-bar (9)**: Morning/Evening Star, Three Crows/Soldiers, Engulfing follow-through
//! - **Multi-bar (2)**: Engulfing after four predecessors

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{
    chart::Chart,
    ChartError, Result,
    Sentiment::{self, Bearish, Bullish, Neutral},
};

/// Generate a matcher from a predicate over the pattern's window of candlesticks.
///
/// The generated function checks bounds, evaluates the predicate and applies
/// the optional volume confirmation on the pattern's last bar.
macro_rules! matcher {
  ($(#[$meta:meta])* $name:ident, $signal:literal, $width:literal,
   |$chart:ident, $position:ident, $bars:ident| $predicate:expr) => {
    $(#[$meta])*
    pub fn $name(
      chart: &crate::chart::Chart,
      position: usize,
      number_required: usize,
      prologue_length: usize,
      volume_factor: Option<rust_decimal::Decimal>,
    ) -> crate::Result<Option<usize>> {
      let $bars = super::helpers::window(
        $signal,
        chart,
        position,
        number_required,
        prologue_length,
        $width,
      )?;
      #[allow(unused_variables)]
      let $chart = chart;
      #[allow(unused_variables)]
      let $position = position;
      let matched: bool = $predicate;
      Ok(super::helpers::confirm(chart, position, position + $width - 1, volume_factor, matched))
    }
  };
}

pub mod helpers;
pub mod multi_bar;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

/// `(chart, position, number_required, prologue_length, volume_factor)` to the
/// terminal index of a match
pub type Matcher = fn(&Chart, usize, usize, usize, Option<Decimal>) -> Result<Option<usize>>;

// ============================================================
// MATCH RECORDS
// ============================================================

/// Inclusive `[start, end]` index range into a chart's arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

/// One confirmed occurrence of a signal in a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMatch {
    pub signal_name: String,
    pub instrument_code: String,
    /// Bars `[position - prologue_length, position - 1]`; None for a zero prologue
    pub prologue_range: Option<IndexRange>,
    /// Bars from `position` to the bar completing the pattern
    pub signal_range: IndexRange,
}

// ============================================================
// SIGNAL
// ============================================================

#[derive(Debug, Clone, Copy)]
pub struct Signal {
    name: &'static str,
    number_required: usize,
    predicted: Sentiment,
    required_prior: Option<Sentiment>,
    matcher: Matcher,
    volume_factor: Option<Decimal>,
}

impl Signal {
    pub const fn new(
        name: &'static str,
        number_required: usize,
        predicted: Sentiment,
        required_prior: Option<Sentiment>,
        matcher: Matcher,
    ) -> Self {
        Self {
            name,
            number_required,
            predicted,
            required_prior,
            matcher,
            volume_factor: None,
        }
    }

    /// Require the pattern's last bar to trade at least `factor` times the
    /// running average volume before the pattern.
    pub const fn with_volume_factor(self, factor: Decimal) -> Self {
        Self {
            volume_factor: Some(factor),
            ..self
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn number_required(&self) -> usize {
        self.number_required
    }

    #[inline]
    pub fn predicted(&self) -> Sentiment {
        self.predicted
    }

    #[inline]
    pub fn required_prior(&self) -> Option<Sentiment> {
        self.required_prior
    }

    #[inline]
    pub fn volume_factor(&self) -> Option<Decimal> {
        self.volume_factor
    }

    /// Evaluate the signal at `position`.
    ///
    /// Positions outside `[prologue_length, len - number_required]` are an
    /// error. A position whose prior sentiment does not match the required one
    /// is not a match.
    pub fn evaluate(&self, chart: &Chart, position: usize) -> Result<Option<usize>> {
        let prologue_length = chart.prologue_length();
        helpers::check_bounds(self.name, chart, position, self.number_required, prologue_length)?;

        if let Some(required) = self.required_prior {
            if chart.prior_sentiment(position) != required {
                return Ok(None);
            }
        }

        (self.matcher)(chart, position, self.number_required, prologue_length, self.volume_factor)
    }

    /// All matches of this signal in `chart`.
    ///
    /// With `signal_only_with_market` and a `market` chart, a position is only
    /// evaluated when the market's trend on the same date equals the predicted
    /// sentiment; dates missing from the market chart are skipped.
    pub fn discover_matches(
        &self,
        chart: &Chart,
        market: Option<&Chart>,
        signal_only_with_market: bool,
    ) -> Result<Vec<SignalMatch>> {
        let prologue_length = chart.prologue_length();
        let Some(last) = chart.len().checked_sub(self.number_required) else {
            return Ok(Vec::new());
        };
        let market = market.filter(|_| signal_only_with_market);

        let mut matches = Vec::new();
        for position in prologue_length..=last {
            if let Some(market) = market {
                let date = chart.price_actions()[position].date();
                let confirmed = market
                    .index_of_date(date)
                    .is_some_and(|index| market.trend_values()[index] == self.predicted);
                if !confirmed {
                    continue;
                }
            }

            if let Some(terminal) = self.evaluate(chart, position)? {
                matches.push(SignalMatch {
                    signal_name: self.name.to_string(),
                    instrument_code: chart.info().code.clone(),
                    prologue_range: (prologue_length > 0)
                        .then(|| IndexRange::new(position - prologue_length, position - 1)),
                    signal_range: IndexRange::new(position, terminal),
                });
            }
        }

        Ok(matches)
    }
}

// ============================================================
// LIBRARY
// ============================================================

/// Volume multiple required of the tall-candle engulfing bar
pub const TALL_CANDLE_VOLUME_FACTOR: Decimal = dec!(1);

static LIBRARY: [Signal; 37] = [
    // Single bar
    Signal::new("Doji", 1, Neutral, None, single_bar::doji),
    Signal::new("LongLeggedDoji", 1, Neutral, None, single_bar::long_legged_doji),
    Signal::new("DragonflyDoji", 1, Bullish, Some(Bearish), single_bar::dragonfly_doji),
    Signal::new("GravestoneDoji", 1, Bearish, Some(Bullish), single_bar::gravestone_doji),
    Signal::new("Hammer", 1, Bullish, Some(Bearish), single_bar::hammer),
    Signal::new("HangingMan", 1, Bearish, Some(Bullish), single_bar::hanging_man),
    Signal::new("ShootingStar", 1, Bearish, Some(Bullish), single_bar::shooting_star),
    Signal::new("InvertedHammer", 1, Bullish, Some(Bearish), single_bar::inverted_hammer),
    Signal::new("BullishBeltHold", 1, Bullish, Some(Bearish), single_bar::bullish_belt_hold),
    Signal::new("BearishBeltHold", 1, Bearish, Some(Bullish), single_bar::bearish_belt_hold),
    // Two bar
    Signal::new("HammerFollowThrough", 2, Bullish, Some(Bearish), two_bar::hammer_follow_through),
    Signal::new(
        "HangingManFollowThrough",
        2,
        Bearish,
        Some(Bullish),
        two_bar::hanging_man_follow_through,
    ),
    Signal::new("BullishEngulfing", 2, Bullish, Some(Bearish), two_bar::bullish_engulfing),
    Signal::new("BearishEngulfing", 2, Bearish, Some(Bullish), two_bar::bearish_engulfing),
    Signal::new(
        "BullishEngulfingTallCandle",
        2,
        Bullish,
        Some(Bearish),
        two_bar::bullish_engulfing_tall_candle,
    )
    .with_volume_factor(TALL_CANDLE_VOLUME_FACTOR),
    Signal::new(
        "BearishEngulfingTallCandle",
        2,
        Bearish,
        Some(Bullish),
        two_bar::bearish_engulfing_tall_candle,
    )
    .with_volume_factor(TALL_CANDLE_VOLUME_FACTOR),
    Signal::new("DarkCloudCover", 2, Bearish, Some(Bullish), two_bar::dark_cloud_cover),
    Signal::new("PiercingPattern", 2, Bullish, Some(Bearish), two_bar::piercing_pattern),
    Signal::new("BullishHarami", 2, Bullish, Some(Bearish), two_bar::bullish_harami),
    Signal::new("BearishHarami", 2, Bearish, Some(Bullish), two_bar::bearish_harami),
    Signal::new("BullishHaramiCross", 2, Bullish, Some(Bearish), two_bar::bullish_harami_cross),
    Signal::new("BearishHaramiCross", 2, Bearish, Some(Bullish), two_bar::bearish_harami_cross),
    Signal::new("TweezerTop", 2, Bearish, Some(Bullish), two_bar::tweezer_top),
    Signal::new("TweezerBottom", 2, Bullish, Some(Bearish), two_bar::tweezer_bottom),
    Signal::new("BullishCounterattack", 2, Bullish, Some(Bearish), two_bar::bullish_counterattack),
    Signal::new("BearishCounterattack", 2, Bearish, Some(Bullish), two_bar::bearish_counterattack),
    // Three bar
    Signal::new("MorningStar", 3, Bullish, Some(Bearish), three_bar::morning_star),
    Signal::new("EveningStar", 3, Bearish, Some(Bullish), three_bar::evening_star),
    Signal::new("MorningDojiStar", 3, Bullish, Some(Bearish), three_bar::morning_doji_star),
    Signal::new("EveningDojiStar", 3, Bearish, Some(Bullish), three_bar::evening_doji_star),
    Signal::new("UpsideGapTwoCrows", 3, Bearish, Some(Bullish), three_bar::upside_gap_two_crows),
    Signal::new("ThreeBlackCrows", 3, Bearish, Some(Bullish), three_bar::three_black_crows),
    Signal::new("ThreeWhiteSoldiers", 3, Bullish, Some(Bearish), three_bar::three_white_soldiers),
    Signal::new(
        "BullishEngulfingFollowThrough",
        3,
        Bullish,
        Some(Bearish),
        three_bar::bullish_engulfing_follow_through,
    ),
    Signal::new(
        "BearishEngulfingFollowThrough",
        3,
        Bearish,
        Some(Bullish),
        three_bar::bearish_engulfing_follow_through,
    ),
    // Five bar
    Signal::new(
        "BullishEngulfingFourPredecessors",
        5,
        Bullish,
        None,
        multi_bar::bullish_engulfing_four_predecessors,
    ),
    Signal::new(
        "BearishEngulfingFourPredecessors",
        5,
        Bearish,
        None,
        multi_bar::bearish_engulfing_four_predecessors,
    ),
];

/// Every built-in signal.
pub fn library() -> &'static [Signal] {
    &LIBRARY
}

/// Look up a built-in signal by name.
pub fn find_signal(name: &str) -> Option<&'static Signal> {
    LIBRARY.iter().find(|signal| signal.name == name)
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

/// Matches of one instrument
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub code: String,
    pub matches: Vec<SignalMatch>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub code: String,
    pub error: ChartError,
}

/// Scan every chart with every signal in parallel.
///
/// `cancel` is checked before each instrument; instruments not started once it
/// is set are reported as [`ChartError::Cancelled`]. A market chart, when
/// given, gates every signal.
pub fn scan_parallel<'a, I>(
    signals: &[Signal],
    charts: I,
    market: Option<&Chart>,
    cancel: &AtomicBool,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    I: IntoParallelIterator<Item = &'a Chart>,
{
    let results: Vec<_> = charts
        .into_par_iter()
        .map(|chart| {
            let code = chart.info().code.clone();
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(code = %code, "scan cancelled");
                return Err(ScanError {
                    code,
                    error: ChartError::Cancelled,
                });
            }

            let mut matches = Vec::new();
            for signal in signals {
                match signal.discover_matches(chart, market, market.is_some()) {
                    Ok(found) => matches.extend(found),
                    Err(error) => return Err(ScanError { code, error }),
                }
            }
            Ok(ScanResult { code, matches })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}
