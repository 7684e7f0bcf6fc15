//! Two-bar signals: engulfing, harami, piercing/dark cloud, tweezers,
//! counterattack and umbrella follow-through

use rust_decimal::Decimal;

use super::helpers::{
    is_bearish_engulfing, is_bullish_engulfing, is_dark_body, is_hammer_shape, is_harami,
    is_light_body, nearly_equal,
};

// ============================================================
// UMBRELLA FOLLOW-THROUGH
// ============================================================

matcher!(
    /// Hammer confirmed by a light bar closing above the hammer's body
    hammer_follow_through,
    "HammerFollowThrough",
    2,
    |chart, position, bars| {
        let (hammer, next) = (&bars[0], &bars[1]);
        is_hammer_shape(hammer) && is_light_body(next) && next.close() > hammer.body().high()
    }
);

matcher!(
    /// Hanging man confirmed by a dark bar closing below its body
    hanging_man_follow_through,
    "HangingManFollowThrough",
    2,
    |chart, position, bars| {
        let (hanging, next) = (&bars[0], &bars[1]);
        is_hammer_shape(hanging) && is_dark_body(next) && next.close() < hanging.body().low()
    }
);

// ============================================================
// ENGULFING
// ============================================================

matcher!(bullish_engulfing, "BullishEngulfing", 2, |chart, position, bars| {
    is_bullish_engulfing(&bars[0], &bars[1])
});

matcher!(bearish_engulfing, "BearishEngulfing", 2, |chart, position, bars| {
    is_bearish_engulfing(&bars[0], &bars[1])
});

matcher!(
    /// Bullish engulfing whose engulfing body is taller than average
    bullish_engulfing_tall_candle,
    "BullishEngulfingTallCandle",
    2,
    |chart, position, bars| {
        is_bullish_engulfing(&bars[0], &bars[1]) && chart.is_tall(position + 1, 0, Decimal::ONE)
    }
);

matcher!(
    /// Bearish engulfing whose engulfing body is taller than average
    bearish_engulfing_tall_candle,
    "BearishEngulfingTallCandle",
    2,
    |chart, position, bars| {
        is_bearish_engulfing(&bars[0], &bars[1]) && chart.is_tall(position + 1, 0, Decimal::ONE)
    }
);

// ============================================================
// PIERCING / DARK CLOUD
// ============================================================

matcher!(
    /// Light bar, then a dark bar opening above its high and closing
    /// below the midpoint of its body
    dark_cloud_cover,
    "DarkCloudCover",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_light_body(first)
            && is_dark_body(second)
            && second.open() > first.high()
            && second.close() < first.body().midpoint()
            && second.close() > first.open()
    }
);

matcher!(
    /// Dark bar, then a light bar opening below its low and closing
    /// above the midpoint of its body
    piercing_pattern,
    "PiercingPattern",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_dark_body(first)
            && is_light_body(second)
            && second.open() < first.low()
            && second.close() > first.body().midpoint()
            && second.close() < first.open()
    }
);

// ============================================================
// HARAMI
// ============================================================

matcher!(bullish_harami, "BullishHarami", 2, |chart, position, bars| {
    let (first, second) = (&bars[0], &bars[1]);
    is_dark_body(first) && is_light_body(second) && is_harami(first, second)
});

matcher!(bearish_harami, "BearishHarami", 2, |chart, position, bars| {
    let (first, second) = (&bars[0], &bars[1]);
    is_light_body(first) && is_dark_body(second) && is_harami(first, second)
});

matcher!(bullish_harami_cross, "BullishHaramiCross", 2, |chart, position, bars| {
    let (first, second) = (&bars[0], &bars[1]);
    is_dark_body(first) && second.is_doji() && is_harami(first, second)
});

matcher!(bearish_harami_cross, "BearishHaramiCross", 2, |chart, position, bars| {
    let (first, second) = (&bars[0], &bars[1]);
    is_light_body(first) && second.is_doji() && is_harami(first, second)
});

// ============================================================
// TWEEZERS
// ============================================================

matcher!(
    /// Light bar and dark bar sharing the same high
    tweezer_top,
    "TweezerTop",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_light_body(first)
            && is_dark_body(second)
            && nearly_equal(first.high(), second.high(), first.high())
    }
);

matcher!(
    /// Dark bar and light bar sharing the same low
    tweezer_bottom,
    "TweezerBottom",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_dark_body(first)
            && is_light_body(second)
            && nearly_equal(first.low(), second.low(), first.low())
    }
);

// ============================================================
// COUNTERATTACK
// ============================================================

matcher!(
    /// Dark bar, then a light bar gapping down at the open and closing
    /// back at the prior close
    bullish_counterattack,
    "BullishCounterattack",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_dark_body(first)
            && is_light_body(second)
            && second.open() < first.close()
            && nearly_equal(second.close(), first.close(), first.close())
    }
);

matcher!(
    /// Light bar, then a dark bar gapping up at the open and closing
    /// back at the prior close
    bearish_counterattack,
    "BearishCounterattack",
    2,
    |chart, position, bars| {
        let (first, second) = (&bars[0], &bars[1]);
        is_light_body(first)
            && is_dark_body(second)
            && second.open() > first.close()
            && nearly_equal(second.close(), first.close(), first.close())
    }
);

// ============================================================
// TESTS
// ============================================================
