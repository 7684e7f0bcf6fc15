//! Single-bar signals: doji family, umbrella shapes, belt-hold

use super::helpers::{is_hammer_shape, is_inverted_hammer_shape};

// ============================================================
// DOJI FAMILY
// ============================================================

matcher!(doji, "Doji", 1, |chart, position, bars| bars[0].is_doji());

matcher!(long_legged_doji, "LongLeggedDoji", 1, |chart, position, bars| {
    bars[0].is_long_legged_doji()
});

matcher!(dragonfly_doji, "DragonflyDoji", 1, |chart, position, bars| {
    bars[0].is_dragonfly_doji()
});

matcher!(gravestone_doji, "GravestoneDoji", 1, |chart, position, bars| {
    bars[0].is_gravestone_doji()
});

// ============================================================
// UMBRELLA SHAPES
// ============================================================
// Hammer and hanging man share a shape, as do inverted hammer and shooting
// star. The signal's required prior sentiment tells them apart.

matcher!(hammer, "Hammer", 1, |chart, position, bars| is_hammer_shape(&bars[0]));

matcher!(hanging_man, "HangingMan", 1, |chart, position, bars| is_hammer_shape(&bars[0]));

matcher!(
    /// Inverted umbrella whose body opens above the prior bar's body
    shooting_star,
    "ShootingStar",
    1,
    |chart, position, bars| {
        is_inverted_hammer_shape(&bars[0])
            && position
                .checked_sub(1)
                .map(|prev| &chart.candlesticks()[prev])
                .map_or(true, |prev| bars[0].body().low() >= prev.body().high())
    }
);

matcher!(inverted_hammer, "InvertedHammer", 1, |chart, position, bars| {
    is_inverted_hammer_shape(&bars[0])
});

// ============================================================
// BELT-HOLD
// ============================================================

matcher!(
    /// Light bar opening on its low, with a tall body
    bullish_belt_hold,
    "BullishBeltHold",
    1,
    |chart, position, bars| {
        bars[0].is_bullish_belthold() && chart.is_tall(position, 0, rust_decimal::Decimal::ONE)
    }
);

matcher!(
    /// Dark bar opening on its high, with a tall body
    bearish_belt_hold,
    "BearishBeltHold",
    1,
    |chart, position, bars| {
        bars[0].is_bearish_belthold() && chart.is_tall(position, 0, rust_decimal::Decimal::ONE)
    }
);

// ============================================================
// TESTS
// ============================================================
