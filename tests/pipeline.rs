//! End-to-end tests: raw bars and configuration through the factory, the
//! chart build pipeline and the signal library.

use std::sync::Arc;

use candlescan::prelude::*;
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn flat_daily(n: u64) -> Vec<Ohlc> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            Ohlc::new("FLAT", start + Days::new(i), dec!(10), dec!(10), dec!(10), dec!(10), 1000)
                .unwrap()
        })
        .collect()
}

/// Weekday bars with a slow sine-like drift, enough to produce varied candles
fn trading_days(n: usize) -> Vec<Ohlc> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut price = dec!(50);
    (0u64..)
        .map(|i| start + Days::new(i))
        .filter(|d| d.weekday().num_days_from_monday() < 5)
        .take(n)
        .enumerate()
        .map(|(i, date)| {
            let step = Decimal::from((i * 7 + 3) % 11) / dec!(10) - dec!(0.5);
            let open = price;
            let close = price + step;
            let wick = Decimal::from((i % 4) as u64) / dec!(10) + dec!(0.1);
            price = close;
            let (high, low) = (open.max(close) + wick, open.min(close) - wick);
            Ohlc::new("WAVE", date, open, high, low, close, 500).unwrap()
        })
        .collect()
}

#[test]
fn test_flat_series_end_to_end() {
    let chart = ChartBuilder::new(ChartInfo::new("FLAT", Interval::Daily), flat_daily(250))
        .trend(Trend::parse("S200C").unwrap())
        .build()
        .unwrap();

    assert_eq!(chart.len(), 250);
    assert_eq!(chart.candlesticks().len(), 250);
    assert_eq!(chart.trend_values().len(), 250);
    assert!(chart.moving_averages().is_empty());
    assert!(chart
        .candlesticks()
        .iter()
        .all(|c| c.is_doji() && c.body().length() == Decimal::ZERO));
    assert!(chart.trend_values().iter().all(|s| *s == Sentiment::Neutral));

    for signal in library().iter().filter(|s| s.predicted() != Sentiment::Neutral) {
        let matches = signal.discover_matches(&chart, None, false).unwrap();
        assert!(matches.is_empty(), "{} matched a flat series", signal.name());
    }

    let doji = find_signal("Doji").unwrap().discover_matches(&chart, None, false).unwrap();
    assert_eq!(doji.len(), 250 - chart.prologue_length());
}

#[test]
fn test_factory_from_toml() {
    let config = ChartConfig::from_toml_str(
        r#"
        interval = "weekly"
        moving_averages = ["S4C", "E3M", "not-a-token"]
        prologue_length = 4

        [[trends]]
        notation = "S4C"

        [[trends]]
        notation = "X6"
        weight = 0.5
        "#,
    )
    .unwrap();

    let factory = ChartFactory::default();
    let instrument = Instrument::new("WAVE").with_source("TEST").with_industry("Waves");
    let daily = trading_days(60);

    let chart = factory.create(&instrument, &[daily.clone()], &config).unwrap();
    assert_eq!(chart.info().interval, Interval::Weekly);
    assert_eq!(chart.len(), 12);
    assert_eq!(chart.moving_averages().len(), 2);
    assert_eq!(chart.trend_name().as_deref(), Some("S4C*1+X6*0.5"));
    assert_eq!(chart.info().industry.as_deref(), Some("Waves"));
    assert_eq!(chart.prologue_length(), 4);

    let weekly_volume: u64 = chart.price_actions().iter().map(Ohlc::volume).sum();
    assert_eq!(weekly_volume, 60 * 500);

    let again = factory.create(&instrument, &[daily], &config).unwrap();
    assert!(Arc::ptr_eq(&chart, &again));

    for signal in library() {
        for found in signal.discover_matches(&chart, None, false).unwrap() {
            assert_eq!(found.instrument_code, "WAVE");
            assert!(found.signal_range.end < chart.len());
        }
    }
}

#[test]
fn test_bars_from_json_records() {
    let json = r#"[
        {"symbol": "JS", "date": "2024-03-04", "open": "10.00", "high": "10.50", "low": "9.80", "close": "10.20", "volume": 1200},
        {"symbol": "JS", "date": "2024-03-05", "open": 10.2, "high": 10.9, "low": 10.1, "close": 10.8, "volume": 900, "factor": "0.5"}
    ]"#;
    let bars: Vec<Ohlc> = serde_json::from_str(json).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].factor(), dec!(0.5));
    assert_eq!(bars[1].close(), dec!(10.8));

    let invalid = r#"{"symbol": "JS", "date": "2024-03-04", "open": "11", "high": "10.5", "low": "9.8", "close": "10", "volume": 1}"#;
    assert!(serde_json::from_str::<Ohlc>(invalid).is_err());

    let chart = ChartBuilder::new(ChartInfo::new("JS", Interval::Daily), bars)
        .prologue_length(0)
        .build()
        .unwrap();
    assert_eq!(chart.average_volume(), &[1200, 1050]);
}

#[test]
fn test_chart_span_over_built_chart() {
    let chart = ChartBuilder::new(ChartInfo::new("WAVE", Interval::Daily), trading_days(30))
        .trend(Trend::parse("E5C").unwrap())
        .build()
        .unwrap();
    let span = chart.span(10, 20).unwrap();
    assert_eq!(span.len(), 10);
    assert_eq!(span.trend_values(), &chart.trend_values()[10..20]);
    assert_eq!(span.info().code, "WAVE");
}
