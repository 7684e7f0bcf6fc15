//! Chart factory: configuration, feed combination, interval handling and a
//! shared chart cache.

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::NaiveDate;
use lru::LruCache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{aggregate_to, Interval},
    chart::{Chart, ChartBuilder, ChartInfo, DEFAULT_PROLOGUE_LENGTH},
    moving_average::MovingAverageKey,
    price::Ohlc,
    trend::{CombinedWeightedTrend, Trend, WeightedTrend, DEFAULT_WEIGHT},
    ChartError, Result,
};

// ============================================================
// CONFIGURATION
// ============================================================

/// One trend entry: a notation token and an optional weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSetting {
    pub notation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
}

impl TrendSetting {
    pub fn new(notation: impl Into<String>) -> Self {
        Self {
            notation: notation.into(),
            weight: None,
        }
    }

    pub fn weighted(notation: impl Into<String>, weight: Decimal) -> Self {
        Self {
            notation: notation.into(),
            weight: Some(weight),
        }
    }
}

/// Declarative chart configuration.
///
/// ```toml
/// interval = "weekly"
/// moving_averages = ["S50C", "E20M"]
/// prologue_length = 20
///
/// [[trends]]
/// notation = "S200C"
/// weight = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub interval: String,
    pub moving_averages: Vec<String>,
    pub trends: Vec<TrendSetting>,
    pub prologue_length: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Daily.label().to_string(),
            moving_averages: Vec::new(),
            trends: Vec::new(),
            prologue_length: DEFAULT_PROLOGUE_LENGTH,
        }
    }
}

impl ChartConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ChartError::InvalidConfig(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ChartError::InvalidConfig(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Requested interval. An unknown descriptor is fatal.
    pub fn interval(&self) -> Result<Interval> {
        self.interval.parse()
    }

    /// Moving-average keys; unparseable tokens are skipped.
    pub fn moving_average_keys(&self) -> Vec<MovingAverageKey> {
        self.moving_averages
            .iter()
            .filter_map(|token| match MovingAverageKey::parse(token) {
                Ok(key) => Some(key),
                Err(error) => {
                    tracing::warn!(token = %token, %error, "skipping moving average");
                    None
                }
            })
            .collect()
    }

    /// No trend, a single trend or a weighted combination, depending on how
    /// many entries survive parsing. Unparseable entries are skipped.
    pub fn build_trend(&self) -> Option<Trend> {
        let mut weighted: Vec<WeightedTrend> = self
            .trends
            .iter()
            .filter_map(|setting| {
                let parsed = Trend::parse(&setting.notation).and_then(|trend| {
                    WeightedTrend::new(trend, setting.weight.unwrap_or(DEFAULT_WEIGHT))
                });
                match parsed {
                    Ok(weighted) => Some(weighted),
                    Err(error) => {
                        tracing::warn!(token = %setting.notation, %error, "skipping trend");
                        None
                    }
                }
            })
            .collect();

        match weighted.len() {
            0 => None,
            1 => weighted.pop().map(|w| w.trend),
            _ => Some(CombinedWeightedTrend::new(weighted).into()),
        }
    }
}

// ============================================================
// INSTRUMENT & CACHE KEY
// ============================================================

/// Identity of the instrument a chart is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

impl Instrument {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source: None,
            industry: None,
            sector: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    fn chart_info(&self, interval: Interval) -> ChartInfo {
        ChartInfo {
            code: self.code.clone(),
            source: self.source.clone(),
            industry: self.industry.clone(),
            sector: self.sector.clone(),
            interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartCacheKey {
    pub source: Option<String>,
    pub code: String,
    pub industry: Option<String>,
    pub sector: Option<String>,
    /// Empty when no trend is configured
    pub trend_name: String,
    pub prologue_length: usize,
    pub interval: Interval,
}

impl ChartCacheKey {
    pub fn new(
        instrument: &Instrument,
        trend: Option<&Trend>,
        prologue_length: usize,
        interval: Interval,
    ) -> Self {
        Self {
            source: instrument.source.clone(),
            code: instrument.code.clone(),
            industry: instrument.industry.clone(),
            sector: instrument.sector.clone(),
            trend_name: trend.map(Trend::name).unwrap_or_default(),
            prologue_length,
            interval,
        }
    }
}

// ============================================================
// CHART CACHE
// ============================================================

/// Entries expire after this long
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(capacity) => capacity,
    None => panic!("capacity must be non-zero"),
};

#[derive(Debug)]
struct CacheEntry {
    inserted: Instant,
    chart: Arc<Chart>,
}

/// Thread-safe LRU cache of built charts with a time-to-live.
///
/// Concurrent misses on the same key may each build a chart; the first one
/// inserted wins and is returned to every caller.
#[derive(Debug)]
pub struct ChartCache {
    entries: Mutex<LruCache<ChartCacheKey, CacheEntry>>,
    ttl: Duration,
}

impl Default for ChartCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl ChartCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Cached chart for `key`, if present and not expired.
    pub fn get(&self, key: &ChartCacheKey) -> Option<Arc<Chart>> {
        let mut entries = self.lock();
        fresh(&mut entries, key, self.ttl)
    }

    /// Insert `chart` unless a fresh entry already exists; returns the entry
    /// that ends up cached.
    pub fn insert(&self, key: ChartCacheKey, chart: Arc<Chart>) -> Arc<Chart> {
        let mut entries = self.lock();
        if let Some(existing) = fresh(&mut entries, &key, self.ttl) {
            return existing;
        }
        entries.put(
            key,
            CacheEntry {
                inserted: Instant::now(),
                chart: Arc::clone(&chart),
            },
        );
        chart
    }

    /// Return the cached chart or build, insert and return a new one.
    /// The lock is not held while building.
    pub fn get_or_try_insert_with<F>(&self, key: ChartCacheKey, build: F) -> Result<Arc<Chart>>
    where
        F: FnOnce() -> Result<Chart>,
    {
        if let Some(chart) = self.get(&key) {
            tracing::debug!(code = %key.code, trend = %key.trend_name, "chart cache hit");
            return Ok(chart);
        }
        tracing::debug!(code = %key.code, trend = %key.trend_name, "chart cache miss");
        let chart = Arc::new(build()?);
        Ok(self.insert(key, chart))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<ChartCacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fresh(
    entries: &mut LruCache<ChartCacheKey, CacheEntry>,
    key: &ChartCacheKey,
    ttl: Duration,
) -> Option<Arc<Chart>> {
    let found = entries
        .get(key)
        .map(|entry| (entry.inserted.elapsed() < ttl, Arc::clone(&entry.chart)));
    match found {
        Some((true, chart)) => Some(chart),
        Some((false, _)) => {
            entries.pop(key);
            None
        }
        None => None,
    }
}

// ============================================================
// FEED COMBINATION
// ============================================================

/// Merge several feeds of one instrument into a single date-ordered series.
///
/// Bars sharing a date are averaged field by field; volume is the ceiling of
/// the mean volume.
pub fn combine_feeds(feeds: &[Vec<Ohlc>]) -> Result<Vec<Ohlc>> {
    if let [single] = feeds {
        return Ok(single.clone());
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&Ohlc>> = BTreeMap::new();
    for bar in feeds.iter().flatten() {
        by_date.entry(bar.date()).or_default().push(bar);
    }

    let partial = by_date.values().filter(|bars| bars.len() < feeds.len()).count();
    if partial > 0 {
        tracing::warn!(
            feeds = feeds.len(),
            dates = by_date.len(),
            partial,
            "feeds disagree on trading dates"
        );
    }

    by_date.into_values().map(|bars| average_bars(&bars)).collect()
}

fn average_bars(bars: &[&Ohlc]) -> Result<Ohlc> {
    let first = bars[0];
    if bars.len() == 1 {
        return Ok(first.clone());
    }

    let count = bars.len() as u64;
    let n = Decimal::from(count);
    let mean = |price: fn(&Ohlc) -> Decimal| bars.iter().map(|b| price(b)).sum::<Decimal>() / n;
    let volume: u64 = bars.iter().map(|b| b.volume()).sum::<u64>().div_ceil(count);

    Ok(Ohlc::new(
        first.symbol(),
        first.date(),
        mean(Ohlc::open),
        mean(Ohlc::high),
        mean(Ohlc::low),
        mean(Ohlc::close),
        volume,
    )?
    .with_span(first.start(), first.end())?
    .with_factor(first.factor()))
}

// ============================================================
// FACTORY
// ============================================================

/// Builds charts from raw feeds and configuration through a shared cache.
#[derive(Debug, Clone, Default)]
pub struct ChartFactory {
    cache: Arc<ChartCache>,
}

impl ChartFactory {
    pub fn new(cache: Arc<ChartCache>) -> Self {
        Self { cache }
    }

    #[inline]
    pub fn cache(&self) -> &Arc<ChartCache> {
        &self.cache
    }

    /// Cached chart for the instrument and configuration, building it on a miss.
    pub fn create(
        &self,
        instrument: &Instrument,
        feeds: &[Vec<Ohlc>],
        config: &ChartConfig,
    ) -> Result<Arc<Chart>> {
        let requested = config.interval()?;
        let trend = config.build_trend();
        let key = ChartCacheKey::new(instrument, trend.as_ref(), config.prologue_length, requested);

        self.cache.get_or_try_insert_with(key, || {
            Self::assemble(instrument, feeds, config, requested, trend)
        })
    }

    /// Build a chart without consulting the cache.
    pub fn build(
        instrument: &Instrument,
        feeds: &[Vec<Ohlc>],
        config: &ChartConfig,
    ) -> Result<Chart> {
        Self::assemble(instrument, feeds, config, config.interval()?, config.build_trend())
    }

    fn assemble(
        instrument: &Instrument,
        feeds: &[Vec<Ohlc>],
        config: &ChartConfig,
        requested: Interval,
        trend: Option<Trend>,
    ) -> Result<Chart> {
        let bars = combine_feeds(feeds)?;
        let (bars, interval) = Self::resample(&instrument.code, bars, requested)?;

        let mut builder = ChartBuilder::new(instrument.chart_info(interval), bars)
            .moving_averages(config.moving_average_keys())
            .prologue_length(config.prologue_length);
        if let Some(trend) = trend {
            builder = builder.trend(trend);
        }
        builder.build()
    }

    /// Aggregate daily bars to a coarser requested interval. Other mismatches
    /// keep the source interval.
    fn resample(code: &str, bars: Vec<Ohlc>, requested: Interval) -> Result<(Vec<Ohlc>, Interval)> {
        let Some(source) = bars.first().map(Interval::infer) else {
            return Ok((bars, requested));
        };
        if source == requested {
            return Ok((bars, source));
        }
        if source == Interval::Daily && requested > source {
            return Ok((aggregate_to(&bars, requested)?, requested));
        }
        tracing::warn!(
            code = %code,
            source = %source,
            requested = %requested,
            "cannot resample bars to requested interval"
        );
        Ok((bars, source))
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Days};
    use rust_decimal_macros::dec;

    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn weekdays(n: usize, base: Decimal) -> Vec<Ohlc> {
        (0..)
            .map(|i| monday() + Days::new(i))
            .filter(|d| d.weekday().num_days_from_monday() < 5)
            .take(n)
            .enumerate()
            .map(|(i, d)| {
                let p = base + Decimal::from(i as u64);
                Ohlc::new("FCT", d, p, p + dec!(1), p - dec!(1), p + dec!(0.5), 100).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_config_from_toml() {
        let config = ChartConfig::from_toml_str(
            r#"
            interval = "weekly"
            moving_averages = ["S50C", "E20M"]

            [[trends]]
            notation = "S200C"
            weight = 2

            [[trends]]
            notation = "X20"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval().unwrap(), Interval::Weekly);
        assert_eq!(config.prologue_length, DEFAULT_PROLOGUE_LENGTH);
        assert_eq!(config.moving_average_keys().len(), 2);
        assert_eq!(config.trends[0].weight, Some(dec!(2)));
        assert_eq!(config.trends[1].weight, None);
        assert_eq!(config.build_trend().unwrap().name(), "S200C*2+X20*1");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ChartConfig::from_toml_str("prologue_length = \"many\""),
            Err(ChartError::InvalidConfig(_))
        ));
        let config = ChartConfig {
            interval: "hourly".into(),
            ..Default::default()
        };
        assert!(config.interval().is_err());
        let err = ChartFactory::default()
            .create(&Instrument::new("FCT"), &[weekdays(5, dec!(10))], &config)
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_tokens_are_skipped() {
        let config = ChartConfig {
            moving_averages: vec!["S5C".into(), "bogus".into(), "E3H".into()],
            trends: vec![
                TrendSetting::new("nope"),
                TrendSetting::weighted("S3C", dec!(-1)),
                TrendSetting::new("X4"),
            ],
            ..Default::default()
        };
        assert_eq!(config.moving_average_keys().len(), 2);
        // one survivor: a plain trend, not a combination
        assert!(matches!(config.build_trend(), Some(Trend::Extreme(_))));
        assert!(ChartConfig::default().build_trend().is_none());
    }

    #[test]
    fn test_combine_feeds() {
        let a = weekdays(3, dec!(10));
        let mut b = weekdays(3, dec!(12));
        b[1] = Ohlc::new("FCT", b[1].date(), dec!(13), dec!(14), dec!(12), dec!(13), 101).unwrap();
        b.pop();

        let combined = combine_feeds(&[a.clone(), b]).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined[0].open(), dec!(11));
        assert_eq!(combined[0].high(), dec!(12));
        assert_eq!(combined[0].close(), dec!(11.5));
        assert_eq!(combined[1].volume(), 101);
        // only one feed has the last date
        assert_eq!(combined[2], a[2]);
    }

    #[test]
    fn test_create_aggregates_daily_source() {
        let config = ChartConfig {
            interval: "weekly".into(),
            prologue_length: 0,
            ..Default::default()
        };
        let chart = ChartFactory::build(&Instrument::new("FCT"), &[weekdays(10, dec!(10))], &config)
            .unwrap();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart.info().interval, Interval::Weekly);
    }

    #[test]
    fn test_coarse_source_is_not_refined() {
        let bars: Vec<Ohlc> = weekdays(2, dec!(10))
            .into_iter()
            .map(|b| {
                let start = b.start();
                b.with_span(start, start + chrono::TimeDelta::days(5)).unwrap()
            })
            .collect();
        let chart = ChartFactory::build(&Instrument::new("FCT"), &[bars], &ChartConfig::default())
            .unwrap();
        assert_eq!(chart.info().interval, Interval::Weekly);
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let factory = ChartFactory::default();
        let instrument = Instrument::new("FCT").with_source("XNAS").with_sector("Tech");
        let config = ChartConfig {
            trends: vec![TrendSetting::new("S3C")],
            ..Default::default()
        };
        let feeds = [weekdays(20, dec!(10))];

        let first = factory.create(&instrument, &feeds, &config).unwrap();
        let second = factory.create(&instrument, &feeds, &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cache().len(), 1);

        let other = ChartConfig {
            prologue_length: 5,
            ..config
        };
        let third = factory.create(&instrument, &feeds, &other).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(factory.cache().len(), 2);
    }

    #[test]
    fn test_cache_expiry_and_capacity() {
        let cache = Arc::new(ChartCache::new(NonZeroUsize::new(1).unwrap(), Duration::ZERO));
        let factory = ChartFactory::new(Arc::clone(&cache));
        let feeds = [weekdays(5, dec!(10))];
        let config = ChartConfig::default();

        let first = factory.create(&Instrument::new("A"), &feeds, &config).unwrap();
        let second = factory.create(&Instrument::new("A"), &feeds, &config).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let cache = Arc::new(ChartCache::new(NonZeroUsize::new(1).unwrap(), DEFAULT_CACHE_TTL));
        let factory = ChartFactory::new(Arc::clone(&cache));
        factory.create(&Instrument::new("A"), &feeds, &config).unwrap();
        factory.create(&Instrument::new("B"), &feeds, &config).unwrap();
        assert_eq!(cache.len(), 1);
        let key = ChartCacheKey::new(
            &Instrument::new("A"),
            None,
            DEFAULT_PROLOGUE_LENGTH,
            Interval::Daily,
        );
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_concurrent_create() {
        let factory = ChartFactory::default();
        let feeds = [weekdays(30, dec!(10))];
        let config = ChartConfig::default();
        let instrument = Instrument::new("FCT");

        let charts: Vec<Arc<Chart>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| factory.create(&instrument, &feeds, &config).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(factory.cache().len(), 1);
        let cached = factory
            .cache()
            .get(&ChartCacheKey::new(&instrument, None, DEFAULT_PROLOGUE_LENGTH, Interval::Daily))
            .unwrap();
        assert!(charts.iter().all(|chart| **chart == *cached));
    }
}
