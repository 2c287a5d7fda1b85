//! TTL caches for fetched widget data.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::widgets::config::CacheConfig;
use crate::widgets::types::{BankRecord, DailyForecast, StockPoint};

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

type Store<T> = Arc<DashMap<String, CacheEntry<T>>>;

/// Thread-safe cache, one map per data source.
#[derive(Clone)]
pub struct WidgetCache {
    config: CacheConfig,
    bank: Store<Vec<BankRecord>>,
    stock: Store<Vec<StockPoint>>,
    weather: Store<Vec<DailyForecast>>,
}

impl WidgetCache {
    /// Create a new cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            bank: Arc::new(DashMap::new()),
            stock: Arc::new(DashMap::new()),
            weather: Arc::new(DashMap::new()),
        }
    }

    /// Get cached bank records.
    #[must_use]
    pub fn get_bank(&self, key: &str) -> Option<Vec<BankRecord>> {
        self.get_from(&self.bank, key)
    }

    /// Cache bank records.
    pub fn set_bank(&self, key: &str, rows: &[BankRecord]) {
        self.set_in(&self.bank, key, rows.to_vec(), self.config.bank_ttl_seconds);
    }

    /// Get a cached stock series.
    #[must_use]
    pub fn get_stock(&self, key: &str) -> Option<Vec<StockPoint>> {
        self.get_from(&self.stock, key)
    }

    /// Cache a stock series.
    pub fn set_stock(&self, key: &str, points: &[StockPoint]) {
        self.set_in(
            &self.stock,
            key,
            points.to_vec(),
            self.config.stock_ttl_seconds,
        );
    }

    /// Get a cached forecast.
    #[must_use]
    pub fn get_weather(&self, key: &str) -> Option<Vec<DailyForecast>> {
        self.get_from(&self.weather, key)
    }

    /// Cache a forecast.
    pub fn set_weather(&self, key: &str, days: &[DailyForecast]) {
        self.set_in(
            &self.weather,
            key,
            days.to_vec(),
            self.config.weather_ttl_seconds,
        );
    }

    /// Clear all caches.
    pub fn clear(&self) {
        self.bank.clear();
        self.stock.clear();
        self.weather.clear();
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            bank_entries: self.bank.len(),
            stock_entries: self.stock.len(),
            weather_entries: self.weather.len(),
        }
    }

    /// Remove expired entries from all caches.
    pub fn cleanup_expired(&self) {
        cleanup_expired_from(&self.bank);
        cleanup_expired_from(&self.stock);
        cleanup_expired_from(&self.weather);
    }

    fn get_from<T: Clone>(&self, cache: &DashMap<String, CacheEntry<T>>, key: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        cache.get(key).and_then(|entry| {
            if entry.is_expired() {
                drop(entry);
                cache.remove(key);
                None
            } else {
                Some(entry.data.clone())
            }
        })
    }

    fn set_in<T: Clone>(
        &self,
        cache: &DashMap<String, CacheEntry<T>>,
        key: &str,
        data: T,
        ttl_seconds: u64,
    ) {
        if !self.config.enabled {
            return;
        }

        self.enforce_max_entries(cache);
        cache.insert(
            key.to_string(),
            CacheEntry::new(data, Duration::from_secs(ttl_seconds)),
        );
    }

    /// Enforce the per-source share of `max_entries`.
    fn enforce_max_entries<T: Clone>(&self, cache: &DashMap<String, CacheEntry<T>>) {
        let max_per_cache = (self.config.max_entries / 3).max(1);
        if cache.len() >= max_per_cache {
            cleanup_expired_from(cache);

            if cache.len() >= max_per_cache {
                let to_remove = cache.len() - max_per_cache + 1;
                let keys: Vec<String> = cache
                    .iter()
                    .take(to_remove)
                    .map(|entry| entry.key().clone())
                    .collect();
                for key in keys {
                    cache.remove(&key);
                }
            }
        }
    }
}

fn cleanup_expired_from<T: Clone>(cache: &DashMap<String, CacheEntry<T>>) {
    cache.retain(|_, entry| !entry.is_expired());
}

/// Cache statistics.
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    /// Number of bank entries.
    pub bank_entries: usize,
    /// Number of stock entries.
    pub stock_entries: usize,
    /// Number of weather entries.
    pub weather_entries: usize,
}

impl CacheStats {
    /// Total number of entries across all caches.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.bank_entries + self.stock_entries + self.weather_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(close: f64) -> StockPoint {
        StockPoint {
            date: "2025-01-06 14:30".to_string(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            adjclose: None,
        }
    }

    #[test]
    fn stores_and_returns_series() {
        let cache = WidgetCache::new(CacheConfig::default());
        cache.set_stock("AAPL:1d", &[point(1.0), point(2.0)]);
        assert_eq!(cache.get_stock("AAPL:1d").map(|p| p.len()), Some(2));
        assert_eq!(cache.stats().total(), 1);
    }

    #[test]
    fn zero_ttl_entries_expire() {
        let config = CacheConfig {
            stock_ttl_seconds: 0,
            ..CacheConfig::default()
        };
        let cache = WidgetCache::new(config);
        cache.set_stock("AAPL:1d", &[point(1.0)]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_stock("AAPL:1d").is_none());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = WidgetCache::new(config);
        cache.set_weather("1,2", &[]);
        assert!(cache.get_weather("1,2").is_none());
        assert_eq!(cache.stats().total(), 0);
    }

    #[test]
    fn size_limit_evicts() {
        let config = CacheConfig {
            max_entries: 6,
            ..CacheConfig::default()
        };
        let cache = WidgetCache::new(config);
        for i in 0..5 {
            cache.set_bank(&format!("k{i}"), &[]);
        }
        assert!(cache.stats().bank_entries <= 2);
    }
}
