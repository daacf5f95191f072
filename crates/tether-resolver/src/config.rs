use rand::Rng;
use std::time::Duration;
use tether_core::alias::DEFAULT_RESERVED_WORDS;
use tether_core::AliasPolicy;
use typed_builder::TypedBuilder;

/// Tunables for the resolution service.
///
/// Defaults: link entries live 25 to 35 minutes, the stats and hot-link
/// entries 30 minutes, and a hot code's counter 1 hour. Hits are flushed to the store
/// every 10 counter increments and at least every 30 seconds.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolverConfig {
    /// Lower bound of the link entry TTL.
    #[builder(default = Duration::from_secs(25 * 60))]
    pub cache_ttl_min: Duration,
    /// Upper bound of the link entry TTL.
    #[builder(default = Duration::from_secs(35 * 60))]
    pub cache_ttl_max: Duration,
    #[builder(default = Duration::from_secs(30 * 60))]
    pub stats_ttl: Duration,
    #[builder(default = Duration::from_secs(30 * 60))]
    pub hot_links_ttl: Duration,
    /// Threshold used when a hot-link query gives none, or a negative one.
    #[builder(default = 10)]
    pub default_hot_link_threshold: i64,
    /// Expiry of the per-code hit counter, set when it is first created.
    #[builder(default = Duration::from_secs(60 * 60))]
    pub counter_ttl: Duration,
    /// Pending hits for a code are flushed when its counter reaches a
    /// multiple of this value.
    #[builder(default = 10)]
    pub flush_batch: i64,
    #[builder(default = Duration::from_secs(30))]
    pub flush_interval: Duration,
    /// Hits beyond this many in flight are dropped.
    #[builder(default = 1024)]
    pub hit_channel_capacity: usize,
    #[builder(default = DEFAULT_RESERVED_WORDS.iter().map(|w| w.to_string()).collect())]
    pub reserved_words: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ResolverConfig {
    /// Draws a link entry TTL uniformly from `[cache_ttl_min, cache_ttl_max]`.
    pub fn jittered_ttl(&self) -> Duration {
        if self.cache_ttl_max <= self.cache_ttl_min {
            return self.cache_ttl_min;
        }
        rand::thread_rng().gen_range(self.cache_ttl_min..=self.cache_ttl_max)
    }

    pub fn alias_policy(&self) -> AliasPolicy {
        AliasPolicy::with_reserved_words(&self.reserved_words)
    }

    /// The threshold a hot-link query runs with: `requested` if it is given
    /// and non-negative, the configured default otherwise.
    pub fn hot_link_threshold(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(min) if min >= 0 => min,
            _ => self.default_hot_link_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ResolverConfig::default();

        assert_eq!(config.cache_ttl_min, Duration::from_secs(1500));
        assert_eq!(config.cache_ttl_max, Duration::from_secs(2100));
        assert_eq!(config.stats_ttl, Duration::from_secs(1800));
        assert_eq!(config.counter_ttl, Duration::from_secs(3600));
        assert_eq!(config.hot_links_ttl, Duration::from_secs(1800));
        assert_eq!(config.default_hot_link_threshold, 10);
        assert_eq!(config.flush_batch, 10);
        assert!(config.alias_policy().is_reserved("admin"));
    }

    #[test]
    fn jittered_ttl_stays_in_window() {
        let config = ResolverConfig::default();

        for _ in 0..1000 {
            let ttl = config.jittered_ttl();
            assert!(ttl >= config.cache_ttl_min && ttl <= config.cache_ttl_max);
        }
    }

    #[test]
    fn degenerate_window_uses_minimum() {
        let config = ResolverConfig::builder()
            .cache_ttl_min(Duration::from_secs(60))
            .cache_ttl_max(Duration::from_secs(10))
            .build();

        assert_eq!(config.jittered_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn hot_link_threshold_falls_back_to_default() {
        let config = ResolverConfig::default();

        assert_eq!(config.hot_link_threshold(None), 10);
        assert_eq!(config.hot_link_threshold(Some(-1)), 10);
        assert_eq!(config.hot_link_threshold(Some(0)), 0);
        assert_eq!(config.hot_link_threshold(Some(500)), 500);
    }

    #[test]
    fn custom_reserved_words() {
        let config = ResolverConfig::builder()
            .reserved_words(vec!["Promo".to_string()])
            .build();
        let policy = config.alias_policy();

        assert!(policy.is_reserved("promo"));
        assert!(!policy.is_reserved("admin"));
    }
}
