//! Capability interfaces for the integration commands (§4.6). The
//! framework specifies these traits only; concrete breaker/limiter/
//! cache/config implementations are external collaborators injected
//! via [`crate::options::ServerOptions`].

/// Detail about one registered circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerInfo {
    /// Breaker name.
    pub name: String,
    /// Current state, e.g. `"closed"`, `"open"`, `"half-open"`.
    pub state: String,
    /// Consecutive-failure count driving trip decisions.
    pub failure_count: u64,
}

/// Capability set for the `breaker` command.
pub trait BreakerRegistry: Send + Sync {
    /// All registered breaker names.
    fn list(&self) -> Vec<String>;

    /// Detail for one breaker, if it exists.
    fn get(&self, name: &str) -> Option<BreakerInfo>;

    /// Resets `name` to its closed state.
    fn reset(&self, name: &str) -> Result<(), String>;
}

/// Detail about one registered rate/concurrency limiter.
#[derive(Debug, Clone)]
pub struct LimitInfo {
    /// Limiter name.
    pub name: String,
    /// Configured limit (requests/sec, concurrent slots, etc).
    pub limit: u64,
    /// Current in-use count against that limit.
    pub in_use: u64,
}

/// Capability set for the `limit` command.
pub trait LimitRegistry: Send + Sync {
    /// All registered limiter names.
    fn list(&self) -> Vec<String>;

    /// Detail for one limiter, if it exists.
    fn get(&self, name: &str) -> Option<LimitInfo>;
}

/// Detail about one registered cache.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    /// Cache name.
    pub name: String,
    /// Cache hits observed so far.
    pub hits: u64,
    /// Cache misses observed so far.
    pub misses: u64,
    /// Current entry count.
    pub size: u64,
}

impl CacheInfo {
    /// Hit rate as a percentage: `hits/(hits+misses)*100`, or `0.0` when
    /// the denominator is zero.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Capability set for the `cache` command.
pub trait CacheRegistry: Send + Sync {
    /// All registered cache names.
    fn list(&self) -> Vec<String>;

    /// Detail for one cache, if it exists.
    fn get(&self, name: &str) -> Option<CacheInfo>;
}

/// Capability set for the `config` command. The provider alone decides
/// what, if anything, to redact; the framework never filters its
/// output.
pub trait ConfigProvider: Send + Sync {
    /// Returns the current configuration, pretty-printed.
    fn dump(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_zero_denominator() {
        let info = CacheInfo {
            name: "c".into(),
            hits: 0,
            misses: 0,
            size: 0,
        };
        assert_eq!(info.hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_computes_percentage() {
        let info = CacheInfo {
            name: "c".into(),
            hits: 3,
            misses: 1,
            size: 4,
        };
        assert_eq!(info.hit_rate(), 75.0);
    }
}
