//! Cache tiers: data volatility classes that determine TTL.
//!
//! TTLs are fixed per tier, not caller-chosen; a capability declares its
//! tier at registration and every cached response for it inherits that
//! tier's freshness window.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Volatility class of a capability's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Current sensor data; changes continuously
    LiveReading,

    /// Predictions; change slowly
    Forecast,

    /// Immutable or slow-changing reference data
    Historical,

    /// Expensive, rarely-changing document/research lookups
    Research,
}

impl CacheTier {
    /// Default freshness window for this tier.
    ///
    /// Tunable via [`TierTtls`]; these are the shipped defaults.
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheTier::LiveReading => Duration::from_secs(5 * 60),
            CacheTier::Forecast => Duration::from_secs(30 * 60),
            CacheTier::Historical => Duration::from_secs(24 * 60 * 60),
            CacheTier::Research => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheTier::LiveReading => "live_reading",
            CacheTier::Forecast => "forecast",
            CacheTier::Historical => "historical",
            CacheTier::Research => "research",
        };
        write!(f, "{}", s)
    }
}

/// Per-tier TTL overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTtls {
    /// TTL for [`CacheTier::LiveReading`]
    #[serde(with = "crate::config::duration_str")]
    pub live_reading: Duration,

    /// TTL for [`CacheTier::Forecast`]
    #[serde(with = "crate::config::duration_str")]
    pub forecast: Duration,

    /// TTL for [`CacheTier::Historical`]
    #[serde(with = "crate::config::duration_str")]
    pub historical: Duration,

    /// TTL for [`CacheTier::Research`]
    #[serde(with = "crate::config::duration_str")]
    pub research: Duration,
}

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            live_reading: CacheTier::LiveReading.default_ttl(),
            forecast: CacheTier::Forecast.default_ttl(),
            historical: CacheTier::Historical.default_ttl(),
            research: CacheTier::Research.default_ttl(),
        }
    }
}

impl TierTtls {
    /// TTL for the given tier.
    pub fn ttl(&self, tier: CacheTier) -> Duration {
        match tier {
            CacheTier::LiveReading => self.live_reading,
            CacheTier::Forecast => self.forecast,
            CacheTier::Historical => self.historical,
            CacheTier::Research => self.research,
        }
    }
}
