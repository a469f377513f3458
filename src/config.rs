//! Demo / embedding configuration with environment overrides.
//!
//! | variable             | default | meaning                                |
//! |----------------------|---------|----------------------------------------|
//! | `RING_CAPACITY`      | 1024    | ring slots                             |
//! | `RING_MESSAGES`      | 1000000 | commands pushed by the demo producer   |
//! | `RING_PRODUCER_CORE` | unset   | CPU core for the producer thread       |
//! | `RING_CONSUMER_CORE` | unset   | CPU core for the consumer thread       |

use crate::error::{ConfigError, QueueError};

pub const CAPACITY_VAR: &str = "RING_CAPACITY";
pub const MESSAGES_VAR: &str = "RING_MESSAGES";
pub const PRODUCER_CORE_VAR: &str = "RING_PRODUCER_CORE";
pub const CONSUMER_CORE_VAR: &str = "RING_CONSUMER_CORE";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingConfig {
    pub capacity: usize,
    pub messages: u64,
    pub producer_core: Option<usize>,
    pub consumer_core: Option<usize>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            messages: 1_000_000,
            producer_core: None,
            consumer_core: None,
        }
    }
}

impl RingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(CAPACITY_VAR) {
            cfg.capacity = parse_capacity(CAPACITY_VAR, &raw)?;
        }
        if let Some(raw) = lookup(MESSAGES_VAR) {
            cfg.messages = parse_int(MESSAGES_VAR, &raw)?;
        }
        if let Some(raw) = lookup(PRODUCER_CORE_VAR) {
            cfg.producer_core = Some(parse_int(PRODUCER_CORE_VAR, &raw)?);
        }
        if let Some(raw) = lookup(CONSUMER_CORE_VAR) {
            cfg.consumer_core = Some(parse_int(CONSUMER_CORE_VAR, &raw)?);
        }
        Ok(cfg)
    }
}

fn parse_int<N: core::str::FromStr>(var: &'static str, raw: &str) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse {
        var,
        value: raw.to_owned(),
    })
}

/// Signed parse so a negative capacity is reported as such rather than as
/// a generic parse failure.
fn parse_capacity(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let requested: i128 = parse_int(var, raw)?;
    usize::try_from(requested).map_err(|_| ConfigError::Capacity {
        var,
        source: QueueError::InvalidCapacity { requested },
    })
}
