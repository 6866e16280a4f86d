//! Tunables for slice sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_SLICE_SIZE;

/// How a resumed download works out which slices it still needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Stop scanning once every present slice has been seen and mark the
    /// rest as an open tail.
    #[default]
    Fast,
    /// Check every index and list each missing one explicitly.
    Exact,
}

/// Concurrency and time limits for one transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Slice operations allowed in flight at once.
    pub max_in_flight: usize,
    /// Capacity of the retry queue.
    pub retry_queue: usize,
    /// Wall-clock budget for the whole session.
    #[serde(rename = "deadline_secs", with = "secs")]
    pub deadline: Duration,
    /// Pause before a failed slice is queued again.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            retry_queue: 100,
            deadline: Duration::from_secs(300),
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Settings shared by upload and download sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Slice size in bytes for new upload sessions.
    pub slice_size: u64,
    pub reconcile: ReconcileMode,
    pub upload: EngineLimits,
    pub download: EngineLimits,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            slice_size: DEFAULT_SLICE_SIZE,
            reconcile: ReconcileMode::default(),
            upload: EngineLimits::default(),
            download: EngineLimits::default(),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
