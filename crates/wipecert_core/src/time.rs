//! Wall clock timestamps as recorded by the ledger.

use serde::{Deserialize, Serialize};

/// Unix timestamp in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create from unix seconds
    #[must_use]
    pub const fn from_secs(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Get current timestamp
    #[must_use]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(seconds)
    }

    /// Get unix seconds
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_secs(100);
        let later = Timestamp::from_secs(200);
        assert!(earlier < later);
        assert_eq!(Some(later), [earlier, later].into_iter().max());
    }

    #[test]
    fn test_timestamp_now_is_recent() {
        // 2020-01-01
        assert!(Timestamp::now().as_secs() > 1_577_836_800);
    }

    #[test]
    fn test_timestamp_serde_transparent() {
        let ts = Timestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000");
    }
}
