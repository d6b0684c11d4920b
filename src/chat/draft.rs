//! Locally generated draft identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Draft ids are reduced into `1..=DRAFT_ID_RANGE`
pub const DRAFT_ID_RANGE: u64 = i32::MAX as u64;

/// Identifier of a platform-side draft message.
///
/// Unique enough within one deployment's concurrency window, not globally unique.
/// Two in-flight requests that draw the same id overwrite each other's draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(u64);

impl DraftId {
    /// Combine the current time with a random component
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::from_parts(nanos, rand::random::<u64>())
    }

    pub fn from_parts(timestamp: u64, entropy: u64) -> Self {
        // Zero is not a valid draft id on Telegram
        Self((timestamp ^ entropy) % DRAFT_ID_RANGE + 1)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
