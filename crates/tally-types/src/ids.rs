//! Time-ordered event identifiers.
//!
//! An [`EventId`] packs the wall-clock millisecond into the high bits and an
//! intra-millisecond counter into the low [`SEQUENCE_BITS`] bits, then renders
//! the result as fixed-width base-36. Fixed width makes lexical order equal
//! numeric order, so identifiers sort by insertion time as plain strings.
//!
//! A process-wide atomic holds the last issued value. Every call returns
//! something strictly greater, even when many calls land in the same
//! millisecond or the clock steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Low bits reserved for the intra-millisecond counter.
pub const SEQUENCE_BITS: u32 = 20;

/// Rendered length of every identifier.
pub const ENCODED_LEN: usize = 13;

const RADIX: u64 = 36;

static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Unique, strictly increasing identifier for an event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventId(pub String);

impl EventId {
    /// Issue a new identifier greater than every identifier issued before it
    /// in this process.
    pub fn generate() -> Self {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let floor = millis.saturating_mul(1 << SEQUENCE_BITS);
        let previous = LAST_ISSUED
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(floor.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        Self(encode(floor.max(previous.saturating_add(1))))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Render `value` as zero-padded lowercase base-36.
fn encode(mut value: u64) -> String {
    let mut digits = ['0'; ENCODED_LEN];
    for slot in digits.iter_mut().rev() {
        let digit = u32::try_from(value % RADIX).unwrap_or(0);
        *slot = char::from_digit(digit, 36).unwrap_or('0');
        value /= RADIX;
    }
    digits.iter().collect()
}
