//! ## tidvakt-core::events
//! **Event data model shared by producers, the bus and state machines**
//!
//! Bus events travel as an 8-byte [`EventHeader`] followed by a small
//! payload, packed into a fixed-width [`EventFrame`]. State machines consume
//! their own [`SmEvent`] type with an inline payload.
//!
//! Header layout (little endian):
//!
//! | byte | field       |
//! |------|-------------|
//! | 0    | `id`        |
//! | 1    | `priority`  |
//! | 2    | `size`      |
//! | 3    | reserved    |
//! | 4..8 | `timestamp` |

pub mod frame;
pub mod sm;

pub use frame::{BusEvent, EventFrame};
pub use sm::{Signal, SmData, SmEvent, USER_START};

use static_assertions::const_assert;

use crate::config::MAX_EVENT_SIZE;

pub const HEADER_LEN: usize = 8;

/// Largest payload that fits in a queue slot.
pub const MAX_PAYLOAD_LEN: usize = MAX_EVENT_SIZE - HEADER_LEN;

const_assert!(MAX_EVENT_SIZE >= HEADER_LEN);
const_assert!(MAX_EVENT_SIZE <= u8::MAX as usize);

/// Event priority; numerically smaller is more urgent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const EMERGENCY: Self = Self(0);
    pub const STANDARD: Self = Self(1);
    pub const LOW: Self = Self(2);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Queue index for this priority.
    pub const fn level(self) -> usize {
        self.0 as usize
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Common header carried by every bus event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventHeader {
    pub id: u8,
    pub priority: u8,
    /// Encoded length of the whole event (header + payload).
    pub size: u8,
    /// Tick at which the bus accepted the event.
    pub timestamp: u32,
}

impl EventHeader {
    pub const fn new(id: u8, priority: Priority) -> Self {
        Self {
            id,
            priority: priority.get(),
            size: HEADER_LEN as u8,
            timestamp: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let ts = self.timestamp.to_le_bytes();
        [
            self.id,
            self.priority,
            self.size,
            0,
            ts[0],
            ts[1],
            ts[2],
            ts[3],
        ]
    }

    pub fn from_array(raw: [u8; HEADER_LEN]) -> Self {
        Self {
            id: raw[0],
            priority: raw[1],
            size: raw[2],
            timestamp: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }

    /// Parses the header at the start of `bytes`, if there are enough of them.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
        Some(Self::from_array(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let header = EventHeader {
            id: 3,
            priority: 1,
            size: 12,
            timestamp: 0x0403_0201,
        };
        assert_eq!(header.to_bytes(), [3, 1, 12, 0, 1, 2, 3, 4]);
        assert_eq!(EventHeader::from_bytes(&header.to_bytes()), Some(header));
    }

    #[test]
    fn short_input_has_no_header() {
        assert_eq!(EventHeader::from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn priority_levels() {
        assert!(Priority::EMERGENCY < Priority::STANDARD);
        assert_eq!(Priority::LOW.level(), 2);
        assert_eq!(Priority::from(1), Priority::STANDARD);
    }
}
