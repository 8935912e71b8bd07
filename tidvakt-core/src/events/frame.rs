//! Typed bus events and their fixed-width encoded form.

use std::fmt;
use std::marker::PhantomData;

use super::{EventHeader, Priority, HEADER_LEN};
use crate::config::{MAX_EVENT_SIZE, MAX_EVENT_TYPES};
use crate::error::FrameError;

/// A concrete event type that can travel over the bus.
///
/// The header is written by [`EventFrame::encode`]; implementors only deal
/// with their payload bytes.
///
/// ```
/// use tidvakt_core::events::{BusEvent, EventFrame, Priority};
///
/// struct ButtonPress {
///     pin: u8,
/// }
///
/// impl BusEvent for ButtonPress {
///     const ID: u8 = 1;
///     const PAYLOAD_LEN: usize = 1;
///
///     fn encode_payload(&self, out: &mut [u8]) {
///         out[0] = self.pin;
///     }
///
///     fn decode_payload(payload: &[u8]) -> Option<Self> {
///         Some(Self { pin: *payload.first()? })
///     }
/// }
///
/// let frame = EventFrame::encode(&ButtonPress { pin: 5 }, Priority::STANDARD);
/// assert_eq!(frame.decode::<ButtonPress>().map(|e| e.pin), Some(5));
/// ```
pub trait BusEvent: Sized {
    /// Subscriber key. Must be below [`MAX_EVENT_TYPES`].
    const ID: u8;

    /// Encoded payload length. Header plus payload must fit in [`MAX_EVENT_SIZE`].
    const PAYLOAD_LEN: usize;

    /// Writes the payload; `out` is exactly `PAYLOAD_LEN` bytes.
    fn encode_payload(&self, out: &mut [u8]);

    /// Reads the payload; `payload` is exactly `PAYLOAD_LEN` bytes.
    fn decode_payload(payload: &[u8]) -> Option<Self>;
}

struct Bounds<E>(PhantomData<E>);

impl<E: BusEvent> Bounds<E> {
    // Evaluated when `encode::<E>` is instantiated, so an oversized event type fails the build.
    const CHECK: () = {
        assert!(
            HEADER_LEN + E::PAYLOAD_LEN <= MAX_EVENT_SIZE,
            "event does not fit in a queue slot (MAX_EVENT_SIZE)"
        );
        assert!(
            (E::ID as usize) < MAX_EVENT_TYPES,
            "event id must be below MAX_EVENT_TYPES"
        );
    };
}

/// One encoded event, exactly as stored in a queue slot.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EventFrame {
    bytes: [u8; MAX_EVENT_SIZE],
    len: u8,
}

impl EventFrame {
    /// Encodes a typed event. Timestamp is left at zero until the bus stamps it.
    ///
    /// An event type that cannot fit in a queue slot is rejected at build time:
    ///
    /// ```compile_fail
    /// use tidvakt_core::events::{BusEvent, EventFrame, Priority};
    ///
    /// struct Blob([u8; 32]);
    ///
    /// impl BusEvent for Blob {
    ///     const ID: u8 = 1;
    ///     const PAYLOAD_LEN: usize = 32;
    ///
    ///     fn encode_payload(&self, out: &mut [u8]) {
    ///         out.copy_from_slice(&self.0);
    ///     }
    ///
    ///     fn decode_payload(_: &[u8]) -> Option<Self> {
    ///         None
    ///     }
    /// }
    ///
    /// let _ = EventFrame::encode(&Blob([0; 32]), Priority::LOW);
    /// ```
    pub fn encode<E: BusEvent>(event: &E, priority: Priority) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Bounds::<E>::CHECK;

        let len = HEADER_LEN + E::PAYLOAD_LEN;
        let header = EventHeader {
            id: E::ID,
            priority: priority.get(),
            size: len as u8,
            timestamp: 0,
        };

        let mut bytes = [0u8; MAX_EVENT_SIZE];
        bytes[..HEADER_LEN].copy_from_slice(&header.to_bytes());
        event.encode_payload(&mut bytes[HEADER_LEN..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// A header-only event.
    pub fn signal(id: u8, priority: Priority) -> Self {
        let mut bytes = [0u8; MAX_EVENT_SIZE];
        bytes[..HEADER_LEN].copy_from_slice(&EventHeader::new(id, priority).to_bytes());
        Self {
            bytes,
            len: HEADER_LEN as u8,
        }
    }

    /// Copies raw encoded bytes, checking only that they are a plausible length.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                len: data.len(),
                header: HEADER_LEN,
            });
        }
        if data.len() > MAX_EVENT_SIZE {
            return Err(FrameError::Oversized {
                len: data.len(),
                max: MAX_EVENT_SIZE,
            });
        }

        let mut bytes = [0u8; MAX_EVENT_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    pub(crate) fn from_parts(bytes: [u8; MAX_EVENT_SIZE], len: usize) -> Self {
        Self {
            bytes,
            len: len.min(MAX_EVENT_SIZE) as u8,
        }
    }

    pub fn header(&self) -> EventHeader {
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&self.bytes[..HEADER_LEN]);
        EventHeader::from_array(raw)
    }

    #[inline]
    pub fn id(&self) -> u8 {
        self.bytes[0]
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.bytes[1]
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.header().timestamp
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN.min(self.len())..self.len()]
    }

    /// Decodes the payload as `E` if the id matches and enough bytes are present.
    pub fn decode<E: BusEvent>(&self) -> Option<E> {
        if self.id() != E::ID {
            return None;
        }
        let payload = self.payload().get(..E::PAYLOAD_LEN)?;
        E::decode_payload(payload)
    }

    /// Writes the real encoded size and the admission tick into the header.
    pub(crate) fn stamp(&mut self, timestamp: u32) {
        self.bytes[2] = self.len;
        self.bytes[4..HEADER_LEN].copy_from_slice(&timestamp.to_le_bytes());
    }
}

impl fmt::Debug for EventFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFrame")
            .field("header", &self.header())
            .field("payload", &self.payload())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Emergency {
        source: u8,
        code: u16,
    }

    impl BusEvent for Emergency {
        const ID: u8 = 0;
        const PAYLOAD_LEN: usize = 3;

        fn encode_payload(&self, out: &mut [u8]) {
            out[0] = self.source;
            out[1..3].copy_from_slice(&self.code.to_le_bytes());
        }

        fn decode_payload(payload: &[u8]) -> Option<Self> {
            Some(Self {
                source: payload[0],
                code: u16::from_le_bytes([payload[1], payload[2]]),
            })
        }
    }

    struct Tick;

    impl BusEvent for Tick {
        const ID: u8 = 4;
        const PAYLOAD_LEN: usize = 0;

        fn encode_payload(&self, _out: &mut [u8]) {}

        fn decode_payload(_payload: &[u8]) -> Option<Self> {
            Some(Self)
        }
    }

    #[test]
    fn encode_writes_header_and_size() {
        let frame = EventFrame::encode(
            &Emergency {
                source: 2,
                code: 0x1234,
            },
            Priority::EMERGENCY,
        );
        let header = frame.header();
        assert_eq!(header.id, 0);
        assert_eq!(header.priority, 0);
        assert_eq!(header.size as usize, HEADER_LEN + 3);
        assert_eq!(frame.len(), HEADER_LEN + 3);
        assert_eq!(frame.payload(), &[2, 0x34, 0x12]);
    }

    #[test]
    fn decode_checks_event_id() {
        let frame = EventFrame::encode(&Tick, Priority::LOW);
        assert!(frame.decode::<Tick>().is_some());
        assert!(frame.decode::<Emergency>().is_none());
    }

    #[test]
    fn decode_rejects_short_payload() {
        let raw = EventHeader::new(Emergency::ID, Priority::STANDARD).to_bytes();
        let frame = EventFrame::from_bytes(&raw).unwrap();
        assert!(frame.decode::<Emergency>().is_none());
    }

    #[test]
    fn from_bytes_validates_length() {
        assert_eq!(
            EventFrame::from_bytes(&[0; 3]),
            Err(FrameError::Truncated {
                len: 3,
                header: HEADER_LEN
            })
        );
        assert_eq!(
            EventFrame::from_bytes(&[0; MAX_EVENT_SIZE + 1]),
            Err(FrameError::Oversized {
                len: MAX_EVENT_SIZE + 1,
                max: MAX_EVENT_SIZE
            })
        );
        assert!(EventFrame::from_bytes(&[0; MAX_EVENT_SIZE]).is_ok());
    }

    #[test]
    fn stamp_sets_size_and_timestamp() {
        let mut raw = [0u8; 10];
        raw[0] = 1;
        let mut frame = EventFrame::from_bytes(&raw).unwrap();
        assert_eq!(frame.header().size, 0);

        frame.stamp(0xAABB_CCDD);
        assert_eq!(frame.header().size, 10);
        assert_eq!(frame.timestamp(), 0xAABB_CCDD);
    }

    #[test]
    fn signal_frames_have_no_payload() {
        let frame = EventFrame::signal(7, Priority::STANDARD);
        assert_eq!(frame.id(), 7);
        assert_eq!(frame.priority(), 1);
        assert!(frame.payload().is_empty());
        assert!(!frame.is_empty());
    }
}
