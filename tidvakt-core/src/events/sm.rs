//! State machine events.

/// First signal code available to applications.
pub const USER_START: u16 = 16;

/// What happened, from a state machine's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    Init,
    Entry,
    Exit,
    Tick,
    /// Application signal `n`, numbered from [`USER_START`].
    User(u8),
}

impl Signal {
    pub const fn code(self) -> u16 {
        match self {
            Self::Init => 0,
            Self::Entry => 1,
            Self::Exit => 2,
            Self::Tick => 3,
            Self::User(n) => USER_START + n as u16,
        }
    }
}

/// Inline event payload. Never heap-backed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SmData {
    #[default]
    None,
    U32(u32),
    I32(i32),
    /// Opaque handle owned by the application.
    Token(usize),
    Bytes([u8; 8]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmEvent {
    pub signal: Signal,
    /// Overwritten with the current tick on dispatch.
    pub timestamp: u32,
    pub data: SmData,
}

impl SmEvent {
    pub const fn new(signal: Signal) -> Self {
        Self {
            signal,
            timestamp: 0,
            data: SmData::None,
        }
    }

    pub const fn with_data(signal: Signal, data: SmData) -> Self {
        Self {
            signal,
            timestamp: 0,
            data,
        }
    }

    pub(crate) const fn stamped(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }
}
