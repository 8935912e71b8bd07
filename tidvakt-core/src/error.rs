use thiserror::Error;

/// Coarse classification shared by every error and fault in the core.
///
/// The first four are returned to the caller; `ProtocolViolation` and
/// `Overrun` are escalated to the [`FaultHandler`](crate::port::FaultHandler).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    CapacityExceeded,
    QueueFull,
    MalformedInput,
    ProtocolViolation,
    Overrun,
}

/// Raw input that cannot be turned into an event frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("event of {len} bytes is shorter than its header ({header} bytes)")]
    Truncated { len: usize, header: usize },

    #[error("event of {len} bytes exceeds the slot size of {max} bytes")]
    Oversized { len: usize, max: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("priority level {level} out of range (levels: {levels})")]
    InvalidLevel { level: usize, levels: usize },

    #[error("empty event payload")]
    EmptyPayload,

    #[error("payload of {len} bytes exceeds the slot size of {max} bytes")]
    OversizedPayload { len: usize, max: usize },

    #[error("queue for level {level} is full")]
    QueueFull { level: usize },

    #[error("queue overflow on level {level} configured as unrecoverable")]
    Overrun { level: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter table full ({capacity} rules)")]
    CapacityExceeded { capacity: usize },

    #[error("no filter rule at index {index} (rules: {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("rule buffer of {len} bytes is not a whole number of {record}-byte records")]
    MalformedInput { len: usize, record: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("event id {0} out of range")]
    InvalidEventId(u8),

    #[error("event priority {0} out of range")]
    InvalidPriority(u8),

    #[error("subscriber table full ({capacity} entries)")]
    SubscriberTableFull { capacity: usize },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("state machine is not attached to a bus")]
    Detached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum HsmError {
    #[error("state machine depth {depth} exceeds the maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("no state installed at active depth {depth}")]
    NullHandler { depth: usize },

    #[error("transition requested without a target state")]
    NullTransition,
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. } => ErrorKind::MalformedInput,
            Self::Oversized { .. } => ErrorKind::InvalidArgument,
        }
    }
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLevel { .. } | Self::EmptyPayload | Self::OversizedPayload { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::QueueFull { .. } => ErrorKind::QueueFull,
            Self::Overrun { .. } => ErrorKind::Overrun,
        }
    }
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::InvalidIndex { .. } => ErrorKind::InvalidArgument,
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
        }
    }
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEventId(_) | Self::InvalidPriority(_) => ErrorKind::InvalidArgument,
            Self::SubscriberTableFull { .. } => ErrorKind::CapacityExceeded,
            Self::Frame(err) => err.kind(),
            Self::Queue(err) => err.kind(),
            Self::Detached => ErrorKind::ProtocolViolation,
        }
    }
}

impl HsmError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ProtocolViolation
    }
}
