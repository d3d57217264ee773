use thiserror::Error;

/// Rejected caller input on a command channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error("Value {value} is out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("Relay bit {0} does not exist (bank has 16 relays)")]
    InvalidRelay(u8),
}

/// Failure reported by the register transport. Never escapes the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is not open")]
    NotOpen,
    #[error("Exchange timed out")]
    Timeout,
    #[error("Bad checksum on response")]
    Checksum,
    #[error("Malformed response frame: {0}")]
    Framing(String),
    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Register {name} at index {index} is outside the {len}-register table")]
    IndexOutOfBounds {
        name: &'static str,
        index: usize,
        len: usize,
    },
    #[error("Register index {index} is bound to both {first} and {second}")]
    SlotCollision {
        index: usize,
        first: &'static str,
        second: &'static str,
    },
    #[error("Tier {name} ({start}..{end}) exceeds the {len}-register table")]
    TierOutOfBounds {
        name: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("Block {start}..{end} exceeds the {len}-register table")]
    BlockOutOfBounds { start: usize, end: usize, len: usize },
    #[error("Write tier {write} overlaps read tier {read}")]
    TierOverlap {
        write: &'static str,
        read: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
