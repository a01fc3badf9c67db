use thiserror::Error;

use crate::reading::Channel;

#[derive(Debug, Error)]
pub enum VitalsError {
    #[error("history capacity must be at least 1")]
    ZeroCapacity,
    #[error("{} is not finite", .channel.key())]
    NonFinite { channel: Channel },
    #[error("timestamp is not finite")]
    NonFiniteTimestamp,
    #[error("{} value {value} is outside the sampling range", .channel.key())]
    OutOfRange { channel: Channel, value: f64 },
    #[error("invalid sampling range for {}: [{min}, {max}]", .channel.key())]
    InvalidRange { channel: Channel, min: f64, max: f64 },
    #[error("system clock is before the Unix epoch")]
    Clock,
    #[error("reading source is exhausted")]
    SourceExhausted,
    #[error("no readings found in input")]
    EmptyInput,
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
