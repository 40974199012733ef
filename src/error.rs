//! Error handling for the streaming engine
//!
//! Two families of errors live here. [`Error`] is returned by operations that
//! create or tear down a stream (setup and close): those failures are fatal
//! and the stream is either never created or left closed. [`StreamError`] is
//! the per-call result of read, write and status polling: most of its variants
//! are recoverable and the caller decides whether to retry.

use thiserror::Error;

use crate::device::DeviceError;

/// A specialized Result type for setup and teardown operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and device command errors
#[derive(Debug, Error)]
pub enum Error {
    /// Channel list is not exactly `[0]`, `[1]` or `[0, 1]`
    #[error("invalid channel selection: {0:?}")]
    InvalidChannels(Vec<usize>),

    /// Unknown wire sample format name
    #[error(
        "invalid sample format: '{0}'\nValid formats: [sc16, sc16_meta, sc8, sc8_meta, sc16_packed]"
    )]
    InvalidSampleFormat(String),

    /// Unknown application stream format
    #[error("invalid stream format: {0}")]
    InvalidStreamFormat(String),

    /// A stream argument could not be parsed
    #[error("invalid stream argument {key}={value}")]
    InvalidArgument { key: String, value: String },

    /// The device rejected a configuration or enable command
    #[error("{op}() {source}")]
    Device {
        op: &'static str,
        #[source]
        source: DeviceError,
    },
}

impl Error {
    /// Wrap a device failure with the name of the failed command
    pub fn device(op: &'static str, source: DeviceError) -> Self {
        Error::Device { op, source }
    }
}

/// Result of a failed read, write or status poll
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Nothing happened before the timeout expired
    #[error("timeout")]
    Timeout,

    /// The requested timestamp is already in the past
    #[error("time error")]
    TimeError,

    /// Generic device failure during streaming
    #[error("stream error")]
    Stream,

    /// Receive data was dropped; `time_ns` marks where the gap begins
    #[error("overflow at {time_ns} ns")]
    Overflow { time_ns: i64 },

    /// Transmit data was not available in time
    #[error("underflow")]
    Underflow,

    /// Flags, direction or buffers are not supported by this stream
    #[error("not supported")]
    NotSupported,
}

impl StreamError {
    /// SoapySDR-compatible integer code
    pub fn code(&self) -> i32 {
        match self {
            StreamError::Timeout => -1,
            StreamError::Stream => -2,
            StreamError::Overflow { .. } => -4,
            StreamError::NotSupported => -5,
            StreamError::TimeError => -6,
            StreamError::Underflow => -7,
        }
    }
}

impl From<DeviceError> for StreamError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Timeout => StreamError::Timeout,
            DeviceError::TimePast => StreamError::TimeError,
            _ => StreamError::Stream,
        }
    }
}
