//! Device boundary
//!
//! The streaming engine never talks to USB itself. Everything it needs from
//! the hardware goes through the [`Device`] trait: synchronous stream
//! configuration, channel enables, blocking receive/transmit of native sample
//! words with burst metadata, and the hardware tick counter.
//!
//! # Native buffers
//!
//! Sample buffers are exchanged as `i16` words. A `count` argument is the
//! number of complex samples summed over every enabled channel, interleaved
//! per sample (`ch0.re, ch0.im, ch1.re, ch1.im, ...`).
//!
//! - 16-bit wire formats use two words per complex sample.
//! - 8-bit wire formats pack one complex sample per word: the two `i8`
//!   components are stored in native byte order.

use std::time::Duration;

use bitflags::bitflags;
use thiserror::Error;

use crate::format::SampleFormat;

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host
    Rx,
    /// Host to device
    Tx,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// A single RF channel of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub direction: Direction,
    pub index: usize,
}

impl Channel {
    pub fn new(direction: Direction, index: usize) -> Self {
        Self { direction, index }
    }

    /// Hardware channel identifier (RX channels even, TX channels odd)
    pub fn id(&self) -> usize {
        match self.direction {
            Direction::Rx => self.index << 1,
            Direction::Tx => (self.index << 1) | 1,
        }
    }
}

/// Channel layout for synchronous streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    RxX1,
    RxX2,
    TxX1,
    TxX2,
}

impl ChannelLayout {
    pub fn new(direction: Direction, num_channels: usize) -> Self {
        match (direction, num_channels) {
            (Direction::Rx, 2) => ChannelLayout::RxX2,
            (Direction::Rx, _) => ChannelLayout::RxX1,
            (Direction::Tx, 2) => ChannelLayout::TxX2,
            (Direction::Tx, _) => ChannelLayout::TxX1,
        }
    }

    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::RxX1 | ChannelLayout::TxX1 => 1,
            ChannelLayout::RxX2 | ChannelLayout::TxX2 => 2,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            ChannelLayout::RxX1 | ChannelLayout::RxX2 => Direction::Rx,
            ChannelLayout::TxX1 | ChannelLayout::TxX2 => Direction::Tx,
        }
    }
}

/// Parameters for synchronous stream configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub layout: ChannelLayout,
    pub format: SampleFormat,
    /// Number of device-side buffers
    pub num_buffers: usize,
    /// Samples per buffer (multiple of 1024)
    pub buffer_size: usize,
    /// Transfers in flight
    pub num_transfers: usize,
    /// Timeout applied to the device's internal transfers
    pub timeout: Duration,
}

bitflags! {
    /// Burst directives passed with each synchronous call
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MetaFlags: u32 {
        const TX_BURST_START = 1 << 0;
        const TX_BURST_END = 1 << 1;
        const TX_NOW = 1 << 2;
        const TX_UPDATE_TIMESTAMP = 1 << 3;
        const RX_NOW = 1 << 31;
    }
}

bitflags! {
    /// Conditions reported back by the device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MetaStatus: u32 {
        const OVERRUN = 1 << 0;
        const UNDERRUN = 1 << 1;
        const HW_MINIEXP1 = 1 << 16;
        const HW_MINIEXP2 = 1 << 17;
    }
}

/// Metadata exchanged with every synchronous receive/transmit call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Hardware tick of the first sample
    pub timestamp: u64,
    pub flags: MetaFlags,
    pub status: MetaStatus,
    /// Samples actually transferred, over all channels (receive only)
    pub actual_count: usize,
}

/// Errors reported by a [`Device`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The operation did not complete before its timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The requested timestamp has already passed.
    #[error("Requested timestamp is in the past")]
    TimePast,

    /// The operation is not supported by the device.
    #[error("Operation not supported")]
    Unsupported,

    /// Any other failure, with the device's diagnostic text.
    #[error("{0}")]
    Other(String),
}

impl DeviceError {
    /// libbladeRF-compatible error code.
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::Timeout => -6,
            DeviceError::Unsupported => -8,
            DeviceError::TimePast => -14,
            DeviceError::Other(_) => -1,
        }
    }

    /// Get a human-readable name for the error code.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceError::Timeout => "BLADERF_ERR_TIMEOUT",
            DeviceError::Unsupported => "BLADERF_ERR_UNSUPPORTED",
            DeviceError::TimePast => "BLADERF_ERR_TIME_PAST",
            DeviceError::Other(_) => "BLADERF_ERR_UNEXPECTED",
        }
    }
}

/// Synchronous streaming interface of an SDR device.
///
/// Implementations must be internally synchronized: an RX session and a TX
/// session may call into the same device from two threads at once.
pub trait Device: Send + Sync {
    /// Configure a direction for synchronous streaming.
    fn sync_config(&self, config: &SyncConfig) -> Result<(), DeviceError>;

    /// Enable or disable a channel.
    fn enable_channel(&self, channel: Channel, enable: bool) -> Result<(), DeviceError>;

    /// Receive `count` samples into `samples`, blocking up to `timeout`.
    ///
    /// Unless `meta.flags` contains [`MetaFlags::RX_NOW`], reception starts at
    /// `meta.timestamp`. On return `meta.timestamp` holds the tick of the first
    /// sample, `meta.actual_count` the number of samples received and
    /// `meta.status` any overrun.
    fn sync_rx(
        &self,
        samples: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        timeout: Duration,
    ) -> Result<(), DeviceError>;

    /// Transmit `count` samples from `samples`, blocking up to `timeout`.
    ///
    /// On return `meta.status` may report an underrun.
    fn sync_tx(
        &self,
        samples: &[i16],
        count: usize,
        meta: &mut Metadata,
        timeout: Duration,
    ) -> Result<(), DeviceError>;

    /// Current hardware tick counter of a direction.
    fn timestamp(&self, direction: Direction) -> Result<u64, DeviceError>;

    /// Current sample rate of a direction in Hz.
    fn sample_rate(&self, direction: Direction) -> f64;
}

impl<D: Device + ?Sized> Device for std::sync::Arc<D> {
    fn sync_config(&self, config: &SyncConfig) -> Result<(), DeviceError> {
        (**self).sync_config(config)
    }

    fn enable_channel(&self, channel: Channel, enable: bool) -> Result<(), DeviceError> {
        (**self).enable_channel(channel, enable)
    }

    fn sync_rx(
        &self,
        samples: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        timeout: Duration,
    ) -> Result<(), DeviceError> {
        (**self).sync_rx(samples, count, meta, timeout)
    }

    fn sync_tx(
        &self,
        samples: &[i16],
        count: usize,
        meta: &mut Metadata,
        timeout: Duration,
    ) -> Result<(), DeviceError> {
        (**self).sync_tx(samples, count, meta, timeout)
    }

    fn timestamp(&self, direction: Direction) -> Result<u64, DeviceError> {
        (**self).timestamp(direction)
    }

    fn sample_rate(&self, direction: Direction) -> f64 {
        (**self).sample_rate(direction)
    }
}
