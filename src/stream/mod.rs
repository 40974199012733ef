//! Stream sessions
//!
//! A session owns everything one opened stream needs: the device handle, the
//! enabled channels, the conversion buffer and the per-direction state
//! ([`RxCommandQueue`](crate::rx_command::RxCommandQueue) for receive,
//! [`TxBurst`](crate::tx_burst::TxBurst) for transmit). An RX session and a
//! TX session can share one device through `Arc` and run on separate threads.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::StreamFlags;
use crate::config::StreamArgs;
use crate::device::{Channel, ChannelLayout, Device, Direction};
use crate::error::{Error, Result, StreamError};
use crate::format::{SampleFormat, StreamFormat};
use crate::tx_burst::TxEvent;

mod rx;
mod tx;

pub use rx::{ReadResult, RxStream};
pub use tx::{TxStream, WriteResult};

/// Everything setup decided, shared by both directions
#[derive(Debug)]
pub(crate) struct Opened {
    pub channels: Vec<usize>,
    pub format: StreamFormat,
    pub sample_format: SampleFormat,
    pub buffer_size: usize,
}

impl Opened {
    /// Zeroed scratch buffer large enough for one full call
    pub fn conversion_buffer(&self) -> Vec<i16> {
        vec![0; self.buffer_size * 2 * self.channels.len()]
    }

    /// Whether application buffers can be handed to the device as-is
    pub fn passthrough(&self) -> bool {
        self.channels.len() == 1
            && self.format == StreamFormat::Cs16
            && !self.sample_format.is_8bit()
    }
}

/// Check the channel list, returning it with the `[0]` default applied
pub(crate) fn validate_channels(channels: &[usize]) -> Result<Vec<usize>> {
    match channels {
        [] => Ok(vec![0]),
        [0] | [1] | [0, 1] => Ok(channels.to_vec()),
        _ => Err(Error::InvalidChannels(channels.to_vec())),
    }
}

/// Validate the request, configure the device and enable the channels
pub(crate) fn open<D: Device>(
    device: &D,
    direction: Direction,
    format: &str,
    channels: &[usize],
    args: &StreamArgs,
) -> Result<Opened> {
    let channels = validate_channels(channels)?;
    let sample_format = args.format;
    info!("Sample format: {}", sample_format);

    let format: StreamFormat = format.parse()?;

    let config = args.sync_config(ChannelLayout::new(direction, channels.len()));
    if let Err(e) = device.sync_config(&config) {
        error!("sync_config() returned {}", e.code());
        return Err(Error::device("setupStream", e));
    }

    for (n, &ch) in channels.iter().enumerate() {
        if let Err(e) = device.enable_channel(Channel::new(direction, ch), true) {
            error!("enable_channel(true) returned {}", e.code());
            // leave nothing half enabled
            if let Err(e) = disable_channels(device, direction, &channels[..n]) {
                debug!("rollback after failed enable: {}", e);
            }
            return Err(Error::device("setupStream", e));
        }
    }

    Ok(Opened {
        channels,
        format,
        sample_format,
        buffer_size: config.buffer_size,
    })
}

/// Disable every channel, stopping at the first failure
pub(crate) fn disable_channels<D: Device>(
    device: &D,
    direction: Direction,
    channels: &[usize],
) -> Result<()> {
    for &ch in channels {
        if let Err(e) = device.enable_channel(Channel::new(direction, ch), false) {
            error!("enable_channel(false) returned {}", e);
            return Err(Error::device("closeStream", e));
        }
    }
    Ok(())
}

/// A stream of either direction
pub enum Stream<D: Device> {
    Rx(RxStream<D>),
    Tx(TxStream<D>),
}

impl<D: Device> Stream<D> {
    /// Set up a stream in `direction`.
    ///
    /// `format` is the application format (`"CS16"` or `"CF32"`), `channels`
    /// one of `[0]`, `[1]` or `[0, 1]` (empty means `[0]`).
    pub fn setup(
        device: D,
        direction: Direction,
        format: &str,
        channels: &[usize],
        args: &StreamArgs,
    ) -> Result<Self> {
        Ok(match direction {
            Direction::Rx => Stream::Rx(RxStream::setup(device, format, channels, args)?),
            Direction::Tx => Stream::Tx(TxStream::setup(device, format, channels, args)?),
        })
    }

    pub fn direction(&self) -> Direction {
        match self {
            Stream::Rx(_) => Direction::Rx,
            Stream::Tx(_) => Direction::Tx,
        }
    }

    /// Largest number of samples per channel moved by one call
    pub fn mtu(&self) -> usize {
        match self {
            Stream::Rx(s) => s.mtu(),
            Stream::Tx(s) => s.mtu(),
        }
    }

    pub fn activate(
        &mut self,
        flags: StreamFlags,
        time_ns: i64,
        num_elems: usize,
    ) -> std::result::Result<(), StreamError> {
        match self {
            Stream::Rx(s) => s.activate(flags, time_ns, num_elems),
            Stream::Tx(s) => s.activate(flags, time_ns, num_elems),
        }
    }

    pub fn deactivate(&mut self, flags: StreamFlags) -> std::result::Result<(), StreamError> {
        match self {
            Stream::Rx(s) => s.deactivate(flags),
            Stream::Tx(s) => s.deactivate(flags),
        }
    }

    /// Poll for a transmit status event; receive streams have none
    pub fn read_status(&mut self, timeout: Duration) -> std::result::Result<TxEvent, StreamError> {
        match self {
            Stream::Rx(_) => Err(StreamError::NotSupported),
            Stream::Tx(s) => s.read_status(timeout),
        }
    }

    pub fn as_rx_mut(&mut self) -> Option<&mut RxStream<D>> {
        match self {
            Stream::Rx(s) => Some(s),
            Stream::Tx(_) => None,
        }
    }

    pub fn as_tx_mut(&mut self) -> Option<&mut TxStream<D>> {
        match self {
            Stream::Rx(_) => None,
            Stream::Tx(s) => Some(s),
        }
    }

    /// Disable the stream's channels and release its buffers
    pub fn close(self) -> Result<()> {
        match self {
            Stream::Rx(s) => s.close(),
            Stream::Tx(s) => s.close(),
        }
    }
}
