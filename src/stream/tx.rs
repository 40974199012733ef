use std::thread;
use std::time::{Duration, Instant};

use num_complex::Complex;
use tracing::{debug, error};

use super::{Opened, disable_channels, open};
use crate::StreamFlags;
use crate::config::StreamArgs;
use crate::convert;
use crate::device::{Device, DeviceError, Direction, MetaFlags, Metadata};
use crate::error::{Result, StreamError};
use crate::format::{SampleFormat, StreamFormat, StreamSample};
use crate::time::{ns_to_ticks, ticks_to_ns};
use crate::tx_burst::{TxBurst, TxEvent};

/// Longest single sleep while polling for status events
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timeout for the zero-length burst terminator sent on deactivation
const BURST_END_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    /// Samples consumed from each channel buffer
    pub samples: usize,
    /// Flags as applied; `END_BURST` is dropped when the write was clipped
    pub flags: StreamFlags,
}

/// Transmit stream session
pub struct TxStream<D: Device> {
    device: D,
    opened: Opened,
    conv_buf: Vec<i16>,
    burst: TxBurst,
}

impl<D: Device> TxStream<D> {
    /// Configure `device` for transmitting and enable `channels`.
    pub fn setup(device: D, format: &str, channels: &[usize], args: &StreamArgs) -> Result<Self> {
        let opened = open(&device, Direction::Tx, format, channels, args)?;
        let conv_buf = opened.conversion_buffer();
        Ok(Self {
            device,
            opened,
            conv_buf,
            burst: TxBurst::new(),
        })
    }

    /// Largest number of samples per channel sent by one write
    pub fn mtu(&self) -> usize {
        self.opened.buffer_size
    }

    pub fn channels(&self) -> &[usize] {
        &self.opened.channels
    }

    pub fn format(&self) -> StreamFormat {
        self.opened.format
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.opened.sample_format
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn in_burst(&self) -> bool {
        self.burst.in_burst()
    }

    /// Status events not yet collected by [`TxStream::read_status`]
    pub fn pending_events(&self) -> usize {
        self.burst.pending()
    }

    fn rate(&self) -> f64 {
        self.device.sample_rate(Direction::Tx)
    }

    /// Bursts are driven by writes; only empty flags are accepted
    pub fn activate(
        &mut self,
        flags: StreamFlags,
        _time_ns: i64,
        _num_elems: usize,
    ) -> std::result::Result<(), StreamError> {
        if !flags.is_empty() {
            return Err(StreamError::NotSupported);
        }
        Ok(())
    }

    /// End an open burst with a single zero sample, best effort
    pub fn deactivate(&mut self, flags: StreamFlags) -> std::result::Result<(), StreamError> {
        if !flags.is_empty() {
            return Err(StreamError::NotSupported);
        }
        if self.burst.close() {
            let mut md = Metadata {
                flags: MetaFlags::TX_BURST_END,
                ..Default::default()
            };
            self.conv_buf[..2].fill(0);
            if let Err(e) = self
                .device
                .sync_tx(&self.conv_buf, 1, &mut md, BURST_END_TIMEOUT)
            {
                debug!("burst terminator failed: {}", e);
            }
        }
        Ok(())
    }

    /// Transmit from one buffer per channel.
    ///
    /// Writes at most `mtu` samples per channel. If the buffers hold more,
    /// the write is clipped and `END_BURST` is removed from the flags, since
    /// the burst's last sample is not part of it.
    pub fn write<T: StreamSample>(
        &mut self,
        buffs: &[&[Complex<T>]],
        mut flags: StreamFlags,
        time_ns: i64,
        timeout: Duration,
    ) -> std::result::Result<WriteResult, StreamError> {
        let nchan = self.opened.channels.len();
        if T::FORMAT != self.opened.format || buffs.len() != nchan {
            debug!(
                "write() with {} {} buffers on a {} x{} stream",
                buffs.len(),
                T::FORMAT,
                self.opened.format,
                nchan
            );
            return Err(StreamError::NotSupported);
        }

        let requested = buffs.iter().map(|b| b.len()).min().unwrap_or(0);
        if requested > self.opened.buffer_size {
            flags.remove(StreamFlags::END_BURST);
        }
        let num_elems = requested.min(self.opened.buffer_size);
        let end_burst = flags.contains(StreamFlags::END_BURST);

        let rate = self.rate();
        let time_ticks = flags
            .contains(StreamFlags::HAS_TIME)
            .then(|| ns_to_ticks(time_ns, rate).max(0) as u64);

        let device = &self.device;
        let mut md = self
            .burst
            .begin(time_ticks, end_burst, || device.timestamp(Direction::Tx))
            .map_err(|e| {
                error!("timestamp() returned {}", e);
                StreamError::Stream
            })?;

        let direct = if self.opened.passthrough() {
            T::as_native(&buffs[0][..num_elems])
        } else {
            None
        };
        let count = num_elems * nchan;
        let ret = match direct {
            Some(words) => self.device.sync_tx(words, count, &mut md, timeout),
            None => {
                convert::app_to_native(
                    buffs,
                    self.opened.sample_format,
                    &mut self.conv_buf,
                    num_elems,
                );
                self.device.sync_tx(&self.conv_buf, count, &mut md, timeout)
            }
        };

        if let Err(e) = ret {
            if !matches!(e, DeviceError::Timeout | DeviceError::TimePast) {
                error!("sync_tx() returned {}", e);
            }
            return Err(e.into());
        }

        self.burst.finish(num_elems, md.status, end_burst, |ticks| {
            ticks_to_ns(ticks as i64, rate)
        });

        Ok(WriteResult {
            samples: num_elems,
            flags,
        })
    }

    /// Current device time on the transmit clock
    fn hardware_time_ns(&self) -> std::result::Result<i64, StreamError> {
        let ticks = self.device.timestamp(Direction::Tx).map_err(|e| {
            error!("timestamp() returned {}", e);
            StreamError::Stream
        })?;
        Ok(ticks_to_ns(ticks as i64, self.rate()))
    }

    /// Wait up to `timeout` for the oldest status event to become reportable.
    ///
    /// Events without a time are reported at once; timed events (burst ends)
    /// once the device clock has passed them. The device offers no
    /// notification, so this polls at most every millisecond.
    pub fn read_status(&mut self, timeout: Duration) -> std::result::Result<TxEvent, StreamError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(ev) = self.burst.front() {
                if !ev.has_time() || ev.time_ns < self.hardware_time_ns()? {
                    break;
                }
            }

            let left = deadline.saturating_duration_since(Instant::now());
            thread::sleep(left.min(STATUS_POLL_INTERVAL));

            if Instant::now() >= deadline {
                return Err(StreamError::Timeout);
            }
        }
        self.burst.pop().ok_or(StreamError::Timeout)
    }

    /// Disable the stream's channels and release the conversion buffer
    pub fn close(mut self) -> Result<()> {
        let channels = std::mem::take(&mut self.opened.channels);
        disable_channels(&self.device, Direction::Tx, &channels)
    }
}

impl<D: Device> Drop for TxStream<D> {
    fn drop(&mut self) {
        if self.opened.channels.is_empty() {
            return;
        }
        if let Err(e) = disable_channels(&self.device, Direction::Tx, &self.opened.channels) {
            debug!("Failed to disable TX channels on drop: {}", e);
        }
    }
}
