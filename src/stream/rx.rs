use std::time::Duration;

use num_complex::Complex;
use tracing::{debug, error};

use super::{Opened, disable_channels, open};
use crate::StreamFlags;
use crate::config::StreamArgs;
use crate::convert;
use crate::device::{Device, DeviceError, Direction, MetaFlags, MetaStatus, Metadata};
use crate::error::{Result, StreamError};
use crate::format::{SampleFormat, StreamFormat, StreamSample};
use crate::rx_command::{RxCommand, RxCommandQueue};
use crate::time::{min_rx_timeout, ns_to_ticks, ticks_to_ns};

/// Outcome of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Samples written to each channel buffer
    pub samples: usize,
    /// Always carries `HAS_TIME`, plus `USER_FLAG0/1` for hardware status bits
    pub flags: StreamFlags,
    /// Time of the first sample
    pub time_ns: i64,
}

/// Receive stream session
pub struct RxStream<D: Device> {
    device: D,
    opened: Opened,
    conv_buf: Vec<i16>,
    commands: RxCommandQueue,
    overflow: bool,
    next_ticks: u64,
}

impl<D: Device> RxStream<D> {
    /// Configure `device` for receiving and enable `channels`.
    pub fn setup(device: D, format: &str, channels: &[usize], args: &StreamArgs) -> Result<Self> {
        let opened = open(&device, Direction::Rx, format, channels, args)?;
        let conv_buf = opened.conversion_buffer();
        Ok(Self {
            device,
            opened,
            conv_buf,
            commands: RxCommandQueue::new(),
            overflow: false,
            next_ticks: 0,
        })
    }

    /// Largest number of samples per channel returned by one read
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

    /// Commands still waiting to be served
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Time of the sample expected after the last one received
    pub fn next_time_ns(&self) -> i64 {
        ticks_to_ns(self.next_ticks as i64, self.rate())
    }

    fn rate(&self) -> f64 {
        self.device.sample_rate(Direction::Rx)
    }

    /// Queue a receive command.
    ///
    /// `num_elems` of zero requests continuous streaming. With
    /// [`StreamFlags::HAS_TIME`], reception starts at `time_ns`.
    pub fn activate(
        &mut self,
        flags: StreamFlags,
        time_ns: i64,
        num_elems: usize,
    ) -> std::result::Result<(), StreamError> {
        self.commands.push(RxCommand {
            flags,
            time_ns,
            num_elems,
        });
        Ok(())
    }

    /// Drop all queued commands
    pub fn deactivate(&mut self, flags: StreamFlags) -> std::result::Result<(), StreamError> {
        if !flags.is_empty() {
            return Err(StreamError::NotSupported);
        }
        self.commands.clear();
        Ok(())
    }

    /// Receive into one buffer per channel.
    ///
    /// At most `min(buffer lengths, mtu)` samples per channel are read, fewer
    /// when the head command has fewer left.
    pub fn read<T: StreamSample>(
        &mut self,
        buffs: &mut [&mut [Complex<T>]],
        timeout: Duration,
    ) -> std::result::Result<ReadResult, StreamError> {
        let nchan = self.opened.channels.len();
        if T::FORMAT != self.opened.format || buffs.len() != nchan {
            debug!(
                "read() with {} {} buffers on a {} x{} stream",
                buffs.len(),
                T::FORMAT,
                self.opened.format,
                nchan
            );
            return Err(StreamError::NotSupported);
        }

        let requested = buffs
            .iter()
            .map(|b| b.len())
            .min()
            .unwrap_or(0)
            .min(self.opened.buffer_size);

        if self.commands.is_empty() {
            return Err(StreamError::Timeout);
        }

        if self.overflow {
            self.overflow = false;
            return Err(StreamError::Overflow {
                time_ns: self.next_time_ns(),
            });
        }

        let Some(request) = self.commands.begin(requested) else {
            return Err(StreamError::Timeout);
        };
        let num_elems = request.num_elems;

        let rate = self.rate();
        let mut md = Metadata::default();
        match request.time_ns {
            Some(time_ns) => md.timestamp = ns_to_ticks(time_ns, rate).max(0) as u64,
            None => md.flags |= MetaFlags::RX_NOW,
        }

        let timeout = timeout.max(min_rx_timeout(self.opened.buffer_size, rate));
        let count = num_elems * nchan;

        let direct = if self.opened.passthrough() {
            T::as_native_mut(&mut buffs[0][..num_elems])
        } else {
            None
        };
        let converted = direct.is_none();
        let ret = match direct {
            Some(words) => self.device.sync_rx(words, count, &mut md, timeout),
            None => self.device.sync_rx(&mut self.conv_buf, count, &mut md, timeout),
        };

        if let Err(e) = ret {
            return Err(self.fail(e));
        }

        let received = (md.actual_count / nchan).min(num_elems);

        if converted {
            convert::native_to_app(&self.conv_buf, self.opened.sample_format, buffs, received);
        }

        let mut flags = StreamFlags::HAS_TIME;
        let time_ns = ticks_to_ns(md.timestamp as i64, rate);

        if md.status.contains(MetaStatus::OVERRUN) {
            debug!("O");
            self.overflow = true;
        }
        if md.status.contains(MetaStatus::HW_MINIEXP1) {
            flags |= StreamFlags::USER_FLAG0;
        }
        if md.status.contains(MetaStatus::HW_MINIEXP2) {
            flags |= StreamFlags::USER_FLAG1;
        }

        self.commands.complete(received);
        self.next_ticks = md.timestamp + received as u64;

        Ok(ReadResult {
            samples: received,
            flags,
            time_ns,
        })
    }

    fn fail(&mut self, err: DeviceError) -> StreamError {
        match err {
            DeviceError::Timeout => StreamError::Timeout,
            DeviceError::TimePast => StreamError::TimeError,
            other => {
                if self.commands.abort() {
                    debug!("abandoned finite RX command after device error");
                }
                error!("sync_rx() returned {}", other);
                StreamError::Stream
            }
        }
    }

    /// Disable the stream's channels and release the conversion buffer
    pub fn close(mut self) -> Result<()> {
        let channels = std::mem::take(&mut self.opened.channels);
        disable_channels(&self.device, Direction::Rx, &channels)
    }
}

impl<D: Device> Drop for RxStream<D> {
    fn drop(&mut self) {
        if self.opened.channels.is_empty() {
            return;
        }
        if let Err(e) = disable_channels(&self.device, Direction::Rx, &self.opened.channels) {
            debug!("Failed to disable RX channels on drop: {}", e);
        }
    }
}
