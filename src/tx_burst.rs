//! Transmit burst tracking
//!
//! A burst opens with the first successful write and stays open until a
//! write carrying [`StreamFlags::END_BURST`] succeeds or the stream is
//! deactivated. Conditions the caller learns about later (underruns and burst
//! completions) are queued as [`TxEvent`]s and drained by status polling.

use std::collections::VecDeque;

use crate::StreamFlags;
use crate::device::{DeviceError, MetaFlags, MetaStatus, Metadata};
use crate::error::StreamError;

/// Outcome carried by a transmit status event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEventCode {
    /// Burst completed normally
    Ok,
    /// The device ran out of samples
    Underflow,
}

impl TxEventCode {
    /// SoapySDR-compatible integer code
    pub fn code(&self) -> i32 {
        match self {
            TxEventCode::Ok => 0,
            TxEventCode::Underflow => StreamError::Underflow.code(),
        }
    }
}

/// Asynchronous transmit status event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEvent {
    pub code: TxEventCode,
    /// `END_BURST | HAS_TIME` for burst completion, empty for underflow
    pub flags: StreamFlags,
    /// Time the last sample of the burst leaves the device, if `HAS_TIME`
    pub time_ns: i64,
}

impl TxEvent {
    fn underflow() -> Self {
        Self {
            code: TxEventCode::Underflow,
            flags: StreamFlags::empty(),
            time_ns: 0,
        }
    }

    fn burst_end(time_ns: i64) -> Self {
        Self {
            code: TxEventCode::Ok,
            flags: StreamFlags::END_BURST | StreamFlags::HAS_TIME,
            time_ns,
        }
    }

    pub fn has_time(&self) -> bool {
        self.flags.contains(StreamFlags::HAS_TIME)
    }
}

#[derive(Debug, Default)]
pub struct TxBurst {
    in_burst: bool,
    next_ticks: u64,
    events: VecDeque<TxEvent>,
}

impl TxBurst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_burst(&self) -> bool {
        self.in_burst
    }

    /// Tick expected to follow the last transmitted sample
    pub fn next_ticks(&self) -> u64 {
        self.next_ticks
    }

    /// Build the metadata for the next write.
    ///
    /// `time_ticks` is the caller's explicit time, if any. `now` is only
    /// queried when a burst starts without one.
    pub fn begin<F>(
        &mut self,
        time_ticks: Option<u64>,
        end_burst: bool,
        now: F,
    ) -> Result<Metadata, DeviceError>
    where
        F: FnOnce() -> Result<u64, DeviceError>,
    {
        let mut md = Metadata::default();

        if self.in_burst {
            if let Some(ticks) = time_ticks {
                md.timestamp = ticks;
                md.flags |= MetaFlags::TX_UPDATE_TIMESTAMP;
                self.next_ticks = ticks;
            }
        } else {
            md.flags |= MetaFlags::TX_BURST_START;
            match time_ticks {
                Some(ticks) => {
                    md.timestamp = ticks;
                    self.next_ticks = ticks;
                }
                None => {
                    md.flags |= MetaFlags::TX_NOW;
                    self.next_ticks = now()?;
                }
            }
        }

        if end_burst {
            md.flags |= MetaFlags::TX_BURST_END;
        }
        Ok(md)
    }

    /// Record a successful write of `num_elems` samples.
    ///
    /// `ticks_to_ns` stamps the burst-end event with the tick that follows
    /// the final sample.
    pub fn finish<F>(&mut self, num_elems: usize, status: MetaStatus, end_burst: bool, ticks_to_ns: F)
    where
        F: FnOnce(u64) -> i64,
    {
        self.next_ticks += num_elems as u64;
        self.in_burst = true;

        if status.contains(MetaStatus::UNDERRUN) {
            tracing::debug!("U");
            self.events.push_back(TxEvent::underflow());
        }

        if end_burst {
            self.events
                .push_back(TxEvent::burst_end(ticks_to_ns(self.next_ticks)));
            self.in_burst = false;
        }
    }

    /// Force the burst closed; returns whether one was open
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.in_burst, false)
    }

    pub fn front(&self) -> Option<&TxEvent> {
        self.events.front()
    }

    pub fn pop(&mut self) -> Option<TxEvent> {
        self.events.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}
