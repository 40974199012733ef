//! Simulated device
//!
//! [`SimDevice`] implements [`Device`] entirely in memory. It keeps a tick
//! counter per direction, fills receive buffers from a repeating pattern and
//! logs every transmit call. Outcomes of upcoming calls can be scripted
//! (overruns, underruns, short transfers, errors), which makes it the
//! backbone of the crate's tests and a stand-in for hardware in
//! applications.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bladerf_stream::sim::SimDevice;
//! use bladerf_stream::{RxStream, StreamArgs, StreamFlags};
//! use num_complex::Complex;
//!
//! let device = Arc::new(SimDevice::new(1e6));
//! let mut rx = RxStream::setup(device, "CF32", &[0], &StreamArgs::default())?;
//! rx.activate(StreamFlags::empty(), 0, 1000)?;
//!
//! let mut buf = vec![Complex::new(0.0f32, 0.0); 4096];
//! let res = rx.read(&mut [&mut buf[..]], Duration::from_millis(100))?;
//! assert_eq!(res.samples, 1000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::device::{
    Channel, Device, DeviceError, Direction, MetaFlags, MetaStatus, Metadata, SyncConfig,
};
use crate::format::SampleFormat;

/// Scripted result of one synchronous receive or transmit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOutcome {
    /// Transfer everything
    Ok,
    /// Transfer everything and report an overrun
    Overrun,
    /// Transfer everything and report an underrun
    Underrun,
    /// Transfer at most this many samples (over all channels)
    Short(usize),
    /// Transfer everything and report these status bits
    Status(MetaStatus),
    /// Fail with this error
    Fail(DeviceError),
}

/// One recorded transmit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub flags: MetaFlags,
    pub timestamp: u64,
    /// Samples over all channels
    pub count: usize,
    /// Native words as handed to the device
    pub samples: Vec<i16>,
}

#[derive(Debug)]
struct Inner {
    rates: [f64; 2],
    ticks: [u64; 2],
    configs: [Option<SyncConfig>; 2],
    enabled: HashSet<Channel>,
    rx_pattern: Vec<i16>,
    rx_script: VecDeque<SimOutcome>,
    tx_script: VecDeque<SimOutcome>,
    config_failure: Option<DeviceError>,
    enable_failure: Option<DeviceError>,
    rx_calls: usize,
    last_rx_timeout: Option<Duration>,
    tx_log: Vec<TxRecord>,
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Rx => 0,
        Direction::Tx => 1,
    }
}

impl Inner {
    fn format(&self, direction: Direction) -> SampleFormat {
        self.configs[slot(direction)]
            .as_ref()
            .map(|c| c.format)
            .unwrap_or_default()
    }

    fn num_channels(&self, direction: Direction) -> usize {
        self.configs[slot(direction)]
            .as_ref()
            .map(|c| c.layout.num_channels())
            .unwrap_or(1)
    }

    fn pattern(&self, k: usize) -> i16 {
        if self.rx_pattern.is_empty() {
            k as i16
        } else {
            self.rx_pattern[k % self.rx_pattern.len()]
        }
    }
}

/// In-memory [`Device`] with scriptable behavior
#[derive(Debug)]
pub struct SimDevice {
    inner: Mutex<Inner>,
}

impl SimDevice {
    /// Create a device running both directions at `sample_rate`
    pub fn new(sample_rate: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rates: [sample_rate; 2],
                ticks: [0; 2],
                configs: [None, None],
                enabled: HashSet::new(),
                rx_pattern: Vec::new(),
                rx_script: VecDeque::new(),
                tx_script: VecDeque::new(),
                config_failure: None,
                enable_failure: None,
                rx_calls: 0,
                last_rx_timeout: None,
                tx_log: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_sample_rate(&self, direction: Direction, rate: f64) {
        self.lock().rates[slot(direction)] = rate;
    }

    /// Move a direction's hardware clock
    pub fn set_timestamp(&self, direction: Direction, ticks: u64) {
        self.lock().ticks[slot(direction)] = ticks;
    }

    /// Native component values cycled through received buffers.
    ///
    /// An empty pattern (the default) produces a ramp `0, 1, 2, ...`.
    pub fn set_rx_pattern(&self, pattern: Vec<i16>) {
        self.lock().rx_pattern = pattern;
    }

    /// Script the outcome of the next unscripted receive call
    pub fn push_rx_outcome(&self, outcome: SimOutcome) {
        self.lock().rx_script.push_back(outcome);
    }

    /// Script the outcome of the next unscripted transmit call
    pub fn push_tx_outcome(&self, outcome: SimOutcome) {
        self.lock().tx_script.push_back(outcome);
    }

    /// Make the next `sync_config` call fail
    pub fn fail_next_config(&self, err: DeviceError) {
        self.lock().config_failure = Some(err);
    }

    /// Make the next `enable_channel` call fail
    pub fn fail_next_enable(&self, err: DeviceError) {
        self.lock().enable_failure = Some(err);
    }

    /// Last configuration applied to a direction
    pub fn sync_config_for(&self, direction: Direction) -> Option<SyncConfig> {
        self.lock().configs[slot(direction)].clone()
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        self.lock().enabled.contains(&channel)
    }

    /// Number of receive calls that reached the device
    pub fn rx_calls(&self) -> usize {
        self.lock().rx_calls
    }

    /// Timeout handed to the most recent receive call
    pub fn last_rx_timeout(&self) -> Option<Duration> {
        self.lock().last_rx_timeout
    }

    /// Every transmit call so far
    pub fn tx_log(&self) -> Vec<TxRecord> {
        self.lock().tx_log.clone()
    }
}

impl Device for SimDevice {
    fn sync_config(&self, config: &SyncConfig) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.config_failure.take() {
            return Err(err);
        }
        inner.configs[slot(config.layout.direction())] = Some(config.clone());
        tracing::debug!("sim: configured {:?}", config);
        Ok(())
    }

    fn enable_channel(&self, channel: Channel, enable: bool) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.enable_failure.take() {
            return Err(err);
        }
        if enable {
            inner.enabled.insert(channel);
        } else {
            inner.enabled.remove(&channel);
        }
        Ok(())
    }

    fn sync_rx(
        &self,
        samples: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        timeout: Duration,
    ) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        inner.rx_calls += 1;
        inner.last_rx_timeout = Some(timeout);

        let outcome = inner.rx_script.pop_front().unwrap_or(SimOutcome::Ok);
        let n = match &outcome {
            SimOutcome::Fail(err) => return Err(err.clone()),
            SimOutcome::Short(n) => (*n).min(count),
            _ => count,
        };

        let rx = slot(Direction::Rx);
        let now = inner.ticks[rx];
        let start = if meta.flags.contains(MetaFlags::RX_NOW) {
            now
        } else if meta.timestamp < now {
            return Err(DeviceError::TimePast);
        } else {
            meta.timestamp
        };

        if inner.format(Direction::Rx).is_8bit() {
            for (k, word) in samples.iter_mut().take(n).enumerate() {
                let re = inner.pattern(2 * k) as i8;
                let im = inner.pattern(2 * k + 1) as i8;
                *word = i16::from_ne_bytes([re as u8, im as u8]);
            }
        } else {
            for (k, word) in samples.iter_mut().take(2 * n).enumerate() {
                *word = inner.pattern(k);
            }
        }

        let nchan = inner.num_channels(Direction::Rx);
        inner.ticks[rx] = start + (n / nchan) as u64;

        meta.timestamp = start;
        meta.actual_count = n;
        meta.status = match outcome {
            SimOutcome::Overrun => MetaStatus::OVERRUN,
            SimOutcome::Status(status) => status,
            _ => MetaStatus::empty(),
        };
        Ok(())
    }

    fn sync_tx(
        &self,
        samples: &[i16],
        count: usize,
        meta: &mut Metadata,
        _timeout: Duration,
    ) -> Result<(), DeviceError> {
        let mut inner = self.lock();

        let outcome = inner.tx_script.pop_front().unwrap_or(SimOutcome::Ok);
        let n = match &outcome {
            SimOutcome::Fail(err) => return Err(err.clone()),
            SimOutcome::Short(n) => (*n).min(count),
            _ => count,
        };

        let words = if inner.format(Direction::Tx).is_8bit() {
            n
        } else {
            2 * n
        };
        let record = TxRecord {
            flags: meta.flags,
            timestamp: meta.timestamp,
            count: n,
            samples: samples[..words.min(samples.len())].to_vec(),
        };
        inner.tx_log.push(record);

        let tx = slot(Direction::Tx);
        let timed = meta.flags.contains(MetaFlags::TX_UPDATE_TIMESTAMP)
            || (meta.flags.contains(MetaFlags::TX_BURST_START)
                && !meta.flags.contains(MetaFlags::TX_NOW));
        if timed {
            inner.ticks[tx] = inner.ticks[tx].max(meta.timestamp);
        }
        let nchan = inner.num_channels(Direction::Tx);
        inner.ticks[tx] += (n / nchan) as u64;

        meta.status = match outcome {
            SimOutcome::Underrun => MetaStatus::UNDERRUN,
            SimOutcome::Status(status) => status,
            _ => MetaStatus::empty(),
        };
        Ok(())
    }

    fn timestamp(&self, direction: Direction) -> Result<u64, DeviceError> {
        Ok(self.lock().ticks[slot(direction)])
    }

    fn sample_rate(&self, direction: Direction) -> f64 {
        self.lock().rates[slot(direction)]
    }
}
