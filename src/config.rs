//! Stream setup options
//!
//! [`StreamArgs`] mirrors the key/value arguments accepted when a stream is
//! set up. It can be built in code, parsed from a string map with
//! [`StreamArgs::from_kwargs`], or deserialized with serde from any config
//! file format.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::device::{ChannelLayout, SyncConfig};
use crate::error::{Error, Result};
use crate::format::SampleFormat;

/// Default number of device buffers
pub const DEFAULT_NUM_BUFFERS: usize = 32;
/// Default buffer length in samples
pub const DEFAULT_BUFFER_LEN: usize = 4096;
/// Buffer lengths are rounded up to a multiple of this
pub const BUFFER_LEN_MULTIPLE: usize = 1024;
/// Upper bound on transfers in flight imposed by the USB stack
pub const MAX_TRANSFERS: usize = 32;
/// Timeout handed to the device for its internal transfers
pub const SYNC_CONFIG_TIMEOUT: Duration = Duration::from_millis(1000);

/// Streaming setup options; zero means "use the default"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamArgs {
    /// Number of device-side buffers
    pub buffers: usize,
    /// Samples per buffer
    pub buflen: usize,
    /// Transfers in flight, 0 for buffers/2
    pub transfers: usize,
    /// Wire sample format
    pub format: SampleFormat,
}

impl Default for StreamArgs {
    fn default() -> Self {
        Self {
            buffers: DEFAULT_NUM_BUFFERS,
            buflen: DEFAULT_BUFFER_LEN,
            transfers: 0,
            format: SampleFormat::default(),
        }
    }
}

/// Buffer geometry after defaults and limits are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedArgs {
    pub num_buffers: usize,
    pub buffer_size: usize,
    pub num_transfers: usize,
}

impl StreamArgs {
    /// Parse a key/value argument map (`buffers`, `buflen`, `transfers`,
    /// `format`). Unknown keys are ignored.
    pub fn from_kwargs(kwargs: &HashMap<String, String>) -> Result<Self> {
        let mut args = StreamArgs::default();
        if let Some(v) = kwargs.get("buffers") {
            args.buffers = parse_count("buffers", v)?;
        }
        if let Some(v) = kwargs.get("buflen") {
            args.buflen = parse_count("buflen", v)?;
        }
        if let Some(v) = kwargs.get("transfers") {
            args.transfers = parse_count("transfers", v)?;
        }
        if let Some(v) = kwargs.get("format") {
            args.format = v.parse()?;
        }
        Ok(args)
    }

    /// Apply defaults and hardware limits
    pub fn resolve(&self) -> ResolvedArgs {
        let num_buffers = match self.buffers {
            0 => DEFAULT_NUM_BUFFERS,
            1 => 2,
            n => n,
        };

        let mut buffer_size = if self.buflen == 0 {
            DEFAULT_BUFFER_LEN
        } else {
            self.buflen
        };
        if buffer_size % BUFFER_LEN_MULTIPLE != 0 {
            buffer_size = (buffer_size / BUFFER_LEN_MULTIPLE + 1) * BUFFER_LEN_MULTIPLE;
        }

        let num_transfers = match self.transfers {
            0 => num_buffers / 2,
            n => n,
        }
        .min(num_buffers)
        .min(MAX_TRANSFERS);

        ResolvedArgs {
            num_buffers,
            buffer_size,
            num_transfers,
        }
    }

    /// Device sync configuration for a channel layout
    pub fn sync_config(&self, layout: ChannelLayout) -> SyncConfig {
        let resolved = self.resolve();
        SyncConfig {
            layout,
            format: self.format,
            num_buffers: resolved.num_buffers,
            buffer_size: resolved.buffer_size,
            num_transfers: resolved.num_transfers,
            timeout: SYNC_CONFIG_TIMEOUT,
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| Error::InvalidArgument {
        key: key.to_string(),
        value: value.to_string(),
    })
}
