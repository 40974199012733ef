#![doc = include_str!("../readme.md")]

use bitflags::bitflags;

pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod format;
pub mod rx_command;
pub mod sim;
pub mod source;
pub mod stream;
pub mod time;
pub mod tx_burst;

pub use config::StreamArgs;
pub use device::{Channel, ChannelLayout, Device, DeviceError, Direction, Metadata, SyncConfig};
pub use error::{Error, Result, StreamError};
pub use format::{SampleFormat, StreamFormat, StreamSample};
pub use source::{AsyncRxSamples, RxSamples};
pub use stream::{ReadResult, RxStream, Stream, TxStream, WriteResult};
pub use tx_burst::{TxEvent, TxEventCode};

bitflags! {
    /**
     * Flags exchanged with the application on activate, read, write and
     * status calls (SoapySDR bit values)
     */
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamFlags: u32 {
        /// Last samples of a transmit burst
        const END_BURST = 1 << 1;
        /// The accompanying time field is valid
        const HAS_TIME = 1 << 2;
        /// Hardware status bit HW_MINIEXP1 was set on the received buffer
        const USER_FLAG0 = 1 << 16;
        /// Hardware status bit HW_MINIEXP2 was set on the received buffer
        const USER_FLAG1 = 1 << 17;
    }
}
