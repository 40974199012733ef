//! Sample sources built on a receive stream
//!
//! [`RxSamples`] turns a single-channel `CF32` receive stream into a blocking
//! iterator of sample chunks. [`AsyncRxSamples`] runs the same loop on a
//! dedicated thread and exposes it as a [`futures::Stream`].

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use num_complex::Complex;
use tokio::sync::mpsc;

use crate::StreamFlags;
use crate::device::Device;
use crate::error::StreamError;
use crate::format::StreamFormat;
use crate::stream::RxStream;

/**
 * Synchronous receive iterator
 */
pub struct RxSamples<D: Device> {
    stream: RxStream<D>,
    buf: Vec<Complex<f32>>,
    timeout: Duration,
    done: bool,
}

impl<D: Device> RxSamples<D> {
    /// Start continuous reception on `stream`.
    ///
    /// The stream must be a single-channel `CF32` stream. Each read waits at
    /// most `timeout`.
    pub fn new(mut stream: RxStream<D>, timeout: Duration) -> Result<Self, StreamError> {
        if stream.format() != StreamFormat::Cf32 || stream.channels().len() != 1 {
            return Err(StreamError::NotSupported);
        }
        stream.activate(StreamFlags::empty(), 0, 0)?;
        let buf = vec![Complex::new(0.0, 0.0); stream.mtu()];
        Ok(Self {
            stream,
            buf,
            timeout,
            done: false,
        })
    }

    /// Stop reception and hand the stream back
    pub fn into_inner(mut self) -> RxStream<D> {
        if let Err(e) = self.stream.deactivate(StreamFlags::empty()) {
            tracing::debug!("deactivating RX stream failed: {}", e);
        }
        self.stream
    }
}

impl<D: Device> Iterator for RxSamples<D> {
    type Item = Result<Vec<Complex<f32>>, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let res = self.stream.read(&mut [&mut self.buf[..]], self.timeout);
            match res {
                Ok(res) => return Some(Ok(self.buf[..res.samples].to_vec())),
                Err(StreamError::Overflow { time_ns }) => {
                    tracing::warn!("RX overflow, samples dropped before {} ns", time_ns);
                }
                Err(StreamError::Stream) => {
                    self.done = true;
                    return Some(Err(StreamError::Stream));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/**
 * Asynchronous receive stream
 */
pub struct AsyncRxSamples {
    rx: mpsc::Receiver<Result<Vec<Complex<f32>>, StreamError>>,
    _handle: std::thread::JoinHandle<()>,
}

impl AsyncRxSamples {
    /// Move `stream` onto a reader thread.
    ///
    /// The thread exits once this value is dropped or the stream fails.
    pub fn spawn<D: Device + 'static>(
        stream: RxStream<D>,
        timeout: Duration,
    ) -> Result<Self, StreamError> {
        let mut samples = RxSamples::new(stream, timeout)?;
        let (tx, rx) = mpsc::channel(32);

        let handle = std::thread::spawn(move || {
            for item in samples.by_ref() {
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
            let stream = samples.into_inner();
            if let Err(e) = stream.close() {
                tracing::warn!("closing RX stream failed: {}", e);
            }
        });

        Ok(Self {
            rx,
            _handle: handle,
        })
    }
}

impl Stream for AsyncRxSamples {
    type Item = Result<Vec<Complex<f32>>, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
