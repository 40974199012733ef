//! Integration tests for transmit streams against the simulated device

mod helpers;

use std::thread;
use std::time::{Duration, Instant};

use bladerf_stream::device::MetaFlags;
use bladerf_stream::sim::SimOutcome;
use bladerf_stream::{
    Channel, DeviceError, Direction, SampleFormat, Stream, StreamArgs, StreamError, StreamFlags,
    TxEventCode, TxStream,
};
use helpers::{TIMEOUT, cf32_const, cs16_ramp, sim};

#[test]
fn test_three_writes_one_burst() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(100, 0.25, -0.25);

    let a = tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT).unwrap();
    let b = tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT).unwrap();
    let c = tx.write(&[&buf[..]], StreamFlags::END_BURST, 0, TIMEOUT).unwrap();
    assert_eq!((a.samples, b.samples, c.samples), (100, 100, 100));
    assert!(c.flags.contains(StreamFlags::END_BURST));
    assert!(!tx.in_burst());
    assert_eq!(tx.pending_events(), 1);

    let log = dev.tx_log();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].flags, MetaFlags::TX_BURST_START | MetaFlags::TX_NOW);
    assert_eq!(log[1].flags, MetaFlags::empty());
    assert_eq!(log[2].flags, MetaFlags::TX_BURST_END);

    // the last sample has not left the device yet
    assert_eq!(
        tx.read_status(Duration::from_millis(5)),
        Err(StreamError::Timeout)
    );

    dev.set_timestamp(Direction::Tx, 301);
    let ev = tx.read_status(TIMEOUT).unwrap();
    assert_eq!(ev.code, TxEventCode::Ok);
    assert_eq!(ev.flags, StreamFlags::END_BURST | StreamFlags::HAS_TIME);
    assert_eq!(ev.time_ns, 300_000);
    assert_eq!(tx.pending_events(), 0);
}

#[test]
fn test_read_status_waits_for_device_clock() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(50, 0.0, 0.0);
    tx.write(&[&buf[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();

    let clock = dev.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        clock.set_timestamp(Direction::Tx, 1_000);
    });

    let start = Instant::now();
    let ev = tx.read_status(Duration::from_secs(2)).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(10));
    assert_eq!(ev.time_ns, 50_000);
    handle.join().unwrap();
}

#[test]
fn test_read_status_timeout_without_events() {
    let dev = sim();
    let mut tx = TxStream::setup(dev, "CF32", &[0], &StreamArgs::default()).unwrap();
    let start = Instant::now();
    assert_eq!(
        tx.read_status(Duration::from_millis(5)),
        Err(StreamError::Timeout)
    );
    assert!(start.elapsed() >= Duration::from_millis(5));
}

#[test]
fn test_underflow_event_reported_immediately() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    dev.push_tx_outcome(SimOutcome::Underrun);
    let buf = cf32_const(10, 0.0, 0.0);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();

    let ev = tx.read_status(TIMEOUT).unwrap();
    assert_eq!(ev.code, TxEventCode::Underflow);
    assert_eq!(ev.code.code(), -7);
    assert!(!ev.has_time());
    assert!(tx.in_burst());
}

#[test]
fn test_clipped_write_drops_end_burst() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CS16", &[0, 1], &StreamArgs::default()).unwrap();
    let ch0 = cs16_ramp(5000, 0);
    let ch1 = cs16_ramp(5000, 0);

    let res = tx
        .write(&[&ch0[..], &ch1[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();
    assert_eq!(res.samples, 4096);
    assert!(!res.flags.contains(StreamFlags::END_BURST));
    assert!(tx.in_burst());
    assert_eq!(tx.pending_events(), 0);

    let log = dev.tx_log();
    assert_eq!(log[0].count, 8192);
    assert!(!log[0].flags.contains(MetaFlags::TX_BURST_END));
}

#[test]
fn test_two_channel_interleave() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CS16", &[0, 1], &StreamArgs::default()).unwrap();
    let ch0 = cs16_ramp(3, 10);
    let ch1 = cs16_ramp(3, 100);
    tx.write(&[&ch0[..], &ch1[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();

    let log = dev.tx_log();
    assert_eq!(log[0].count, 6);
    assert_eq!(
        log[0].samples,
        vec![10, -10, 100, -100, 11, -11, 101, -101, 12, -12, 102, -102]
    );
}

#[test]
fn test_two_channel_float_interleave() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0, 1], &StreamArgs::default()).unwrap();
    let ch0 = cf32_const(2, 0.5, -0.25);
    let ch1 = cf32_const(2, -1.0, 0.999);
    let res = tx
        .write(&[&ch0[..], &ch1[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();
    assert_eq!(res.samples, 2);

    let log = dev.tx_log();
    assert_eq!(log[0].count, 4);
    // 0.999 * 2048 = 2045.95, truncated
    assert_eq!(
        log[0].samples,
        vec![1024, -512, -2048, 2045, 1024, -512, -2048, 2045]
    );
}

#[test]
fn test_integer_passthrough() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CS16", &[1], &StreamArgs::default()).unwrap();
    assert!(dev.is_enabled(Channel::new(Direction::Tx, 1)));
    let buf = cs16_ramp(4, -2);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();
    assert_eq!(dev.tx_log()[0].samples, vec![-2, 2, -1, 1, 0, 0, 1, -1]);
}

#[test]
fn test_float_scaling() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(2, 0.5, -0.5);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();
    assert_eq!(dev.tx_log()[0].samples, vec![1024, -1024, 1024, -1024]);
}

#[test]
fn test_float_scaling_sc8() {
    let dev = sim();
    let args = StreamArgs {
        format: SampleFormat::Sc8Q7,
        ..Default::default()
    };
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &args).unwrap();
    let buf = cf32_const(2, 0.5, -0.5);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();
    let word = i16::from_ne_bytes([64, (-64i8) as u8]);
    assert_eq!(dev.tx_log()[0].samples, vec![word, word]);
}

#[test]
fn test_timed_burst_start() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(100, 0.0, 0.0);
    tx.write(
        &[&buf[..]],
        StreamFlags::HAS_TIME | StreamFlags::END_BURST,
        2_000_000,
        TIMEOUT,
    )
    .unwrap();

    let log = dev.tx_log();
    assert_eq!(
        log[0].flags,
        MetaFlags::TX_BURST_START | MetaFlags::TX_BURST_END
    );
    assert_eq!(log[0].timestamp, 2_000);

    dev.set_timestamp(Direction::Tx, 2_101);
    assert_eq!(tx.read_status(TIMEOUT).unwrap().time_ns, 2_100_000);
}

#[test]
fn test_timestamp_update_inside_burst() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(100, 0.0, 0.0);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();
    tx.write(&[&buf[..]], StreamFlags::HAS_TIME, 5_000_000, TIMEOUT)
        .unwrap();

    let log = dev.tx_log();
    assert_eq!(log[1].flags, MetaFlags::TX_UPDATE_TIMESTAMP);
    assert_eq!(log[1].timestamp, 5_000);
}

#[test]
fn test_untimed_start_reads_device_clock() {
    let dev = sim();
    dev.set_timestamp(Direction::Tx, 7_000);
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(100, 0.0, 0.0);
    tx.write(&[&buf[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();

    dev.set_timestamp(Direction::Tx, 8_000);
    assert_eq!(tx.read_status(TIMEOUT).unwrap().time_ns, 7_100_000);
}

#[test]
fn test_deactivate_sends_terminator() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();

    // nothing to end yet
    tx.deactivate(StreamFlags::empty()).unwrap();
    assert!(dev.tx_log().is_empty());

    let buf = cf32_const(100, 0.5, 0.5);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();
    tx.deactivate(StreamFlags::empty()).unwrap();
    assert!(!tx.in_burst());

    let log = dev.tx_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].count, 1);
    assert_eq!(log[1].flags, MetaFlags::TX_BURST_END);
    assert_eq!(log[1].samples, vec![0, 0]);
}

#[test]
fn test_deactivate_ignores_terminator_failure() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(10, 0.0, 0.0);
    tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT)
        .unwrap();

    dev.push_tx_outcome(SimOutcome::Fail(DeviceError::Other("usb".into())));
    assert_eq!(tx.deactivate(StreamFlags::empty()), Ok(()));
    assert!(!tx.in_burst());
}

#[test]
fn test_activation_flags_not_supported() {
    let dev = sim();
    let mut tx = TxStream::setup(dev, "CF32", &[0], &StreamArgs::default()).unwrap();
    assert_eq!(tx.activate(StreamFlags::empty(), 0, 0), Ok(()));
    assert_eq!(
        tx.activate(StreamFlags::HAS_TIME, 1_000, 0),
        Err(StreamError::NotSupported)
    );
    assert_eq!(
        tx.deactivate(StreamFlags::END_BURST),
        Err(StreamError::NotSupported)
    );
}

#[test]
fn test_device_error_mapping() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0], &StreamArgs::default()).unwrap();
    let buf = cf32_const(10, 0.0, 0.0);

    dev.push_tx_outcome(SimOutcome::Fail(DeviceError::Timeout));
    dev.push_tx_outcome(SimOutcome::Fail(DeviceError::TimePast));
    dev.push_tx_outcome(SimOutcome::Fail(DeviceError::Other("usb".into())));

    for expected in [
        StreamError::Timeout,
        StreamError::TimeError,
        StreamError::Stream,
    ] {
        assert_eq!(
            tx.write(&[&buf[..]], StreamFlags::empty(), 0, TIMEOUT),
            Err(expected)
        );
        assert!(!tx.in_burst());
    }
}

#[test]
fn test_buffer_mismatch_not_supported() {
    let dev = sim();
    let mut tx = TxStream::setup(dev.clone(), "CF32", &[0, 1], &StreamArgs::default()).unwrap();
    let ints = cs16_ramp(10, 0);
    assert_eq!(
        tx.write(&[&ints[..], &ints[..]], StreamFlags::empty(), 0, TIMEOUT),
        Err(StreamError::NotSupported)
    );
    let floats = cf32_const(10, 0.0, 0.0);
    assert_eq!(
        tx.write(&[&floats[..]], StreamFlags::empty(), 0, TIMEOUT),
        Err(StreamError::NotSupported)
    );
    assert!(dev.tx_log().is_empty());
}

#[test]
fn test_stream_enum_tx() {
    let dev = sim();
    let mut stream = Stream::setup(
        dev.clone(),
        Direction::Tx,
        "CF32",
        &[0],
        &StreamArgs::default(),
    )
    .unwrap();
    assert_eq!(stream.direction(), Direction::Tx);
    assert!(stream.as_rx_mut().is_none());

    let buf = cf32_const(10, 0.0, 0.0);
    stream
        .as_tx_mut()
        .unwrap()
        .write(&[&buf[..]], StreamFlags::END_BURST, 0, TIMEOUT)
        .unwrap();
    dev.set_timestamp(Direction::Tx, 100);
    let ev = stream.read_status(TIMEOUT).unwrap();
    assert_eq!(ev.time_ns, 10_000);

    stream.close().unwrap();
    assert!(!dev.is_enabled(Channel::new(Direction::Tx, 0)));
}

#[test]
fn test_drop_disables_channels() {
    let dev = sim();
    {
        let _tx = TxStream::setup(dev.clone(), "CS16", &[0, 1], &StreamArgs::default()).unwrap();
        assert!(dev.is_enabled(Channel::new(Direction::Tx, 0)));
    }
    assert!(!dev.is_enabled(Channel::new(Direction::Tx, 0)));
    assert!(!dev.is_enabled(Channel::new(Direction::Tx, 1)));
}
