//! Integration tests for the Sphero driver over a mock transport.
//!
//! The mock's responder plays the robot: it sees each frame the writer sends
//! and may queue a reply for the reader.

use sphero_io::Error;
use sphero_io::config::DriverConfig;
use sphero_io::core::driver::DeviceDriver;
use sphero_io::core::events::Topic;
use sphero_io::devices::sphero::constants::*;
use sphero_io::devices::sphero::{
    CollisionPacket, Frame, Packet, SpheroDriver, SpheroEvent, TOPIC_COLLISION, TOPIC_ERROR,
    TOPIC_SENSOR_DATA,
};
use sphero_io::transport::MockTransport;
use std::thread;
use std::time::{Duration, Instant};

const EVENT_WAIT: Duration = Duration::from_secs(2);

fn test_config() -> DriverConfig {
    DriverConfig {
        sync_timeout_ms: 1000,
        halt_duration_ms: 50,
        ..DriverConfig::default()
    }
}

fn driver(mock: &MockTransport, config: DriverConfig) -> SpheroDriver {
    SpheroDriver::new("test", Box::new(mock.clone()), config)
}

/// Robot that answers GetRGB with `rgb` and ignores everything else
fn echo_rgb(rgb: [u8; 3]) -> impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static {
    move |written| {
        let packet = Packet::parse(written).ok()?;
        (packet.command_id() == CMD_GET_RGB)
            .then(|| Frame::sync_reply(0x00, packet.sequence(), &rgb).as_bytes().to_vec())
    }
}

/// Poll `condition` until it holds or `EVENT_WAIT` passes
fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + EVENT_WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Split everything the driver wrote into command frames
fn written_packets(mock: &MockTransport) -> Vec<Packet> {
    let bytes = mock.get_written();
    let mut packets = Vec::new();
    let mut pos = 0;
    while pos + COMMAND_HEADER_SIZE <= bytes.len() {
        let len = COMMAND_HEADER_SIZE + bytes[pos + 5] as usize;
        packets.push(Packet::parse(&bytes[pos..pos + len]).unwrap());
        pos += len;
    }
    assert_eq!(pos, bytes.len(), "trailing partial frame");
    packets
}

#[test]
fn test_get_rgb_returns_echoed_color() {
    let mock = MockTransport::new();
    mock.set_responder(echo_rgb([0x12, 0x34, 0x56]));
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    assert_eq!(sphero.get_rgb(), Some([0x12, 0x34, 0x56]));
    sphero.halt().unwrap();
}

#[test]
fn test_get_rgb_without_reply_is_none() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, DriverConfig::default());

    sphero.start().unwrap();
    assert_eq!(sphero.get_rgb(), None);
    assert_eq!(sphero.stats().sync_timeouts, 1);
    sphero.halt().unwrap();
}

#[test]
fn test_get_rgb_after_corrupt_frame() {
    let mock = MockTransport::new();
    let mut corrupt = Frame::sync_reply(0x00, 0x77, &[1, 2, 3]).as_bytes().to_vec();
    corrupt[6] ^= 0x01;
    mock.inject_read(&corrupt);
    mock.set_responder(echo_rgb([9, 8, 7]));
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    assert_eq!(sphero.get_rgb(), Some([9, 8, 7]));
    assert!(sphero.stats().checksum_errors >= 1);
    sphero.halt().unwrap();
}

#[test]
fn test_start_sends_startup_configuration() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    sphero.halt().unwrap();

    let packets = written_packets(&mock);
    assert_eq!(packets[0].command_id(), CMD_CONFIGURE_COLLISION);
    assert_eq!(packets[0].body(), &[0x01, 0x80, 0x80, 0x80, 0x80, 0x60]);
    assert_eq!(packets[1].command_id(), CMD_SET_OPTION_FLAGS);
    assert_eq!(packets[1].body(), &[0, 0, 0, 1]);
}

#[test]
fn test_configured_collision_is_sent_once() {
    let mock = MockTransport::new();
    let custom = sphero_io::devices::sphero::CollisionConfig {
        x_threshold: 0x40,
        ..Default::default()
    };
    let sphero = driver(&mock, test_config()).with_collision_config(custom);

    sphero.start().unwrap();
    sphero.halt().unwrap();
    mock.clear_written();

    // Restart skips collision configuration
    sphero.start().unwrap();
    sphero.halt().unwrap();
    assert_eq!(written_packets(&mock)[0].command_id(), CMD_SET_OPTION_FLAGS);
}

#[test]
fn test_second_start_is_rejected() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    assert!(matches!(sphero.start(), Err(Error::AlreadyStarted)));
    sphero.halt().unwrap();
    assert!(!sphero.is_running());
}

#[test]
fn test_halt_ends_with_stop_commands() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());
    let device: &dyn DeviceDriver = &sphero;

    device.start().unwrap();
    sphero.roll(0x80, 45).unwrap();
    device.halt().unwrap();

    let packets = written_packets(&mock);
    let stops = packets
        .windows(2)
        .filter(|pair| {
            pair[0].command_id() == CMD_SET_DATA_STREAMING
                && pair[1].command_id() == CMD_ROLL
                && pair[1].body() == [0, 0, 0, 1]
        })
        .count();
    assert!(stops >= 1);

    let last = packets.last().unwrap();
    assert_eq!(last.command_id(), CMD_ROLL);
    assert_eq!(last.body(), &[0, 0, 0, 1]);
    assert_eq!(sphero.stats().frames_sent as usize, packets.len());
}

#[test]
fn test_sequence_advances_per_written_frame() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    sphero.halt().unwrap();

    let sent = sphero.stats().frames_sent;
    assert_eq!(sphero.sequence(), (sent % 256) as u8);
}

#[test]
fn test_notifications_are_published_newest_first() {
    let mock = MockTransport::new();
    let collision = [
        0x00, 0x10, // x = 16
        0xFF, 0xF0, // y = -16
        0x00, 0x02, // z = 2
        0x01, // axis
        0x01, 0x00, // x_magnitude = 256
        0x00, 0x80, // y_magnitude = 128
        0x21, // speed = 33
        0x00, 0x01, 0x00, 0x00, // timestamp = 65536
    ];
    mock.inject_read(Frame::notification(ASYNC_ID_COLLISION, &collision).as_bytes());
    mock.inject_read(Frame::notification(ASYNC_ID_SENSOR_DATA, &[0u8; 84]).as_bytes());

    let sphero = driver(&mock, test_config());
    let all = sphero.events().subscribe_all();
    let collisions = sphero.events().subscribe(TOPIC_COLLISION);
    sphero.start().unwrap();

    let first = all.recv_timeout(EVENT_WAIT).unwrap();
    let second = all.recv_timeout(EVENT_WAIT).unwrap();
    assert_eq!(
        [first.topic(), second.topic()],
        [TOPIC_SENSOR_DATA, TOPIC_COLLISION]
    );
    assert!(
        all.recv_timeout(Duration::from_millis(2 * DISPATCH_INTERVAL_MS))
            .is_err()
    );

    match collisions.recv_timeout(EVENT_WAIT).unwrap() {
        SpheroEvent::Collision(c) => assert_eq!(
            c,
            CollisionPacket {
                x: 16,
                y: -16,
                z: 2,
                axis: 1,
                x_magnitude: 256,
                y_magnitude: 128,
                speed: 33,
                timestamp: 65536,
            }
        ),
        other => panic!("unexpected event {:?}", other),
    }
    sphero.halt().unwrap();
}

#[test]
fn test_reader_survives_read_errors() {
    let mock = MockTransport::new();
    mock.set_responder(echo_rgb([1, 2, 3]));
    mock.set_fail_reads(true);
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    assert!(wait_until(|| sphero.stats().read_errors >= 2));

    mock.set_fail_reads(false);
    assert_eq!(sphero.get_rgb(), Some([1, 2, 3]));
    sphero.halt().unwrap();
}

#[test]
fn test_halt_while_disconnected_skips_stop() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());

    sphero.start().unwrap();
    assert!(wait_until(|| sphero.stats().frames_sent == 2));

    mock.set_connected(false);
    sphero.halt().unwrap();
    mock.set_connected(true);

    let packets = written_packets(&mock);
    assert_eq!(packets.len(), 2);
    assert!(packets.iter().all(|p| p.command_id() != CMD_ROLL));
    assert!(!sphero.is_running());
}

#[test]
fn test_write_failure_publishes_error() {
    let mock = MockTransport::new();
    mock.set_fail_writes(true);
    let sphero = driver(&mock, test_config());
    let errors = sphero.events().subscribe(TOPIC_ERROR);

    sphero.start().unwrap();
    assert!(matches!(
        errors.recv_timeout(EVENT_WAIT),
        Ok(SpheroEvent::Error(_))
    ));
    sphero.halt().unwrap();

    assert_eq!(sphero.sequence(), 0);
    assert!(sphero.stats().write_errors >= 1);
    assert_eq!(sphero.stats().frames_sent, 0);
}

#[test]
fn test_close_and_reconnect() {
    let mock = MockTransport::new();
    let sphero = driver(&mock, test_config());

    sphero.close().unwrap();
    assert!(!sphero.is_connected());
    sphero.reconnect().unwrap();
    assert!(sphero.is_connected());
}
