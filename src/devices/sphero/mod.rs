//! Sphero packet protocol driver
//!
//! Talks to a Sphero robot over a byte-stream transport (Bluetooth serial in
//! practice).
//!
//! # Architecture
//!
//! ## Thread Model
//!
//! 1. **Writer** (`sphero-tx`): drains the outgoing queue in order, writes each
//!    frame and advances the sequence counter once the whole frame is accepted.
//!    Failures are published on the `error` topic.
//! 2. **Reader** (`sphero-rx`): assembles frames from the byte stream, drops
//!    frames with a bad checksum, forwards replies to the collector and buffers
//!    notifications for the dispatcher.
//! 3. **Collector** (`sphero-sync`): stores replies and wakes callers blocked in
//!    a synchronous request such as [`SpheroDriver::get_rgb`].
//! 4. **Dispatcher** (`sphero-async`): every tick, decodes buffered
//!    notifications newest-first and publishes `collision` and `sensordata`
//!    events.
//!
//! All four observe one shutdown flag; [`SpheroDriver::halt`] raises it and
//! joins them.
//!
//! ## Sequence Numbers
//!
//! A packet is stamped with the counter value at the time it is queued and the
//! writer advances the counter after each successful write. A reply matches a
//! request when its sequence byte equals the one the request carried.

mod commands;
pub mod constants;
mod dispatcher;
pub mod messages;
pub mod packet;
mod reader;
mod responses;
mod ring_buffer;
mod state;
mod writer;

pub use commands::SpheroCommand;
pub use dispatcher::decode_notification;
pub use messages::{
    CollisionConfig, CollisionPacket, DataStreamingPacket, DataStreamingSetting, SpheroEvent,
    TOPIC_COLLISION, TOPIC_ERROR, TOPIC_SENSOR_DATA,
};
pub use packet::{Frame, FrameKind, Packet, SequenceCounter};
pub use reader::FrameReader;
pub use state::{LinkStats, LinkStatsSnapshot};
pub use writer::transmit;

use crate::config::DriverConfig;
use crate::core::driver::DeviceDriver;
use crate::core::events::EventBus;
use crate::core::registry::CommandRegistry;
use crate::error::{Error, Result};
use crate::transport::Transport;
use constants::*;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;
use responses::{AsyncResponses, SyncResponses};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Transport shared by the reader and writer threads
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Result of a registry command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpheroReply {
    /// Command queued
    Queued,
    /// Color read back, `None` on timeout
    Rgb(Option<[u8; 3]>),
}

/// Sphero driver with writer, reader, collector and dispatcher threads
pub struct SpheroDriver {
    name: String,
    config: DriverConfig,
    collision: Option<CollisionConfig>,
    collision_configured: AtomicBool,
    transport: SharedTransport,
    outgoing_tx: Sender<Packet>,
    outgoing_rx: Receiver<Packet>,
    sequence: Arc<SequenceCounter>,
    sync_responses: Arc<SyncResponses>,
    notifications: Arc<AsyncResponses>,
    events: Arc<EventBus<SpheroEvent>>,
    stats: Arc<LinkStats>,
    running: AtomicBool,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SpheroDriver {
    /// Create a driver over an open transport
    ///
    /// Nothing is sent until [`SpheroDriver::start`]; packets queued before
    /// that wait in the outgoing queue.
    pub fn new(name: &str, transport: Box<dyn Transport>, config: DriverConfig) -> Self {
        let (outgoing_tx, outgoing_rx) = bounded(config.queue_capacity.max(1));

        Self {
            name: name.to_string(),
            config,
            collision: None,
            collision_configured: AtomicBool::new(false),
            transport: Arc::new(Mutex::new(transport)),
            outgoing_tx,
            outgoing_rx,
            sequence: Arc::new(SequenceCounter::new()),
            sync_responses: Arc::new(SyncResponses::new(SYNC_BUFFER_LIMIT)),
            notifications: Arc::new(AsyncResponses::new()),
            events: Arc::new(EventBus::new()),
            stats: Arc::new(LinkStats::default()),
            running: AtomicBool::new(false),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Collision detection parameters applied by `start`
    pub fn with_collision_config(mut self, config: CollisionConfig) -> Self {
        self.collision = Some(config);
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Spawn the workers and send the startup configuration
    ///
    /// Startup sends collision detection parameters (unless already
    /// configured) and enables stop-on-disconnect.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        self.shutdown.store(false, Ordering::Release);

        if let Err(e) = self.spawn_workers() {
            let _ = self.stop_workers();
            return Err(e);
        }

        if !self.collision_configured.load(Ordering::Acquire) {
            self.configure_collision_detection(self.collision.unwrap_or_default())?;
        }
        self.enable_stop_on_disconnect()?;

        log::info!("Sphero: Driver '{}' started", self.name);
        Ok(())
    }

    fn spawn_workers(&self) -> Result<()> {
        let (sync_tx, sync_rx) = unbounded();
        let mut workers = self.workers.lock();

        let tx = writer::Transmitter {
            transport: Arc::clone(&self.transport),
            sequence: Arc::clone(&self.sequence),
            events: Arc::clone(&self.events),
            stats: Arc::clone(&self.stats),
        };
        let outgoing = self.outgoing_rx.clone();
        let shutdown = Arc::clone(&self.shutdown);
        workers.push(
            thread::Builder::new()
                .name("sphero-tx".to_string())
                .spawn(move || writer::writer_loop(tx, outgoing, shutdown))
                .map_err(|e| Error::Other(format!("Failed to spawn writer thread: {}", e)))?,
        );

        let transport = Arc::clone(&self.transport);
        let shutdown = Arc::clone(&self.shutdown);
        let notifications = Arc::clone(&self.notifications);
        let stats = Arc::clone(&self.stats);
        workers.push(
            thread::Builder::new()
                .name("sphero-rx".to_string())
                .spawn(move || {
                    reader::reader_loop(transport, shutdown, sync_tx, notifications, stats)
                })
                .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?,
        );

        let sync_responses = Arc::clone(&self.sync_responses);
        let shutdown = Arc::clone(&self.shutdown);
        workers.push(
            thread::Builder::new()
                .name("sphero-sync".to_string())
                .spawn(move || collector_loop(sync_rx, sync_responses, shutdown))
                .map_err(|e| Error::Other(format!("Failed to spawn collector thread: {}", e)))?,
        );

        let notifications = Arc::clone(&self.notifications);
        let events = Arc::clone(&self.events);
        let shutdown = Arc::clone(&self.shutdown);
        let interval_ms = self.config.dispatch_interval_ms;
        workers.push(
            thread::Builder::new()
                .name("sphero-async".to_string())
                .spawn(move || {
                    dispatcher::dispatcher_loop(notifications, events, shutdown, interval_ms)
                })
                .map_err(|e| Error::Other(format!("Failed to spawn dispatcher thread: {}", e)))?,
        );

        Ok(())
    }

    fn stop_workers(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let mut panicked = false;
        for handle in handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        self.running.store(false, Ordering::Release);

        if panicked {
            return Err(Error::ThreadPanic);
        }
        Ok(())
    }

    /// Bring the robot to rest and stop the workers
    ///
    /// While the transport is connected and the workers run, `stop` is sent
    /// every `halt_interval_ms` for `halt_duration_ms`. The writer flushes
    /// whatever is still queued before it exits.
    pub fn halt(&self) -> Result<()> {
        log::info!("Sphero: Halting '{}'", self.name);

        if self.is_connected() && self.is_running() {
            let deadline = Instant::now() + Duration::from_millis(self.config.halt_duration_ms);
            let interval = Duration::from_millis(self.config.halt_interval_ms);
            while Instant::now() < deadline {
                if let Err(e) = self.stop() {
                    log::warn!("Sphero: Stop during halt failed: {}", e);
                    break;
                }
                thread::sleep(interval);
            }
        }

        self.stop_workers()?;
        log::info!("Sphero: '{}' halted", self.name);
        Ok(())
    }

    /// Close the transport
    pub fn close(&self) -> Result<()> {
        self.transport.lock().close()
    }

    /// Reopen the transport (closing it first if open)
    pub fn reconnect(&self) -> Result<()> {
        self.transport.lock().reconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.lock().is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event bus carrying `error`, `collision` and `sensordata` events
    pub fn events(&self) -> &EventBus<SpheroEvent> {
        &self.events
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Sequence number the next queued packet will carry
    pub fn sequence(&self) -> u8 {
        self.sequence.current()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Queue a packet for the writer, blocking while the queue is full
    fn enqueue(&self, packet: Packet) -> Result<()> {
        self.outgoing_tx.send(packet).map_err(|_| Error::QueueClosed)
    }

    /// Stamp `command` with the current sequence and queue it
    ///
    /// Blocks until the writer makes room when the outgoing queue is full.
    pub fn send(&self, command: SpheroCommand) -> Result<()> {
        log::debug!("Sphero: Queue {:?}", command);
        self.enqueue(command.to_packet(self.sequence.current()))
    }

    /// Set the main LED color (persisted on the robot)
    pub fn set_rgb(&self, r: u8, g: u8, b: u8) -> Result<()> {
        self.send(SpheroCommand::SetRgb { r, g, b })
    }

    /// Read the main LED color
    ///
    /// Returns `None` when no matching reply arrives within the sync timeout
    /// or the reply is not a color reply.
    pub fn get_rgb(&self) -> Option<[u8; 3]> {
        let packet = SpheroCommand::GetRgb.to_packet(self.sequence.current());
        let sequence = packet.sequence();
        if let Err(e) = self.enqueue(packet) {
            log::warn!("Sphero: GetRGB not sent: {}", e);
            return None;
        }

        let timeout = Duration::from_millis(self.config.sync_timeout_ms);
        match self.sync_responses.wait_for(sequence, timeout) {
            Some(reply) if reply.len() == GET_RGB_REPLY_SIZE => {
                let bytes = reply.as_bytes();
                Some([bytes[5], bytes[6], bytes[7]])
            }
            Some(reply) => {
                log::debug!("Sphero: Unexpected GetRGB reply length {}", reply.len());
                None
            }
            None => {
                LinkStats::bump(&self.stats.sync_timeouts);
                log::debug!("Sphero: GetRGB seq={} timed out", sequence);
                None
            }
        }
    }

    /// Set the back LED brightness
    pub fn set_back_led(&self, level: u8) -> Result<()> {
        self.send(SpheroCommand::SetBackLed(level))
    }

    /// Redefine the current orientation as `heading` degrees
    pub fn set_heading(&self, heading: u16) -> Result<()> {
        self.send(SpheroCommand::SetHeading(heading))
    }

    pub fn set_stabilization(&self, enable: bool) -> Result<()> {
        self.send(SpheroCommand::SetStabilization(enable))
    }

    /// Roll at `speed` toward `heading` degrees
    pub fn roll(&self, speed: u8, heading: u16) -> Result<()> {
        self.send(SpheroCommand::Roll { speed, heading })
    }

    /// Disable streaming, then roll at zero speed
    pub fn stop(&self) -> Result<()> {
        self.set_data_streaming(SENSOR_FREQUENCY_DEFAULT, 0, 0, 0, 0)?;
        self.roll(0, 0)
    }

    pub fn configure_collision_detection(&self, config: CollisionConfig) -> Result<()> {
        self.send(SpheroCommand::ConfigureCollision(config))?;
        self.collision_configured.store(true, Ordering::Release);
        Ok(())
    }

    /// Request sensor streaming
    ///
    /// `freq` is the sample rate in Hz (0 or at/above 420 means 10 Hz),
    /// `frames` the samples per notification (0 means 1), `count` the number
    /// of notifications (0 means forever).
    pub fn set_data_streaming(
        &self,
        freq: u16,
        frames: u16,
        mask: u32,
        count: u8,
        mask2: u32,
    ) -> Result<()> {
        let setting = DataStreamingSetting::new(freq, frames, mask, count, mask2);
        self.send(SpheroCommand::SetDataStreaming(setting))
    }

    /// Make the robot stop when the link drops
    pub fn enable_stop_on_disconnect(&self) -> Result<()> {
        self.send(SpheroCommand::EnableStopOnDisconnect)
    }

    /// Register the named commands of this driver
    pub fn register_commands(
        self: &Arc<Self>,
        registry: &mut CommandRegistry<SpheroReply>,
    ) -> Result<()> {
        let driver = Arc::clone(self);
        registry.register("SetRGB", move |p: RgbParams| {
            driver.set_rgb(p.r, p.g, p.b).map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("Roll", move |p: RollParams| {
            driver.roll(p.speed, p.heading).map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("Stop", move |_: NoParams| {
            driver.stop().map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("GetRGB", move |_: NoParams| {
            Ok(SpheroReply::Rgb(driver.get_rgb()))
        })?;

        let driver = Arc::clone(self);
        registry.register("SetBackLED", move |p: BackLedParams| {
            driver.set_back_led(p.level).map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("SetHeading", move |p: HeadingParams| {
            driver.set_heading(p.heading).map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("SetStabilization", move |p: StabilizationParams| {
            driver.set_stabilization(p.enable).map(|_| SpheroReply::Queued)
        })?;

        let driver = Arc::clone(self);
        registry.register("SetDataStreaming", move |p: DataStreamingParams| {
            driver
                .set_data_streaming(p.freq, p.frames, p.mask, p.count, p.mask2)
                .map(|_| SpheroReply::Queued)
        })?;

        Ok(())
    }

    #[cfg(test)]
    fn take_queued(&self) -> Vec<Packet> {
        self.outgoing_rx.try_iter().collect()
    }
}

impl DeviceDriver for SpheroDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        SpheroDriver::start(self)
    }

    fn halt(&self) -> Result<()> {
        SpheroDriver::halt(self)
    }
}

impl Drop for SpheroDriver {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop_workers();
        }
    }
}

/// Collector loop - moves forwarded replies into the sync buffer
fn collector_loop(replies: Receiver<Frame>, sync: Arc<SyncResponses>, shutdown: Arc<AtomicBool>) {
    let poll = Duration::from_millis(WORKER_POLL_MS);

    while !shutdown.load(Ordering::Relaxed) {
        match replies.recv_timeout(poll) {
            Ok(frame) => sync.push(frame),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!("Sphero: Collector thread exiting");
}

// Registry parameter types

#[derive(Debug, Deserialize)]
struct NoParams {}

#[derive(Debug, Deserialize)]
struct RgbParams {
    r: u8,
    g: u8,
    b: u8,
}

#[derive(Debug, Deserialize)]
struct RollParams {
    speed: u8,
    heading: u16,
}

#[derive(Debug, Deserialize)]
struct BackLedParams {
    level: u8,
}

#[derive(Debug, Deserialize)]
struct HeadingParams {
    heading: u16,
}

#[derive(Debug, Deserialize)]
struct StabilizationParams {
    enable: bool,
}

#[derive(Debug, Deserialize)]
struct DataStreamingParams {
    #[serde(alias = "frequency")]
    freq: u16,
    frames: u16,
    mask: u32,
    #[serde(default)]
    count: u8,
    #[serde(default)]
    mask2: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn driver() -> SpheroDriver {
        SpheroDriver::new(
            "test",
            Box::new(MockTransport::new()),
            DriverConfig::default(),
        )
    }

    #[test]
    fn test_stop_queues_streaming_off_then_roll() {
        let d = driver();
        d.stop().unwrap();

        let queued = d.take_queued();
        assert_eq!(queued.len(), 2);

        assert_eq!(queued[0].command_id(), CMD_SET_DATA_STREAMING);
        assert_eq!(
            queued[0].body(),
            &[0x00, 0x2A, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(queued[1].command_id(), CMD_ROLL);
        assert_eq!(queued[1].body(), &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_streaming_zero_frequency_matches_default() {
        let d = driver();
        d.set_data_streaming(0, 0, 0xF000, 0, 0x0F00).unwrap();
        d.set_data_streaming(10, 1, 0xF000, 0, 0x0F00).unwrap();

        let queued = d.take_queued();
        assert_eq!(queued[0].body(), queued[1].body());
    }

    #[test]
    fn test_packets_carry_current_sequence() {
        let d = driver();
        d.set_back_led(1).unwrap();
        d.sequence.advance();
        d.set_back_led(2).unwrap();

        let queued = d.take_queued();
        assert_eq!(queued[0].sequence(), 0);
        assert_eq!(queued[1].sequence(), 1);
    }

    #[test]
    fn test_full_queue_blocks_until_drained() {
        let config = DriverConfig {
            queue_capacity: 2,
            ..DriverConfig::default()
        };
        let d = Arc::new(SpheroDriver::new(
            "test",
            Box::new(MockTransport::new()),
            config,
        ));
        d.set_heading(0).unwrap();

        // Streaming-off fills the queue, the roll frame has to wait
        let stopper = {
            let d = Arc::clone(&d);
            thread::spawn(move || d.stop())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!stopper.is_finished());

        let mut command_ids = Vec::new();
        while command_ids.len() < 3 {
            let packet = d.outgoing_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            command_ids.push(packet.command_id());
        }
        stopper.join().unwrap().unwrap();

        assert_eq!(
            command_ids,
            vec![CMD_SET_HEADING, CMD_SET_DATA_STREAMING, CMD_ROLL]
        );
        assert!(d.take_queued().is_empty());
    }

    #[test]
    fn test_registry_streaming_keys() {
        let d = Arc::new(driver());
        let mut registry = CommandRegistry::new();
        d.register_commands(&mut registry).unwrap();

        let params: toml::Value = toml::from_str("freq = 0\nframes = 0\nmask = 0").unwrap();
        registry.dispatch("SetDataStreaming", params).unwrap();
        let params: toml::Value =
            toml::from_str("frequency = 10\nframes = 1\nmask = 0").unwrap();
        registry.dispatch("SetDataStreaming", params).unwrap();

        let queued = d.take_queued();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].body(), queued[1].body());
    }

    #[test]
    fn test_registry_dispatch() {
        let d = Arc::new(driver());
        let mut registry = CommandRegistry::new();
        d.register_commands(&mut registry).unwrap();

        let params: toml::Value = toml::from_str("speed = 100\nheading = 90").unwrap();
        assert_eq!(registry.dispatch("Roll", params).unwrap(), SpheroReply::Queued);

        let bad: toml::Value = toml::from_str("speed = 100").unwrap();
        assert!(matches!(
            registry.dispatch("Roll", bad),
            Err(Error::InvalidParameter(_))
        ));

        let queued = d.take_queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].body(), &[100, 0, 90, 1]);

        assert_eq!(
            registry.names(),
            vec![
                "GetRGB",
                "Roll",
                "SetBackLED",
                "SetDataStreaming",
                "SetHeading",
                "SetRGB",
                "SetStabilization",
                "Stop"
            ]
        );
    }

    #[test]
    fn test_halt_without_start_sends_nothing() {
        let mock = MockTransport::new();
        let d = SpheroDriver::new("test", Box::new(mock.clone()), DriverConfig::default());

        d.halt().unwrap();
        assert!(d.take_queued().is_empty());
        assert!(mock.get_written().is_empty());
    }
}
