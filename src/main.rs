//! sphero-io - Sphero robot daemon
//!
//! Connects to the configured robot, starts the protocol workers and logs
//! every event (collisions, sensor samples, transmit errors) until Ctrl-C.
//! On shutdown the robot is brought to rest before the port is closed.

use sphero_io::config::Config;
use sphero_io::core::driver::DeviceDriver;
use sphero_io::core::registry::CommandRegistry;
use sphero_io::devices::create_device;
use sphero_io::devices::sphero::SpheroReply;
use sphero_io::{Error, Result, SpheroEvent};
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `sphero-io <path>` (positional)
/// - `sphero-io --config <path>` (flag-based)
/// - `sphero-io -c <path>` (short flag)
///
/// Defaults to `/etc/sphero.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/sphero.toml".to_string()
}

fn log_event(event: &SpheroEvent) {
    match event {
        SpheroEvent::Error(msg) => log::warn!("Transmit error: {}", msg),
        SpheroEvent::Collision(c) => log::info!(
            "Collision: axis={:#04x} x={} y={} z={} speed={} t={}ms",
            c.axis,
            c.x,
            c.y,
            c.z,
            c.speed,
            c.timestamp
        ),
        SpheroEvent::SensorData(s) => log::debug!(
            "Sensors: imu=({}, {}, {}) odometer=({}, {}) velocity=({}, {})",
            s.imu_pitch,
            s.imu_roll,
            s.imu_yaw,
            s.odometer_x,
            s.odometer_y,
            s.velocity_x,
            s.velocity_y
        ),
    }
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = Config::load(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("sphero-io v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "Device: {} ({}) on {} @ {} baud",
        config.device.name,
        config.device.device_type,
        config.device.port,
        config.device.baud_rate
    );

    let driver = Arc::new(create_device(&config)?);

    let mut registry = CommandRegistry::<SpheroReply>::new();
    driver.register_commands(&mut registry)?;
    log::info!("Commands: {}", registry.names().join(", "));

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let events = driver.events().subscribe_all();
    let event_running = Arc::clone(&running);
    let event_handle = thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || {
            while event_running.load(Ordering::Relaxed) {
                if let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
                    log_event(&event);
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn event logger: {}", e)))?;

    let device: &dyn DeviceDriver = &*driver;
    device.start()?;

    match registry.dispatch("GetRGB", toml::Value::Table(toml::Table::new()))? {
        SpheroReply::Rgb(Some([r, g, b])) => log::info!("LED color: #{:02X}{:02X}{:02X}", r, g, b),
        _ => log::info!("LED color: no reply"),
    }

    log::info!("{} running. Press Ctrl-C to stop.", device.name());
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    device.halt()?;
    driver.close()?;
    if event_handle.join().is_err() {
        log::warn!("Event logger panicked");
    }

    let stats = driver.stats();
    log::info!(
        "Link stats: sent={} received={} checksum_errors={} write_errors={} read_errors={} sync_timeouts={}",
        stats.frames_sent,
        stats.frames_received,
        stats.checksum_errors,
        stats.write_errors,
        stats.read_errors,
        stats.sync_timeouts
    );
    log::info!("sphero-io stopped");
    Ok(())
}
