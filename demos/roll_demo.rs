//! Roll a Sphero in a square while logging collisions and sensor samples
//!
//! Test sequence:
//! 1. Connect and start the driver
//! 2. Read back the LED color, then set it green
//! 3. Stream every sensor field at 10 Hz
//! 4. Roll a square (four legs, 90° apart)
//! 5. Halt and close
//!
//! Run against a paired robot:
//! ```sh
//! RUST_LOG=info cargo run --example roll_demo -- /dev/rfcomm0
//! ```

use sphero_io::SpheroDriver;
use sphero_io::config::DriverConfig;
use sphero_io::devices::sphero::SpheroEvent;
use sphero_io::transport::SerialTransport;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/rfcomm0".to_string());

    log::info!("=== Sphero Roll Demo ===");

    // === 1. Connect ===
    let transport = SerialTransport::open(&port, 115_200)?;
    let sphero = SpheroDriver::new("demo", Box::new(transport), DriverConfig::default());
    let events = sphero.events().subscribe_all();
    sphero.start()?;
    log::info!("1. Driver started on {}", port);

    // === 2. LED ===
    match sphero.get_rgb() {
        Some([r, g, b]) => log::info!("2. Current color #{:02X}{:02X}{:02X}", r, g, b),
        None => log::warn!("2. No reply to GetRGB"),
    }
    sphero.set_rgb(0, 255, 0)?;
    sphero.set_back_led(0xFF)?;

    // === 3. Streaming ===
    // Only full 90-byte samples are published as `sensordata`, so request
    // every field even though the log below prints a few of them
    sphero.set_data_streaming(10, 1, u32::MAX, 0, u32::MAX)?;
    log::info!("3. Streaming all sensor fields");

    // === 4. Square ===
    for leg in 0..4u16 {
        let heading = leg * 90;
        log::info!("4. Leg {} heading {}°", leg + 1, heading);
        sphero.roll(60, heading)?;

        for _ in 0..15 {
            thread::sleep(Duration::from_millis(100));
            for event in events.try_iter() {
                match event {
                    SpheroEvent::Collision(c) => {
                        log::info!("   Collision: speed={} axis={:#04x}", c.speed, c.axis)
                    }
                    SpheroEvent::SensorData(s) => log::info!(
                        "   IMU pitch={} roll={} yaw={} v=({}, {})",
                        s.imu_pitch,
                        s.imu_roll,
                        s.imu_yaw,
                        s.velocity_x,
                        s.velocity_y
                    ),
                    SpheroEvent::Error(e) => log::warn!("   Error: {}", e),
                }
            }
        }
    }

    // === 5. Shutdown ===
    sphero.halt()?;
    sphero.close()?;
    log::info!("5. Done: {:?}", sphero.stats());
    Ok(())
}
