//! Device implementations

pub mod sphero;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::SerialTransport;
use sphero::SpheroDriver;

/// Create a device driver based on configuration
///
/// Opens the configured serial port; the driver is returned unstarted.
pub fn create_device(config: &Config) -> Result<SpheroDriver> {
    match config.device.device_type.as_str() {
        "sphero" => {
            let transport = SerialTransport::open(&config.device.port, config.device.baud_rate)?;
            let mut driver = SpheroDriver::new(
                &config.device.name,
                Box::new(transport),
                config.driver.clone(),
            );
            if let Some(collision) = config.collision {
                driver = driver.with_collision_config(collision);
            }
            Ok(driver)
        }
        _ => Err(Error::UnknownDevice(config.device.device_type.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_device_type() {
        let mut config = Config::default();
        config.device.device_type = "ollie-ble".to_string();

        assert!(matches!(
            create_device(&config),
            Err(Error::UnknownDevice(t)) if t == "ollie-ble"
        ));
    }
}
