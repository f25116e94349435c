//! Sphero command encodings
//!
//! Each [`SpheroCommand`] knows its command ID and body; the driver stamps the
//! current sequence number when it turns one into a [`Packet`]. All commands
//! address the Sphero device ID (0x02).
//!
//! | command                 | CID  | body                                  |
//! |-------------------------|------|---------------------------------------|
//! | SetHeading              | 0x01 | heading u16                           |
//! | SetStabilization        | 0x02 | 0x01 on / 0x00 off                    |
//! | SetDataStreaming        | 0x11 | N u16, M u16, MASK u32, PCNT, MASK2   |
//! | ConfigureCollision      | 0x12 | method, Xt, Yt, Xspd, Yspd, dead time |
//! | SetRgb                  | 0x20 | r, g, b, 0x01 (persist)               |
//! | SetBackLed              | 0x21 | brightness                            |
//! | GetRgb                  | 0x22 | (empty)                               |
//! | Roll                    | 0x30 | speed, heading u16, 0x01 (go)         |
//! | EnableStopOnDisconnect  | 0x37 | 00 00 00 01                           |

use super::constants::*;
use super::messages::{CollisionConfig, DataStreamingSetting};
use super::packet::Packet;

/// Commands understood by the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpheroCommand {
    SetRgb { r: u8, g: u8, b: u8 },
    GetRgb,
    SetBackLed(u8),
    SetHeading(u16),
    SetStabilization(bool),
    Roll { speed: u8, heading: u16 },
    ConfigureCollision(CollisionConfig),
    SetDataStreaming(DataStreamingSetting),
    EnableStopOnDisconnect,
}

impl SpheroCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            SpheroCommand::SetRgb { .. } => CMD_SET_RGB,
            SpheroCommand::GetRgb => CMD_GET_RGB,
            SpheroCommand::SetBackLed(_) => CMD_SET_BACK_LED,
            SpheroCommand::SetHeading(_) => CMD_SET_HEADING,
            SpheroCommand::SetStabilization(_) => CMD_SET_STABILIZATION,
            SpheroCommand::Roll { .. } => CMD_ROLL,
            SpheroCommand::ConfigureCollision(_) => CMD_CONFIGURE_COLLISION,
            SpheroCommand::SetDataStreaming(_) => CMD_SET_DATA_STREAMING,
            SpheroCommand::EnableStopOnDisconnect => CMD_SET_OPTION_FLAGS,
        }
    }

    pub fn body(&self) -> Vec<u8> {
        match *self {
            SpheroCommand::SetRgb { r, g, b } => vec![r, g, b, 0x01],
            SpheroCommand::GetRgb => Vec::new(),
            SpheroCommand::SetBackLed(level) => vec![level],
            SpheroCommand::SetHeading(heading) => heading.to_be_bytes().to_vec(),
            SpheroCommand::SetStabilization(on) => vec![u8::from(on)],
            SpheroCommand::Roll { speed, heading } => {
                let [hi, lo] = heading.to_be_bytes();
                vec![speed, hi, lo, 0x01]
            }
            SpheroCommand::ConfigureCollision(config) => config.to_body(),
            SpheroCommand::SetDataStreaming(setting) => setting.to_body(),
            SpheroCommand::EnableStopOnDisconnect => vec![0x00, 0x00, 0x00, 0x01],
        }
    }

    /// Encode with the given sequence number
    pub fn to_packet(&self, sequence: u8) -> Packet {
        Packet::new(DID_SPHERO, self.command_id(), sequence, self.body())
    }
}
