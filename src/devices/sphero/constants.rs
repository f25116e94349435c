//! Constants for the Sphero packet protocol

// Start-of-packet bytes
pub const SOP1: u8 = 0xFF;
pub const SOP2_SYNC: u8 = 0xFF; // Command frames and synchronous replies
pub const SOP2_ASYNC: u8 = 0xFE; // Asynchronous notifications

// Device IDs
pub const DID_SPHERO: u8 = 0x02;

// Sphero command IDs (DID 0x02)
pub const CMD_SET_HEADING: u8 = 0x01;
pub const CMD_SET_STABILIZATION: u8 = 0x02;
pub const CMD_SET_DATA_STREAMING: u8 = 0x11;
pub const CMD_CONFIGURE_COLLISION: u8 = 0x12;
pub const CMD_SET_RGB: u8 = 0x20;
pub const CMD_SET_BACK_LED: u8 = 0x21;
pub const CMD_GET_RGB: u8 = 0x22;
pub const CMD_ROLL: u8 = 0x30;
pub const CMD_SET_OPTION_FLAGS: u8 = 0x37; // Bit 0 = stop on disconnect

// Async notification ID codes
pub const ASYNC_ID_SENSOR_DATA: u8 = 0x03;
pub const ASYNC_ID_COLLISION: u8 = 0x07;

// Frame sizes
pub const COMMAND_HEADER_SIZE: usize = 6; // SOP1 SOP2 DID CID SEQ DLEN
pub const RESPONSE_HEADER_SIZE: usize = 5; // SOP1 SOP2 MRSP/ID SEQ/DLEN_MSB DLEN
pub const MIN_REPLY_WITH_DATA: usize = 7; // Sync replies must exceed 6 bytes to match
pub const RECEIVE_BUFFER_SIZE: usize = 1024;
pub const MAX_SYNC_FRAME_SIZE: usize = RESPONSE_HEADER_SIZE + u8::MAX as usize;
pub const MAX_ASYNC_FRAME_SIZE: usize = RECEIVE_BUFFER_SIZE; // Aggregated streaming can exceed one sample
pub const COLLISION_FRAME_SIZE: usize = 22;
pub const COLLISION_DLEN: u8 = 17;
pub const SENSOR_DATA_FRAME_SIZE: usize = 90;
pub const GET_RGB_REPLY_SIZE: usize = 9;

// Data streaming
pub const SENSOR_FREQUENCY_MAX: u16 = 420;
pub const SENSOR_FREQUENCY_DEFAULT: u16 = 10;

// Streaming mask (first word)
pub const MASK_ACCEL_RAW: u32 = 0xE000_0000;
pub const MASK_GYRO_RAW: u32 = 0x1C00_0000;
pub const MASK_MOTOR_EMF_RAW: u32 = 0x0060_0000;
pub const MASK_MOTOR_PWM_RAW: u32 = 0x0018_0000;
pub const MASK_IMU_ANGLES: u32 = 0x0007_0000;
pub const MASK_ACCEL_FILTERED: u32 = 0x0000_E000;
pub const MASK_GYRO_FILTERED: u32 = 0x0000_1C00;
pub const MASK_MOTOR_EMF_FILTERED: u32 = 0x0000_0060;

// Streaming mask (second word)
pub const MASK2_QUATERNION: u32 = 0xF000_0000;
pub const MASK2_LOCATOR: u32 = 0x0C00_0000;
pub const MASK2_ACCEL_ONE: u32 = 0x0200_0000;
pub const MASK2_VELOCITY: u32 = 0x0180_0000;

// Collision detection defaults
pub const COLLISION_METHOD_DEFAULT: u8 = 0x01;
pub const COLLISION_THRESHOLD_DEFAULT: u8 = 0x80;
pub const COLLISION_SPEED_DEFAULT: u8 = 0x80;
pub const COLLISION_DEAD_TIME_DEFAULT: u8 = 0x60;

// Worker timing
pub const OUTGOING_QUEUE_CAPACITY: usize = 1024;
pub const SYNC_RESPONSE_TIMEOUT_MS: u64 = 50;
pub const SYNC_BUFFER_LIMIT: usize = 64;
pub const DISPATCH_INTERVAL_MS: u64 = 100;
pub const HALT_DURATION_MS: u64 = 1000;
pub const HALT_INTERVAL_MS: u64 = 10;
pub const READ_IDLE_SLEEP_MS: u64 = 1;
pub const READ_ERROR_BACKOFF_MS: u64 = 10;
pub const WORKER_POLL_MS: u64 = 20;
