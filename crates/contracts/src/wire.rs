//! 线上协议常量
//!
//! 无版本号。整数与浮点均为小端。

/// Stream framing: Info frame starts with the node type (ASCII STX)
pub const NODE_TYPE_SENSOR: u8 = 0x02;

/// Stream framing: terminates the device name in the Info frame (ASCII ETX)
pub const NAME_TERMINATOR: u8 = 0x03;

/// Stream framing: one Parameter frame, `period:u32 batch:u8`
pub const STREAM_PARAMETER_FRAME_SIZE: usize = 5;

/// Datagram framing: exact size of SET_SENSOR_PARAMETERS
pub const SET_PARAMETERS_FRAME_SIZE: usize = 7;

/// Size of the clock offset field in the Info frame
pub const CLOCK_OFFSET_SIZE: usize = 8;

/// Client → server type bytes (datagram framing)
pub mod client {
    pub const KEEP_ALIVE: u8 = 0x00;
    pub const INFO: u8 = 0x01;
    pub const SENSOR_SAMPLES: u8 = 0x02;
    pub const ACK: u8 = 0x03;
}

/// Server → client type bytes (datagram framing)
pub mod server {
    pub const REQUEST_INFO: u8 = 0x00;
    pub const SET_SENSOR_PARAMETERS: u8 = 0x01;
}
