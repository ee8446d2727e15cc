//! Codecs for the MockRobot wire protocol.

mod text;

pub use text::{PercentCodec, SEPARATOR, decode_command, decode_process_id, decode_status, encode};
