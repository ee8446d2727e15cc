//! Shared pieces of the MockRobot driver: the wire codec, the operation model
//! and the error taxonomy. Nothing in here performs I/O.

pub mod messages;
pub use messages::*;

pub mod codec;

pub mod error;
pub use error::{
    ConnectionError, DriverError, ProtocolError, Result, SequenceError, ValidationError,
};

pub mod operations;
pub use operations::{Operation, OperationRequest, ParameterName};
