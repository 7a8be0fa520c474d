//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations of the controller transport and of the
//! extension payload streams.

mod controller;
mod payload_stream;

pub use controller::{FnControllerTransport, SendFn};
pub use payload_stream::{BufferedPayloadReader, BufferedPayloadWriter};
