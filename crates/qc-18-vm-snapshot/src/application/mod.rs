//! # Application Layer
//!
//! The snapshot coordinator and the restore path.

mod action_channel;
mod active;
mod restore;
mod staging;
mod synchronizer;

pub use synchronizer::VmSnapshotter;
