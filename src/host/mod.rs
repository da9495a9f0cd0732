//! Newline-delimited JSON bridge for hosting the voice core in a native shell.

pub mod bridge;
pub mod contract;
pub mod engines;
pub mod stdio;

pub use bridge::HostBridge;
pub use engines::HostEngines;
