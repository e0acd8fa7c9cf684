//! Core types for the Art-Net node
//!
//! Addressing, merge lock, slot storage, node identity and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use self::config::NodeConfig;
pub use self::error::{Error, Result};
pub use self::types::{
    AddressSwitch,
    MergeLock,
    NodeIdentity,
    NodeNames,
    SlotBuffer,
    UniverseAddress,
};

/// Number of slots in one DMX universe
pub const MAX_SLOTS: usize = 512;

/// Longest short name that fits its 18 byte wire field with a terminator
pub const SHORT_NAME_MAX: usize = 17;

/// Longest long name that fits its 64 byte wire field with a terminator
pub const LONG_NAME_MAX: usize = 63;
