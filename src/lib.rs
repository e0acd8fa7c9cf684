//! LX Art-Net: a single universe Art-Net node
//!
//! This library decodes and encodes the Art-Net datagrams a DMX output node
//! deals with. It accepts ArtDmx levels for one subnet/universe from the
//! first sender it hears (until an ArtAddress cancel merge), answers ArtPoll
//! discovery with an ArtPollReply, and can send its own levels as ArtDmx.
//!
//! The [`ArtNetNode`] engine is synchronous and owns no socket; a
//! [`network::Transport`] or the tokio based [`network::NodeService`]
//! moves datagrams for it.

pub mod core;
pub mod network;
pub mod protocol;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Error, NodeConfig, Result, UniverseAddress};
pub use crate::protocol::{ArtNetNode, OpCode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
