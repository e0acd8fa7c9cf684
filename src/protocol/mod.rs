//! Protocol implementation module
//!
//! This module defines the Art-Net operation codes, the byte-level
//! encoding/decoding of the datagrams a node handles, and the node engine
//! that applies them.

pub mod codec;
pub mod message;
pub mod node;

pub use self::message::{AddressCommand, AddressView, DmxView, OpCode, PollReply};
pub use self::node::{ArtNetNode, NodeStats};

// Constants
/// UDP port used by Art-Net
pub const ARTNET_PORT: u16 = 0x1936;

/// Datagram buffer capacity: DMX header plus 512 slots
pub const ARTNET_BUFFER_MAX: usize = 530;

/// Fixed size of an ArtPollReply datagram
pub const ARTNET_REPLY_SIZE: usize = 239;

/// Signature at the start of every Art-Net datagram
pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";

/// Length of signature plus opcode
pub const HEADER_SIZE: usize = 10;

/// Length of the ArtDmx header preceding the levels
pub const DMX_HEADER_SIZE: usize = 18;

/// Minimum length of an ArtAddress datagram
pub const ADDRESS_SIZE: usize = 107;

/// Protocol version sent in outgoing datagrams
pub const PROTOCOL_VERSION: u16 = 14;
