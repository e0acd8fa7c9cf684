use crate::core::{AddressSwitch, UniverseAddress};

/// Art-Net operation codes understood by the node.
///
/// `Unknown` carries any code that reached the dispatcher without being
/// recognised; the node reports it as `Nop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Not an Art-Net datagram, or nothing to act on
    Nop,
    /// ArtPoll discovery request
    Poll,
    /// ArtPollReply from another node
    PollReply,
    /// ArtDmx levels, or levels changed by a configuration command
    Dmx,
    /// ArtAddress configuration
    Address,
    /// Any other code
    Unknown(u16),
}

impl OpCode {
    pub const NOP: u16 = 0x0000;
    pub const POLL: u16 = 0x2000;
    pub const POLL_REPLY: u16 = 0x2100;
    pub const DMX: u16 = 0x5000;
    pub const ADDRESS: u16 = 0x6000;

    /// Maps a wire code to its variant
    pub fn from_code(code: u16) -> Self {
        match code {
            Self::NOP => OpCode::Nop,
            Self::POLL => OpCode::Poll,
            Self::POLL_REPLY => OpCode::PollReply,
            Self::DMX => OpCode::Dmx,
            Self::ADDRESS => OpCode::Address,
            other => OpCode::Unknown(other),
        }
    }

    /// The wire code
    pub fn code(&self) -> u16 {
        match *self {
            OpCode::Nop => Self::NOP,
            OpCode::Poll => Self::POLL,
            OpCode::PollReply => Self::POLL_REPLY,
            OpCode::Dmx => Self::DMX,
            OpCode::Address => Self::ADDRESS,
            OpCode::Unknown(code) => code,
        }
    }
}

impl From<OpCode> for u16 {
    fn from(op: OpCode) -> u16 {
        op.code()
    }
}

/// The command byte of an ArtAddress datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCommand {
    /// No action
    None,
    /// Release the merge lock so any sender can take over
    CancelMerge,
    /// Zero the output buffer
    ClearOutput,
    /// Recognised on the wire but not acted on by this node
    Other(u8),
}

impl AddressCommand {
    pub const NONE: u8 = 0x00;
    pub const CANCEL_MERGE: u8 = 0x01;
    pub const CLEAR_OUTPUT: u8 = 0x90;

    /// Decodes a command byte
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            Self::NONE => AddressCommand::None,
            Self::CANCEL_MERGE => AddressCommand::CancelMerge,
            Self::CLEAR_OUTPUT => AddressCommand::ClearOutput,
            other => AddressCommand::Other(other),
        }
    }
}

/// Borrowed view of a received ArtDmx datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmxView<'a> {
    /// Sender's sequence number; not enforced on receipt
    pub sequence: u8,
    /// Sender's physical input port
    pub physical: u8,
    /// Subnet/universe byte the levels are addressed to
    pub universe: UniverseAddress,
    /// Net byte; this node only listens on net 0
    pub net: u8,
    /// Levels for slots 1..=len, length already clamped
    pub data: &'a [u8],
}

/// Decoded ArtAddress datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressView {
    /// New short name, if the field is not empty
    pub short_name: Option<String>,
    /// New long name, if the field is not empty
    pub long_name: Option<String>,
    /// Switch for the universe nibble (output port 0)
    pub universe: AddressSwitch,
    /// Switch for the subnet nibble
    pub subnet: AddressSwitch,
    /// Command to execute
    pub command: AddressCommand,
}

/// Everything a poll reply advertises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReply<'a> {
    pub address: std::net::Ipv4Addr,
    pub port: u16,
    pub firmware_version: u16,
    pub universe: UniverseAddress,
    pub oem_code: u16,
    pub esta_code: u16,
    /// GoodOutput status for port 0
    pub status: u8,
    pub short_name: &'a str,
    pub long_name: &'a str,
    pub node_report: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_mapping() {
        assert_eq!(OpCode::from_code(0x2000), OpCode::Poll);
        assert_eq!(OpCode::from_code(0x2100), OpCode::PollReply);
        assert_eq!(OpCode::from_code(0x5000), OpCode::Dmx);
        assert_eq!(OpCode::from_code(0x6000), OpCode::Address);
        assert_eq!(OpCode::from_code(0), OpCode::Nop);
        assert_eq!(OpCode::from_code(0x9700), OpCode::Unknown(0x9700));
        assert_eq!(u16::from(OpCode::Unknown(0x9700)), 0x9700);
        assert_eq!(OpCode::Dmx.code(), 0x5000);
    }

    #[test]
    fn test_address_command_mapping() {
        assert_eq!(AddressCommand::from_wire(0x00), AddressCommand::None);
        assert_eq!(AddressCommand::from_wire(0x01), AddressCommand::CancelMerge);
        assert_eq!(AddressCommand::from_wire(0x90), AddressCommand::ClearOutput);
        assert_eq!(AddressCommand::from_wire(0x04), AddressCommand::Other(0x04));
    }
}
