use bytes::{Buf, BufMut};

use super::message::{AddressCommand, AddressView, DmxView, OpCode, PollReply};
use super::{
    ADDRESS_SIZE, ARTNET_BUFFER_MAX, ARTNET_ID, ARTNET_REPLY_SIZE, DMX_HEADER_SIZE, HEADER_SIZE,
    PROTOCOL_VERSION,
};
use crate::core::{AddressSwitch, UniverseAddress, MAX_SLOTS};
use crate::util::{read_name, write_name};

// ArtAddress field offsets
const ADDRESS_SHORT_NAME: usize = 14;
const ADDRESS_LONG_NAME: usize = 32;
const ADDRESS_SW_IN: usize = 96;
const ADDRESS_SW_OUT: usize = 100;
const ADDRESS_SUB_SWITCH: usize = 104;
const ADDRESS_COMMAND: usize = 106;

// ArtPollReply field offsets
const REPLY_SHORT_NAME: usize = 26;
const REPLY_LONG_NAME: usize = 44;
const REPLY_NODE_REPORT: usize = 108;
const REPLY_NUM_PORTS: usize = 172;
const REPLY_PORT_TYPES: usize = 174;
const REPLY_GOOD_OUTPUT: usize = 182;
const REPLY_SW_OUT: usize = 190;

/// Port type bit: the port can output DMX from the network
const PORT_OUTPUT: u8 = 0x80;

/// Checks the signature and returns the opcode of a datagram.
///
/// Anything shorter than the header or without the `Art-Net` signature
/// is `Nop`.
pub fn parse_header(packet: &[u8]) -> OpCode {
    if packet.len() < HEADER_SIZE || &packet[..ARTNET_ID.len()] != ARTNET_ID {
        return OpCode::Nop;
    }
    let mut op = &packet[ARTNET_ID.len()..HEADER_SIZE];
    OpCode::from_code(op.get_u16_le())
}

/// Parses the fields of an ArtDmx datagram whose header was already
/// checked.
///
/// The declared length is clamped to the bytes present, to 512 and down
/// to an even count.
pub fn parse_dmx(packet: &[u8]) -> Option<DmxView<'_>> {
    if packet.len() < DMX_HEADER_SIZE {
        return None;
    }
    let mut buf = &packet[12..DMX_HEADER_SIZE];
    let sequence = buf.get_u8();
    let physical = buf.get_u8();
    let universe = UniverseAddress(buf.get_u8());
    let net = buf.get_u8();
    let declared = buf.get_u16() as usize;

    let available = packet.len() - DMX_HEADER_SIZE;
    let len = declared.min(available).min(MAX_SLOTS) & !1;

    Some(DmxView {
        sequence,
        physical,
        universe,
        net,
        data: &packet[DMX_HEADER_SIZE..DMX_HEADER_SIZE + len],
    })
}

/// Parses an ArtAddress datagram whose header was already checked.
pub fn parse_address(packet: &[u8]) -> Option<AddressView> {
    if packet.len() < ADDRESS_SIZE {
        return None;
    }
    Some(AddressView {
        short_name: read_name(&packet[ADDRESS_SHORT_NAME..ADDRESS_LONG_NAME]),
        long_name: read_name(&packet[ADDRESS_LONG_NAME..ADDRESS_SW_IN]),
        universe: AddressSwitch::from_wire(packet[ADDRESS_SW_OUT]),
        subnet: AddressSwitch::from_wire(packet[ADDRESS_SUB_SWITCH]),
        command: AddressCommand::from_wire(packet[ADDRESS_COMMAND]),
    })
}

/// Writes an ArtDmx datagram into `out` and returns its length.
///
/// An odd number of levels is padded with one zero so the length on the
/// wire is always even. `out` must hold at least 18 bytes plus the padded
/// levels; at most 512 levels are written.
pub fn write_dmx(out: &mut [u8], sequence: u8, universe: UniverseAddress, levels: &[u8]) -> usize {
    let levels = &levels[..levels.len().min(MAX_SLOTS)];
    let pad = levels.len() & 1;
    let wire_len = levels.len() + pad;
    let len = DMX_HEADER_SIZE + wire_len;
    debug_assert!(len <= ARTNET_BUFFER_MAX);

    let mut buf = &mut out[..len];
    buf.put_slice(ARTNET_ID);
    buf.put_u16_le(OpCode::DMX);
    buf.put_u16(PROTOCOL_VERSION);
    buf.put_u8(sequence);
    buf.put_u8(0); // physical
    buf.put_u8(universe.as_byte());
    buf.put_u8(0); // net
    buf.put_u16(wire_len as u16);
    buf.put_slice(levels);
    buf.put_bytes(0, pad);
    len
}

/// Writes a 239 byte ArtPollReply into `out` and returns its length.
pub fn write_poll_reply(out: &mut [u8], reply: &PollReply<'_>) -> usize {
    let packet = &mut out[..ARTNET_REPLY_SIZE];
    packet.fill(0);

    {
        let mut buf = &mut packet[..REPLY_SHORT_NAME];
        buf.put_slice(ARTNET_ID);
        buf.put_u16_le(OpCode::POLL_REPLY);
        buf.put_slice(&reply.address.octets());
        buf.put_u16_le(reply.port);
        buf.put_u16(reply.firmware_version);
        buf.put_u8(0); // net switch
        buf.put_u8(reply.universe.subnet());
        buf.put_u16(reply.oem_code);
        buf.put_u8(0); // ubea version
        buf.put_u8(0); // status1
        buf.put_u16_le(reply.esta_code);
    }

    write_name(&mut packet[REPLY_SHORT_NAME..REPLY_LONG_NAME], reply.short_name);
    write_name(&mut packet[REPLY_LONG_NAME..REPLY_NODE_REPORT], reply.long_name);
    write_name(&mut packet[REPLY_NODE_REPORT..REPLY_NUM_PORTS], reply.node_report);

    let mut ports = &mut packet[REPLY_NUM_PORTS..REPLY_PORT_TYPES + 1];
    ports.put_u16(1);
    ports.put_u8(PORT_OUTPUT);

    packet[REPLY_GOOD_OUTPUT] = reply.status;
    packet[REPLY_SW_OUT] = reply.universe.universe();

    ARTNET_REPLY_SIZE
}
