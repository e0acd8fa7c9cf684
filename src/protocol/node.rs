use std::net::Ipv4Addr;

use tracing::{debug, trace};

use super::codec;
use super::message::{AddressCommand, AddressView, OpCode, PollReply};
use super::{ARTNET_BUFFER_MAX, ARTNET_PORT};
use crate::core::{
    AddressSwitch, MergeLock, NodeConfig, NodeIdentity, NodeNames, Result, SlotBuffer,
    UniverseAddress,
};
use crate::network::Transport;

/// Sequence number of the first ArtDmx datagram sent
pub const INITIAL_SEQUENCE: u8 = 1;

/// GoodOutput bit reported while a sender holds the merge lock
const STATUS_OUTPUTTING: u8 = 0x80;

/// Node report status code for "power on tests successful"
const REPORT_POWER_OK: u16 = 0x0001;

/// Counters kept while decoding and encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// ArtDmx datagrams copied into the slot buffer
    pub dmx_accepted: u64,
    /// ArtDmx datagrams for another universe
    pub dmx_foreign_universe: u64,
    /// ArtDmx datagrams from a sender other than the merge lock holder
    pub dmx_merge_rejected: u64,
    /// Datagrams with a valid header but truncated fields
    pub malformed: u64,
    /// Datagrams that were not Art-Net or carried an unhandled opcode
    pub ignored: u64,
    /// ArtDmx datagrams encoded for sending
    pub dmx_sent: u64,
    /// ArtPollReply datagrams encoded
    pub poll_replies: u64,
}

/// Single universe Art-Net node.
///
/// The node owns one datagram buffer that holds whatever was last received
/// or encoded, and a separate slot buffer for the DMX levels. It never
/// blocks; the owner feeds it datagrams and transmits what it encodes.
///
/// DMX is only accepted from the first sender seen. Others are ignored
/// until an ArtAddress cancel merge command (or [`ArtNetNode::cancel_merge`])
/// releases the lock.
pub struct ArtNetNode {
    packet: [u8; ARTNET_BUFFER_MAX],
    slots: SlotBuffer,
    universe: UniverseAddress,
    sequence: u8,
    merge: MergeLock,
    identity: NodeIdentity,
    names: NodeNames,
    firmware_version: u16,
    oem_code: u16,
    esta_code: u16,
    stats: NodeStats,
}

impl ArtNetNode {
    /// Creates a node that answers polls by unicast to the poller
    pub fn new(address: Ipv4Addr) -> Self {
        Self::with_identity(NodeIdentity::new(address))
    }

    /// Creates a node that broadcasts poll replies on the masked network
    pub fn with_subnet_mask(address: Ipv4Addr, subnet_mask: Ipv4Addr) -> Self {
        Self::with_identity(NodeIdentity::with_subnet_mask(address, subnet_mask))
    }

    /// Creates a node from a validated configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        config.validate()?;
        let identity = match config.subnet_mask {
            Some(mask) => NodeIdentity::with_subnet_mask(config.address, mask),
            None => NodeIdentity::new(config.address),
        };
        let mut node = Self::with_identity(identity);
        node.universe = UniverseAddress(config.universe);
        node.names = config.names.clone();
        node.firmware_version = config.firmware_version;
        node.oem_code = config.oem_code;
        node.esta_code = config.esta_code;
        Ok(node)
    }

    fn with_identity(identity: NodeIdentity) -> Self {
        let defaults = NodeConfig::default();
        ArtNetNode {
            packet: [0; ARTNET_BUFFER_MAX],
            slots: SlotBuffer::new(),
            universe: UniverseAddress::default(),
            sequence: INITIAL_SEQUENCE,
            merge: MergeLock::Unlocked,
            identity,
            names: defaults.names,
            firmware_version: defaults.firmware_version,
            oem_code: defaults.oem_code,
            esta_code: defaults.esta_code,
            stats: NodeStats::default(),
        }
    }

    /// UDP port used by the protocol
    pub fn dmx_port(&self) -> u16 {
        ARTNET_PORT
    }

    /// Combined subnet/universe byte
    pub fn universe(&self) -> u8 {
        self.universe.as_byte()
    }

    /// Subnet/universe address
    pub fn universe_address(&self) -> UniverseAddress {
        self.universe
    }

    /// Replaces the universe nibble, keeping the subnet
    pub fn set_universe(&mut self, universe: u8) {
        self.universe = self.universe.with_universe(universe);
        debug!(universe = %self.universe, "universe set");
    }

    /// Replaces both nibbles
    pub fn set_subnet_universe(&mut self, subnet: u8, universe: u8) {
        self.universe = UniverseAddress::new(subnet, universe);
        debug!(universe = %self.universe, "subnet and universe set");
    }

    /// Applies an ArtAddress style universe byte: 0x7f is no change, a set
    /// top bit programs the low nibble, anything else is ignored.
    pub fn set_universe_address(&mut self, universe: u8) {
        self.apply_universe_switch(AddressSwitch::from_wire(universe));
    }

    /// Applies an ArtAddress style subnet byte, same rules as
    /// [`ArtNetNode::set_universe_address`].
    pub fn set_subnet_address(&mut self, subnet: u8) {
        self.apply_subnet_switch(AddressSwitch::from_wire(subnet));
    }

    fn apply_universe_switch(&mut self, switch: AddressSwitch) {
        if let AddressSwitch::SetTo(universe) = switch {
            self.set_universe(universe);
        }
    }

    fn apply_subnet_switch(&mut self, switch: AddressSwitch) {
        if let AddressSwitch::SetTo(subnet) = switch {
            self.universe = self.universe.with_subnet(subnet);
            debug!(universe = %self.universe, "subnet set");
        }
    }

    /// Number of active slots
    pub fn number_of_slots(&self) -> usize {
        self.slots.active()
    }

    /// Sets the number of active slots. Counts outside 1..=512 are
    /// rejected and return false.
    pub fn set_number_of_slots(&mut self, count: usize) -> bool {
        self.slots.set_active(count)
    }

    /// Level of a 1-based slot, 0 when out of range
    pub fn get_slot(&self, slot: usize) -> u8 {
        self.slots.get(slot)
    }

    /// Sets a 1-based slot; out of range slots are ignored
    pub fn set_slot(&mut self, slot: usize, value: u8) {
        self.slots.set(slot, value);
    }

    /// Replaces the active levels. Rejected unless 1..=512 levels are given.
    pub fn set_levels(&mut self, levels: &[u8]) -> bool {
        if !self.slots.set_active(levels.len()) {
            return false;
        }
        self.slots.levels_mut().copy_from_slice(levels);
        true
    }

    /// Active levels, slot 1 first
    pub fn dmx_data(&self) -> &[u8] {
        self.slots.levels()
    }

    /// Mutable access to the active levels
    pub fn dmx_data_mut(&mut self) -> &mut [u8] {
        self.slots.levels_mut()
    }

    /// The slot buffer
    pub fn slots(&self) -> &SlotBuffer {
        &self.slots
    }

    /// Current merge lock
    pub fn merge_lock(&self) -> MergeLock {
        self.merge
    }

    /// Releases the merge lock so the next sender takes over
    pub fn cancel_merge(&mut self) {
        if let Some(sender) = self.merge.sender() {
            debug!(%sender, "merge lock cancelled");
        }
        self.merge.cancel();
    }

    /// Sequence number the next ArtDmx datagram will carry
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// The node's address and broadcast address
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Names reported in poll replies
    pub fn names(&self) -> &NodeNames {
        &self.names
    }

    /// Replaces the names reported in poll replies
    pub fn set_names(&mut self, names: NodeNames) {
        self.names = names;
    }

    /// Diagnostic counters
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// The datagram buffer, for a transport to receive into
    pub fn packet_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.packet
    }

    /// Copies a datagram into the node and decodes it.
    ///
    /// Bytes past the buffer capacity are dropped.
    pub fn decode_datagram(&mut self, datagram: &[u8], source: Ipv4Addr) -> OpCode {
        let len = datagram.len().min(ARTNET_BUFFER_MAX);
        self.packet[..len].copy_from_slice(&datagram[..len]);
        self.decode(len, source)
    }

    /// Decodes the first `len` bytes of the datagram buffer, received from
    /// `source`.
    ///
    /// Returns `Dmx` whenever a structurally valid ArtDmx datagram arrives,
    /// even when it was for another universe or was locked out, and when an
    /// ArtAddress command reset the levels. Anything unrecognised is `Nop`.
    pub fn decode(&mut self, len: usize, source: Ipv4Addr) -> OpCode {
        let len = len.min(ARTNET_BUFFER_MAX);
        let opcode = codec::parse_header(&self.packet[..len]);
        trace!(?opcode, len, %source, "datagram received");

        match opcode {
            OpCode::Dmx => self.apply_dmx(len, source),
            OpCode::Address => self.apply_address(len),
            OpCode::Poll | OpCode::PollReply => opcode,
            OpCode::Nop | OpCode::Unknown(_) => {
                self.stats.ignored += 1;
                OpCode::Nop
            }
        }
    }

    fn apply_dmx(&mut self, len: usize, source: Ipv4Addr) -> OpCode {
        let view = match codec::parse_dmx(&self.packet[..len]) {
            Some(view) => view,
            None => {
                self.stats.malformed += 1;
                return OpCode::Nop;
            }
        };

        if view.universe != self.universe || view.net != 0 {
            trace!(universe = %view.universe, net = view.net, "dmx for another universe");
            self.stats.dmx_foreign_universe += 1;
            return OpCode::Dmx;
        }

        if view.data.is_empty() {
            self.stats.malformed += 1;
            return OpCode::Dmx;
        }

        let was_locked = self.merge.is_locked();
        if !self.merge.admit(source) {
            trace!(%source, holder = ?self.merge.sender(), "dmx rejected by merge lock");
            self.stats.dmx_merge_rejected += 1;
            return OpCode::Dmx;
        }
        if !was_locked {
            debug!(%source, "merge lock taken");
        }

        self.slots.overwrite(view.data);
        self.stats.dmx_accepted += 1;
        OpCode::Dmx
    }

    fn apply_address(&mut self, len: usize) -> OpCode {
        let AddressView {
            short_name,
            long_name,
            universe,
            subnet,
            command,
        } = match codec::parse_address(&self.packet[..len]) {
            Some(view) => view,
            None => {
                self.stats.malformed += 1;
                return OpCode::Nop;
            }
        };

        if let Some(name) = short_name {
            debug!(%name, "short name set");
            self.names.short = name;
        }
        if let Some(name) = long_name {
            debug!(%name, "long name set");
            self.names.long = name;
        }
        self.apply_universe_switch(universe);
        self.apply_subnet_switch(subnet);

        match command {
            AddressCommand::CancelMerge => {
                self.cancel_merge();
                OpCode::Address
            }
            AddressCommand::ClearOutput => {
                self.cancel_merge();
                self.slots.clear();
                debug!("output buffer cleared");
                OpCode::Dmx
            }
            AddressCommand::None | AddressCommand::Other(_) => OpCode::Address,
        }
    }

    /// Encodes an ArtDmx datagram of the active levels into the datagram
    /// buffer and advances the sequence number.
    pub fn encode_dmx(&mut self) -> &[u8] {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.stats.dmx_sent += 1;

        let len = codec::write_dmx(&mut self.packet, sequence, self.universe, self.slots.levels());
        &self.packet[..len]
    }

    /// Encodes an ArtPollReply describing this node into the datagram
    /// buffer.
    pub fn encode_poll_reply(&mut self) -> &[u8] {
        self.stats.poll_replies += 1;

        let (status, state) = match self.merge.sender() {
            Some(sender) => (STATUS_OUTPUTTING, format!("DMX from {}", sender)),
            None => (0, "Waiting for DMX".to_string()),
        };
        let node_report = format!(
            "#{:04x} [{:04}] {}",
            REPORT_POWER_OK,
            self.stats.poll_replies % 10_000,
            state
        );

        let reply = PollReply {
            address: self.identity.address,
            port: ARTNET_PORT,
            firmware_version: self.firmware_version,
            universe: self.universe,
            oem_code: self.oem_code,
            esta_code: self.esta_code,
            status,
            short_name: &self.names.short,
            long_name: &self.names.long,
            node_report: &node_report,
        };
        let len = codec::write_poll_reply(&mut self.packet, &reply);
        &self.packet[..len]
    }

    /// Where a reply to a poll from `poll_sender` goes: the broadcast
    /// address when one was configured, otherwise the poller.
    pub fn poll_reply_destination(&self, poll_sender: Ipv4Addr) -> Ipv4Addr {
        self.identity.reply_destination(poll_sender)
    }

    /// Receives one datagram from `transport` and decodes it, answering
    /// polls automatically. Returns `Nop` when nothing was waiting.
    pub fn read_packet<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<OpCode> {
        let (len, source) = match transport.receive(&mut self.packet)? {
            Some(received) => received,
            None => return Ok(OpCode::Nop),
        };

        let opcode = self.decode(len, source);
        if opcode == OpCode::Poll {
            self.send_art_poll_reply(transport, source)?;
        }
        Ok(opcode)
    }

    /// Like [`ArtNetNode::read_packet`], returning whether the levels may
    /// have changed.
    pub fn read_dmx_packet<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<bool> {
        Ok(self.read_packet(transport)? == OpCode::Dmx)
    }

    /// Encodes the active levels and sends them to `destination`
    pub fn send_dmx<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        destination: Ipv4Addr,
    ) -> Result<()> {
        let datagram = self.encode_dmx();
        transport.send(datagram, destination)
    }

    /// Encodes a poll reply and sends it to the broadcast address, or back
    /// to `poll_sender` when no subnet mask was configured.
    pub fn send_art_poll_reply<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        poll_sender: Ipv4Addr,
    ) -> Result<()> {
        let destination = self.poll_reply_destination(poll_sender);
        let reply = self.encode_poll_reply();
        transport.send(reply, destination)
    }
}
