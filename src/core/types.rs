use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::MAX_SLOTS;

/// Combined subnet/universe byte: high nibble subnet, low nibble universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UniverseAddress(pub u8);

impl UniverseAddress {
    /// Creates an address from separate subnet and universe nibbles
    pub fn new(subnet: u8, universe: u8) -> Self {
        UniverseAddress(((subnet & 0x0f) << 4) | (universe & 0x0f))
    }

    /// Subnet nibble (0-15)
    pub fn subnet(&self) -> u8 {
        self.0 >> 4
    }

    /// Universe nibble (0-15)
    pub fn universe(&self) -> u8 {
        self.0 & 0x0f
    }

    /// The combined byte as advertised on the wire
    pub fn as_byte(&self) -> u8 {
        self.0
    }

    /// Replaces the universe nibble, keeping the subnet
    pub fn with_universe(self, universe: u8) -> Self {
        UniverseAddress::new(self.subnet(), universe)
    }

    /// Replaces the subnet nibble, keeping the universe
    pub fn with_subnet(self, subnet: u8) -> Self {
        UniverseAddress::new(subnet, self.universe())
    }
}

impl fmt::Display for UniverseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subnet(), self.universe())
    }
}

/// Decoded form of an ArtAddress switch byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSwitch {
    /// Leave the nibble alone
    NoChange,
    /// Program the nibble to this value (0-15)
    SetTo(u8),
}

impl AddressSwitch {
    /// Sentinel meaning "no change" on the wire
    pub const NO_CHANGE: u8 = 0x7f;
    /// Top bit marks the low nibble as a value to apply
    pub const APPLY: u8 = 0x80;

    /// Decodes a wire switch byte.
    ///
    /// 0x7f and any byte without the apply bit are treated as no change.
    pub fn from_wire(byte: u8) -> Self {
        if byte != Self::NO_CHANGE && byte & Self::APPLY != 0 {
            AddressSwitch::SetTo(byte & 0x0f)
        } else {
            AddressSwitch::NoChange
        }
    }

    /// Applies the switch to a nibble value
    pub fn apply(self, current: u8) -> u8 {
        match self {
            AddressSwitch::NoChange => current,
            AddressSwitch::SetTo(value) => value,
        }
    }
}

/// Which sender, if any, incoming DMX is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeLock {
    /// Accept DMX from anyone; the first sender takes the lock
    #[default]
    Unlocked,
    /// Only DMX from this address is applied
    Locked(Ipv4Addr),
}

impl MergeLock {
    /// Decides whether DMX from `source` may be applied, taking the lock
    /// if it is free.
    pub fn admit(&mut self, source: Ipv4Addr) -> bool {
        match *self {
            MergeLock::Unlocked => {
                *self = MergeLock::Locked(source);
                true
            }
            MergeLock::Locked(owner) => owner == source,
        }
    }

    /// Releases the lock
    pub fn cancel(&mut self) {
        *self = MergeLock::Unlocked;
    }

    /// Returns whether a sender holds the lock
    pub fn is_locked(&self) -> bool {
        matches!(self, MergeLock::Locked(_))
    }

    /// The address holding the lock
    pub fn sender(&self) -> Option<Ipv4Addr> {
        match *self {
            MergeLock::Unlocked => None,
            MergeLock::Locked(owner) => Some(owner),
        }
    }
}

/// DMX levels for one universe, addressed by 1-based slot number.
///
/// Only the first `active` slots are meaningful. A shorter frame does not
/// clear the slots past its end.
#[derive(Clone, PartialEq, Eq)]
pub struct SlotBuffer {
    levels: [u8; MAX_SLOTS],
    active: usize,
}

impl SlotBuffer {
    /// Creates a zeroed buffer with all 512 slots active
    pub fn new() -> Self {
        SlotBuffer {
            levels: [0; MAX_SLOTS],
            active: MAX_SLOTS,
        }
    }

    /// Number of meaningful slots
    pub fn active(&self) -> usize {
        self.active
    }

    /// Sets the number of meaningful slots. Returns false and leaves the
    /// count alone unless `count` is within 1..=512.
    pub fn set_active(&mut self, count: usize) -> bool {
        if (1..=MAX_SLOTS).contains(&count) {
            self.active = count;
            true
        } else {
            false
        }
    }

    /// Level of a slot, or 0 when `slot` is outside 1..=512
    pub fn get(&self, slot: usize) -> u8 {
        match slot {
            1..=MAX_SLOTS => self.levels[slot - 1],
            _ => 0,
        }
    }

    /// Sets a slot level; ignored when `slot` is outside 1..=512
    pub fn set(&mut self, slot: usize, value: u8) {
        if let 1..=MAX_SLOTS = slot {
            self.levels[slot - 1] = value;
        }
    }

    /// The active levels, slot 1 first
    pub fn levels(&self) -> &[u8] {
        &self.levels[..self.active]
    }

    /// Mutable view of the active levels
    pub fn levels_mut(&mut self) -> &mut [u8] {
        &mut self.levels[..self.active]
    }

    /// Copies a received frame over the start of the buffer.
    pub(crate) fn overwrite(&mut self, frame: &[u8]) {
        let count = frame.len().min(MAX_SLOTS);
        if count == 0 {
            return;
        }
        self.levels[..count].copy_from_slice(&frame[..count]);
        self.active = count;
    }

    /// Zeroes every slot and makes all 512 active
    pub(crate) fn clear(&mut self) {
        self.levels = [0; MAX_SLOTS];
        self.active = MAX_SLOTS;
    }
}

impl Default for SlotBuffer {
    fn default() -> Self {
        SlotBuffer::new()
    }
}

impl fmt::Debug for SlotBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotBuffer")
            .field("active", &self.active)
            .field("levels", &self.levels())
            .finish()
    }
}

/// The node's own address and, if a subnet mask was given, where poll
/// replies are broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Address advertised in poll replies
    pub address: Ipv4Addr,
    /// Directed broadcast address for the node's network
    pub broadcast: Option<Ipv4Addr>,
}

impl NodeIdentity {
    /// Identity that answers polls by unicast
    pub fn new(address: Ipv4Addr) -> Self {
        NodeIdentity {
            address,
            broadcast: None,
        }
    }

    /// Identity that broadcasts poll replies on the masked network
    pub fn with_subnet_mask(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        let broadcast = Ipv4Addr::from(u32::from(address) | !u32::from(mask));
        NodeIdentity {
            address,
            broadcast: Some(broadcast),
        }
    }

    /// Where a reply to a poll from `poll_sender` should go
    pub fn reply_destination(&self, poll_sender: Ipv4Addr) -> Ipv4Addr {
        self.broadcast.unwrap_or(poll_sender)
    }
}

/// Names reported in poll replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeNames {
    /// Short name, at most 17 bytes
    pub short: String,
    /// Long name, at most 63 bytes
    pub long: String,
}

impl Default for NodeNames {
    fn default() -> Self {
        NodeNames {
            short: "ArtNet Node".to_string(),
            long: "LX Art-Net single universe node".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_address_nibbles() {
        let addr = UniverseAddress::new(3, 7);
        assert_eq!(addr.as_byte(), 0x37);
        assert_eq!(addr.subnet(), 3);
        assert_eq!(addr.universe(), 7);

        let addr = addr.with_universe(0x1f);
        assert_eq!(addr.as_byte(), 0x3f);
        let addr = addr.with_subnet(0);
        assert_eq!(addr.as_byte(), 0x0f);
        assert_eq!(addr.to_string(), "0:15");
    }

    #[test]
    fn test_address_switch_decoding() {
        assert_eq!(AddressSwitch::from_wire(0x7f), AddressSwitch::NoChange);
        assert_eq!(AddressSwitch::from_wire(0x85), AddressSwitch::SetTo(5));
        assert_eq!(AddressSwitch::from_wire(0xff), AddressSwitch::SetTo(15));
        assert_eq!(AddressSwitch::from_wire(0x05), AddressSwitch::NoChange);
        assert_eq!(AddressSwitch::from_wire(0x00), AddressSwitch::NoChange);
        assert_eq!(AddressSwitch::SetTo(4).apply(9), 4);
        assert_eq!(AddressSwitch::NoChange.apply(9), 9);
    }

    #[test]
    fn test_merge_lock() {
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);
        let mut lock = MergeLock::default();
        assert!(!lock.is_locked());

        assert!(lock.admit(a));
        assert_eq!(lock.sender(), Some(a));
        assert!(lock.admit(a));
        assert!(!lock.admit(b));
        assert_eq!(lock.sender(), Some(a));

        lock.cancel();
        assert!(lock.admit(b));
        assert_eq!(lock, MergeLock::Locked(b));
    }

    #[test]
    fn test_slot_buffer_bounds() {
        let mut slots = SlotBuffer::new();
        slots.set(1, 10);
        slots.set(512, 20);
        slots.set(0, 99);
        slots.set(513, 99);
        assert_eq!(slots.get(1), 10);
        assert_eq!(slots.get(512), 20);
        assert_eq!(slots.get(0), 0);
        assert_eq!(slots.get(513), 0);

        assert!(!slots.set_active(0));
        assert!(!slots.set_active(513));
        assert_eq!(slots.active(), 512);
        assert!(slots.set_active(1));
        assert_eq!(slots.levels(), &[10]);
    }

    #[test]
    fn test_slot_buffer_keeps_stale_tail() {
        let mut slots = SlotBuffer::new();
        slots.overwrite(&[1, 2, 3, 4]);
        slots.overwrite(&[9, 9]);
        assert_eq!(slots.active(), 2);
        assert_eq!(slots.levels(), &[9, 9]);
        assert_eq!(slots.get(3), 3);
        assert_eq!(slots.get(4), 4);

        slots.clear();
        assert_eq!(slots.active(), 512);
        assert_eq!(slots.get(3), 0);
    }

    #[test]
    fn test_identity_broadcast() {
        let addr = Ipv4Addr::new(192, 168, 1, 20);
        let sender = Ipv4Addr::new(192, 168, 1, 5);

        let unicast = NodeIdentity::new(addr);
        assert_eq!(unicast.reply_destination(sender), sender);

        let broadcast = NodeIdentity::with_subnet_mask(addr, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(broadcast.broadcast, Some(Ipv4Addr::new(192, 168, 1, 255)));
        assert_eq!(broadcast.reply_destination(sender), Ipv4Addr::new(192, 168, 1, 255));
    }
}
