//! Plug & Play Configuration Space.
//!
//! Every device bound to the fabric supplies an 8-word descriptor at
//! elaboration. The fabric exposes those descriptors through a read-only
//! configuration window:
//!
//! * Word 0 carries the identification (`irq | version<<5 | device<<12 | vendor<<24`).
//! * Words 1..4 are reserved (zero).
//! * Words 4..8 are base address registers (BARs).
//!
//! Initiator descriptors occupy the low half of the window, target
//! descriptors start at offset `0x800`. Each device owns a 32-byte block.
//! The bus is big-endian: byte lane 0 of a word is bits 31..24.

use super::MAX_DEVICES;
use tracing::{debug, warn};

/// First address of the fixed identification window.
pub const ID_WINDOW_START: u32 = 0xFFFF_FFF0;

/// Last address of the fixed identification window.
pub const ID_WINDOW_END: u32 = 0xFFFF_FFF3;

/// Word returned for any read of the identification window.
pub const ID_WORD: u32 = 0x3010_0000;

/// Offset of the first target block inside the configuration window.
pub const TARGET_AREA_OFFSET: u32 = 0x800;

/// Number of 32-bit words in a device descriptor.
pub const DESCRIPTOR_WORDS: usize = 8;

/// Address space type of a BAR (bits 3..0 of the BAR word).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarKind {
    /// APB I/O space behind a bridge.
    ApbIo,
    /// AHB memory space.
    AhbMemory,
    /// AHB I/O space.
    AhbIo,
}

impl BarKind {
    fn code(self) -> u32 {
        match self {
            BarKind::ApbIo => 1,
            BarKind::AhbMemory => 2,
            BarKind::AhbIo => 3,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(BarKind::ApbIo),
            2 => Some(BarKind::AhbMemory),
            3 => Some(BarKind::AhbIo),
            _ => None,
        }
    }
}

/// One address region occupied by a device.
///
/// `addr` and `mask` are 12-bit values compared against address bits 31..20,
/// so every region is a multiple of 1 MiB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bar {
    pub addr: u32,
    pub mask: u32,
    pub kind: BarKind,
    pub cacheable: bool,
    pub prefetchable: bool,
}

impl Bar {
    /// Creates a plain AHB memory BAR.
    pub fn memory(addr: u32, mask: u32) -> Self {
        Self {
            addr: addr & 0xFFF,
            mask: mask & 0xFFF,
            kind: BarKind::AhbMemory,
            cacheable: false,
            prefetchable: false,
        }
    }

    /// Encodes the BAR as its descriptor word.
    pub fn encode(&self) -> u32 {
        ((self.addr & 0xFFF) << 20)
            | (u32::from(self.prefetchable) << 17)
            | (u32::from(self.cacheable) << 16)
            | ((self.mask & 0xFFF) << 4)
            | self.kind.code()
    }

    /// Decodes a descriptor word. A zero type field means "unused" and
    /// yields `None`.
    pub fn decode(word: u32) -> Option<Self> {
        let kind = BarKind::from_code(word & 0xF)?;
        Some(Self {
            addr: (word >> 20) & 0xFFF,
            mask: (word >> 4) & 0xFFF,
            kind,
            cacheable: (word >> 16) & 1 != 0,
            prefetchable: (word >> 17) & 1 != 0,
        })
    }

    /// Masked 12-bit segment key of the region.
    pub fn key(&self) -> u32 {
        self.addr & self.mask
    }

    /// First byte address of the region.
    pub fn start(&self) -> u64 {
        u64::from(self.key()) << 20
    }

    /// Region size in bytes.
    pub fn size(&self) -> u64 {
        u64::from((!self.mask & 0xFFF) + 1) << 20
    }

    /// Last byte address of the region (inclusive).
    pub fn end(&self) -> u64 {
        self.start() + self.size() - 1
    }

    /// A mask is well formed when its set bits form a prefix of the 12-bit
    /// field, so that every region is one contiguous, aligned range.
    pub fn is_contiguous(&self) -> bool {
        let inv = !self.mask & 0xFFF;
        inv & (inv + 1) == 0
    }
}

/// Identification fields of descriptor word 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceId {
    pub vendor: u8,
    pub device: u16,
    pub version: u8,
    pub irq: u8,
}

impl DeviceId {
    pub fn encode(&self) -> u32 {
        (u32::from(self.irq) & 0x1F)
            | ((u32::from(self.version) & 0x1F) << 5)
            | ((u32::from(self.device) & 0xFFF) << 12)
            | (u32::from(self.vendor) << 24)
    }

    pub fn decode(word: u32) -> Self {
        Self {
            vendor: (word >> 24) as u8,
            device: ((word >> 12) & 0xFFF) as u16,
            version: ((word >> 5) & 0x1F) as u8,
            irq: (word & 0x1F) as u8,
        }
    }
}

/// Builds the full 8-word descriptor from the identification and up to four
/// BARs. Extra BARs beyond the fourth are ignored.
pub fn descriptor(id: DeviceId, bars: &[Bar]) -> [u32; DESCRIPTOR_WORDS] {
    let mut words = [0u32; DESCRIPTOR_WORDS];
    words[0] = id.encode();
    for (slot, bar) in words[4..].iter_mut().zip(bars) {
        *slot = bar.encode();
    }
    words
}

/// Read-only configuration space synthesised from device descriptors.
pub struct ConfigSpace {
    enabled: bool,
    base: u32,
    mask: u32,
    masters: [Option<[u32; DESCRIPTOR_WORDS]>; MAX_DEVICES],
    slaves: [Option<[u32; DESCRIPTOR_WORDS]>; MAX_DEVICES],
}

impl ConfigSpace {
    /// Creates the configuration space for the window described by the
    /// 12-bit I/O area address/mask and the 12-bit configuration area
    /// address/mask.
    pub fn new(enabled: bool, io_addr: u32, io_mask: u32, cfg_addr: u32, cfg_mask: u32) -> Self {
        let mask = ((io_mask & 0xFFF) << 20) | ((cfg_mask & 0xFFF) << 8);
        let base = (((io_addr & 0xFFF) << 20) | ((cfg_addr & 0xFFF) << 8)) & mask;
        Self {
            enabled,
            base,
            mask,
            masters: [None; MAX_DEVICES],
            slaves: [None; MAX_DEVICES],
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Base address of the configuration window.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Stores a master descriptor under its bus index. Ignored while the
    /// window is disabled.
    pub fn insert_master(&mut self, index: usize, words: [u32; DESCRIPTOR_WORDS]) {
        if self.enabled && index < MAX_DEVICES {
            self.masters[index] = Some(words);
        }
    }

    /// Stores a target descriptor under its bus index. Ignored while the
    /// window is disabled.
    pub fn insert_slave(&mut self, index: usize, words: [u32; DESCRIPTOR_WORDS]) {
        if self.enabled && index < MAX_DEVICES {
            self.slaves[index] = Some(words);
        }
    }

    pub fn master_descriptor(&self, index: usize) -> Option<&[u32; DESCRIPTOR_WORDS]> {
        self.masters.get(index).and_then(Option::as_ref)
    }

    pub fn slave_descriptor(&self, index: usize) -> Option<&[u32; DESCRIPTOR_WORDS]> {
        self.slaves.get(index).and_then(Option::as_ref)
    }

    /// Returns `true` if `address` falls inside the identification window or
    /// the configuration window. Always `false` while disabled.
    pub fn contains(&self, address: u32) -> bool {
        self.enabled
            && ((ID_WINDOW_START..=ID_WINDOW_END).contains(&address)
                || (address ^ self.base) & self.mask == 0)
    }

    /// Returns the 32-bit configuration word covering `address`.
    pub fn read_word(&self, address: u32) -> u32 {
        if (ID_WINDOW_START..=ID_WINDOW_END).contains(&address) {
            return ID_WORD;
        }

        let offset = address.wrapping_sub(self.base);
        let (table, side, offset) = if offset >= TARGET_AREA_OFFSET {
            (&self.slaves, "slave", offset - TARGET_AREA_OFFSET)
        } else {
            (&self.masters, "master", offset)
        };

        let device = ((offset >> 2) >> 3) as usize;
        let word = ((offset >> 2) & 0x7) as usize;
        debug!(addr = address, side, device, word, "configuration space read");

        match table.get(device).and_then(Option::as_ref) {
            Some(words) => words[word],
            None => {
                warn!(
                    addr = address,
                    side,
                    device,
                    "access to unregistered plug & play register"
                );
                0
            }
        }
    }

    /// Fills `buf` with the big-endian byte lanes starting at `address`.
    ///
    /// # Returns
    ///
    /// The number of distinct 32-bit words touched, which the fabric uses as
    /// the access cost in clock cycles.
    pub fn read_bytes(&self, address: u32, buf: &mut [u8]) -> u64 {
        let mut words = 0;
        let mut current: Option<(u32, u32)> = None;
        for (i, byte) in buf.iter_mut().enumerate() {
            let addr = address.wrapping_add(i as u32);
            let reg = match current {
                Some((line, reg)) if line == addr >> 2 => reg,
                _ => {
                    let reg = self.read_word(addr);
                    current = Some((addr >> 2, reg));
                    words += 1;
                    reg
                }
            };
            *byte = reg.to_be_bytes()[(addr & 0x3) as usize];
        }
        words
    }
}
