//! Integration tests for descriptors, BARs and the configuration space.

use socbus::soc::interconnect::pnp::{
    self, Bar, BarKind, ConfigSpace, DeviceId, ID_WORD, TARGET_AREA_OFFSET,
};

fn reference_space() -> ConfigSpace {
    ConfigSpace::new(true, 0xFFF, 0xFFF, 0xFF0, 0xFF0)
}

/// Tests the BAR word layout.
#[test]
fn test_bar_encoding() {
    let bar = Bar {
        addr: 0x400,
        mask: 0xF00,
        kind: BarKind::AhbMemory,
        cacheable: true,
        prefetchable: true,
    };
    let word = bar.encode();
    assert_eq!(word, 0x4003_F002);
    assert_eq!(Bar::decode(word), Some(bar));
}

/// Tests that a zero type field marks an unused BAR.
#[test]
fn test_bar_unused() {
    assert_eq!(Bar::decode(0), None);
    assert_eq!(Bar::decode(0x4000_FFF0), None);
}

/// Tests BAR range helpers.
#[test]
fn test_bar_range() {
    let bar = Bar::memory(0x600, 0xF00);
    assert_eq!(bar.key(), 0x600);
    assert_eq!(bar.start(), 0x6000_0000);
    assert_eq!(bar.size(), 0x1000_0000);
    assert_eq!(bar.end(), 0x6FFF_FFFF);

    let seg = Bar::memory(0x000, 0xFFF);
    assert_eq!(seg.size(), 0x0010_0000);
    assert_eq!(seg.end(), 0x000F_FFFF);
}

/// Tests the contiguous-prefix mask rule.
#[test]
fn test_bar_contiguous_mask() {
    assert!(Bar::memory(0x400, 0xFFF).is_contiguous());
    assert!(Bar::memory(0x400, 0xF00).is_contiguous());
    assert!(Bar::memory(0x000, 0x000).is_contiguous());
    assert!(!Bar::memory(0x400, 0xF0F).is_contiguous());
    assert!(!Bar::memory(0x400, 0x0FF).is_contiguous());
}

/// Tests the identification word layout.
#[test]
fn test_device_id_encoding() {
    let id = DeviceId {
        vendor: 0x01,
        device: 0x00E,
        version: 2,
        irq: 5,
    };
    assert_eq!(id.encode(), 0x0100_E045);
    assert_eq!(DeviceId::decode(0x0100_E045), id);
}

/// Tests descriptor assembly.
#[test]
fn test_descriptor_words() {
    let id = DeviceId {
        vendor: 0x04,
        device: 0x123,
        version: 1,
        irq: 0,
    };
    let bars = [Bar::memory(0x400, 0xFFF), Bar::memory(0x500, 0xFF0)];
    let words = pnp::descriptor(id, &bars);

    assert_eq!(words[0], id.encode());
    assert_eq!(&words[1..4], &[0, 0, 0]);
    assert_eq!(words[4], bars[0].encode());
    assert_eq!(words[5], bars[1].encode());
    assert_eq!(&words[6..], &[0, 0]);
}

/// Tests the default window placement.
#[test]
fn test_window_base() {
    let space = reference_space();
    assert_eq!(space.base(), 0xFFFF_F000);
    assert!(space.contains(0xFFFF_F000));
    assert!(space.contains(0xFFFF_FFFC));
    assert!(!space.contains(0xFFFF_EFFF));
    assert!(!space.contains(0x4000_0000));
}

/// Tests a window moved to another I/O area.
#[test]
fn test_window_custom_base() {
    let space = ConfigSpace::new(true, 0x800, 0xFFF, 0xFF0, 0xFF0);
    assert_eq!(space.base(), 0x800F_F000);
    assert!(space.contains(0x800F_F800));
    assert!(!space.contains(0xFFFF_F800));
    // The identification window stays fixed.
    assert!(space.contains(0xFFFF_FFF0));
}

/// Tests the fixed identification word.
#[test]
fn test_identification_window() {
    let space = reference_space();
    for addr in 0xFFFF_FFF0..=0xFFFF_FFF3 {
        assert_eq!(space.read_word(addr), ID_WORD);
    }
}

/// Tests that slave and master blocks land at their offsets.
#[test]
fn test_descriptor_placement() {
    let mut space = reference_space();
    let master = [0x1000_0000, 0, 0, 0, 0x4000_FFF2, 0, 0, 0];
    let slave0 = [0x2000_0000, 0, 0, 0, 0x0000_FFF2, 0, 0, 0];
    let slave1 = [0x3000_0000, 1, 2, 3, 0x1000_FFF2, 0x1100_FFF2, 0, 0];
    space.insert_master(0, master);
    space.insert_slave(0, slave0);
    space.insert_slave(1, slave1);

    let base = space.base();
    assert_eq!(space.read_word(base), 0x1000_0000);
    assert_eq!(space.read_word(base + 0x10), 0x4000_FFF2);
    assert_eq!(space.read_word(base + TARGET_AREA_OFFSET), 0x2000_0000);
    for (w, expected) in slave1.iter().enumerate() {
        let addr = base + TARGET_AREA_OFFSET + 32 + 4 * w as u32;
        assert_eq!(space.read_word(addr), *expected);
    }
}

/// Tests that empty descriptor slots read as zero.
#[test]
fn test_unregistered_device_reads_zero() {
    let mut space = reference_space();
    space.insert_slave(0, [0xAAAA_AAAA; 8]);

    let base = space.base();
    assert_eq!(space.read_word(base + TARGET_AREA_OFFSET + 32), 0);
    assert_eq!(space.read_word(base + 0x40), 0);
}

/// Tests that a descriptor stored above an empty slot still reads back.
#[test]
fn test_sparse_descriptor_slots() {
    let mut space = reference_space();
    space.insert_slave(0, [0x1111_1111; 8]);
    space.insert_slave(5, [0x0112_3022, 0, 0, 0, 0x5003_FFF2, 0, 0, 0]);
    space.insert_master(3, [0x0200_0000; 8]);

    let base = space.base();
    assert_eq!(space.read_word(base + TARGET_AREA_OFFSET + 32 * 5), 0x0112_3022);
    assert_eq!(space.read_word(base + TARGET_AREA_OFFSET + 32 * 5 + 16), 0x5003_FFF2);
    assert_eq!(space.read_word(base + TARGET_AREA_OFFSET + 32), 0);
    assert_eq!(space.read_word(base + 32 * 3), 0x0200_0000);
    assert_eq!(space.read_word(base), 0);
}

/// Tests the big-endian byte lanes and the word count.
#[test]
fn test_read_bytes_big_endian() {
    let mut space = reference_space();
    space.insert_slave(0, [0x0102_0304, 0x0506_0708, 0, 0, 0, 0, 0, 0]);

    let addr = space.base() + TARGET_AREA_OFFSET;
    let mut buf = [0u8; 8];
    assert_eq!(space.read_bytes(addr, &mut buf), 2);
    assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

    let mut unaligned = [0u8; 4];
    assert_eq!(space.read_bytes(addr + 2, &mut unaligned), 2);
    assert_eq!(unaligned, [3, 4, 5, 6]);

    let mut word = [0u8; 4];
    space.read_bytes(addr + 4, &mut word);
    assert_eq!(u32::from_be_bytes(word), 0x0506_0708);
}

/// Tests that a disabled window claims nothing and stores nothing.
#[test]
fn test_disabled_window() {
    let mut space = ConfigSpace::new(false, 0xFFF, 0xFFF, 0xFF0, 0xFF0);
    space.insert_slave(0, [1; 8]);
    assert!(!space.enabled());
    assert!(!space.contains(0xFFFF_F800));
    assert!(!space.contains(0xFFFF_FFF0));
    assert!(space.slave_descriptor(0).is_none());
}
