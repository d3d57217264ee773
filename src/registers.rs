//! Register table shared between the sync loop and the channel accessors.
//!
//! The table is the single copy of the vehicle's register image on the surface.
//! Channels hold a [`Slot`] into it and never a private copy of the value.
//! Slot assignment comes from a [`RegisterLayout`] and is fixed for the
//! lifetime of the table.

use crate::error::LayoutError;
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const REGISTER_COUNT: usize = 29;
pub const THRUSTER_COUNT: usize = 6;
pub const MANIPULATOR_COUNT: usize = 4;

/// Register values exchanged with the vehicle in one request.
pub type RegisterBlock = ArrayVec<u16, REGISTER_COUNT>;

/// Contiguous run of registers exchanged as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRange {
    pub start: usize,
    pub count: usize,
}

impl RegisterRange {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    pub const fn end(&self) -> usize {
        self.start + self.count
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }

    fn overlaps(&self, other: &RegisterRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Register ranges for each priority tier. Writes go to the vehicle, reads
/// come back from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLayout {
    pub high_write: RegisterRange,
    pub high_read: RegisterRange,
    pub low_write: RegisterRange,
    pub low_read: RegisterRange,
}

/// Index contract agreed with the vehicle firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLayout {
    pub thruster_speed: [usize; THRUSTER_COUNT],
    pub yaw: usize,
    pub pitch: usize,
    pub roll: usize,
    pub depth: usize,
    pub manipulators: [usize; MANIPULATOR_COUNT],
    pub relays: usize,
    pub voltmeter: usize,
    pub tachometers: [usize; THRUSTER_COUNT],
    pub thermometers: [usize; THRUSTER_COUNT],
    /// High byte: signed last error code. Low byte: error counter.
    pub comm_status: usize,
    pub tiers: TierLayout,
}

pub const REFERENCE_LAYOUT: RegisterLayout = RegisterLayout {
    thruster_speed: [0, 1, 2, 3, 4, 5],
    yaw: 6,
    pitch: 7,
    roll: 8,
    depth: 9,
    manipulators: [10, 11, 12, 13],
    relays: 14,
    voltmeter: 15,
    tachometers: [16, 17, 18, 19, 20, 21],
    thermometers: [22, 23, 24, 25, 26, 27],
    comm_status: 28,
    tiers: TierLayout {
        // thruster commands
        high_write: RegisterRange::new(0, 6),
        // orientation + depth
        high_read: RegisterRange::new(6, 4),
        // manipulators + relays
        low_write: RegisterRange::new(10, 5),
        // voltage, rpm, temperature, comm status
        low_read: RegisterRange::new(15, 14),
    },
};

const_assert!(REFERENCE_LAYOUT.tiers.high_write.end() <= REGISTER_COUNT);
const_assert!(REFERENCE_LAYOUT.tiers.high_read.end() <= REGISTER_COUNT);
const_assert!(REFERENCE_LAYOUT.tiers.low_write.end() <= REGISTER_COUNT);
const_assert!(REFERENCE_LAYOUT.tiers.low_read.end() <= REGISTER_COUNT);
const_assert!(REFERENCE_LAYOUT.comm_status < REGISTER_COUNT);

pub const THRUSTER_SPEED_NAMES: [&str; THRUSTER_COUNT] = [
    "thruster_speed[0]", "thruster_speed[1]", "thruster_speed[2]",
    "thruster_speed[3]", "thruster_speed[4]", "thruster_speed[5]",
];
pub const TACHOMETER_NAMES: [&str; THRUSTER_COUNT] = [
    "tachometer[0]", "tachometer[1]", "tachometer[2]",
    "tachometer[3]", "tachometer[4]", "tachometer[5]",
];
pub const THERMOMETER_NAMES: [&str; THRUSTER_COUNT] = [
    "thermometer[0]", "thermometer[1]", "thermometer[2]",
    "thermometer[3]", "thermometer[4]", "thermometer[5]",
];
pub const MANIPULATOR_NAMES: [&str; MANIPULATOR_COUNT] = [
    "manipulator[0]", "manipulator[1]", "manipulator[2]", "manipulator[3]",
];

impl Default for RegisterLayout {
    fn default() -> Self {
        REFERENCE_LAYOUT
    }
}

impl RegisterLayout {
    /// Every named slot of the layout, in declaration order.
    pub fn named_slots(&self) -> ArrayVec<(&'static str, usize), 64> {
        let mut slots = ArrayVec::new();
        for (name, &index) in THRUSTER_SPEED_NAMES.iter().zip(&self.thruster_speed) {
            slots.push((*name, index));
        }
        slots.push(("yaw", self.yaw));
        slots.push(("pitch", self.pitch));
        slots.push(("roll", self.roll));
        slots.push(("depth", self.depth));
        for (name, &index) in MANIPULATOR_NAMES.iter().zip(&self.manipulators) {
            slots.push((*name, index));
        }
        slots.push(("relays", self.relays));
        slots.push(("voltmeter", self.voltmeter));
        for (name, &index) in TACHOMETER_NAMES.iter().zip(&self.tachometers) {
            slots.push((*name, index));
        }
        for (name, &index) in THERMOMETER_NAMES.iter().zip(&self.thermometers) {
            slots.push((*name, index));
        }
        slots.push(("comm_status", self.comm_status));
        slots
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut owners: [Option<&'static str>; REGISTER_COUNT] = [None; REGISTER_COUNT];

        for (name, index) in self.named_slots() {
            let owner = owners.get_mut(index).ok_or(LayoutError::IndexOutOfBounds {
                name,
                index,
                len: REGISTER_COUNT,
            })?;
            if let Some(first) = *owner {
                return Err(LayoutError::SlotCollision {
                    index,
                    first,
                    second: name,
                });
            }
            *owner = Some(name);
        }

        let tiers = [
            ("high_write", self.tiers.high_write),
            ("high_read", self.tiers.high_read),
            ("low_write", self.tiers.low_write),
            ("low_read", self.tiers.low_read),
        ];
        for (name, range) in tiers {
            if range.end() > REGISTER_COUNT {
                return Err(LayoutError::TierOutOfBounds {
                    name,
                    start: range.start,
                    end: range.end(),
                    len: REGISTER_COUNT,
                });
            }
        }

        let writes = [("high_write", self.tiers.high_write), ("low_write", self.tiers.low_write)];
        let reads = [("high_read", self.tiers.high_read), ("low_read", self.tiers.low_read)];
        for (write_name, write) in writes {
            for (read_name, read) in reads {
                if write.overlaps(&read) {
                    return Err(LayoutError::TierOverlap {
                        write: write_name,
                        read: read_name,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Handle to one register, only obtainable by claiming it from a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    index: usize,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct TableInner {
    values: [u16; REGISTER_COUNT],
    // Read generation that last refreshed each slot; 0 = never / wiped.
    epochs: [u64; REGISTER_COUNT],
    generation: u64,
    owners: [Option<&'static str>; REGISTER_COUNT],
}

/// Shared register image. Cloning yields another handle to the same table.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    inner: Arc<Mutex<TableInner>>,
}

impl RegisterTable {
    /// A table with every register at the dead encoding (0).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableInner {
                values: [0; REGISTER_COUNT],
                epochs: [0; REGISTER_COUNT],
                generation: 0,
                owners: [None; REGISTER_COUNT],
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `owner` to `index`. Each index can be claimed once per table.
    pub fn claim(&self, index: usize, owner: &'static str) -> Result<Slot, LayoutError> {
        let mut inner = self.lock();
        let current = inner.owners.get_mut(index).ok_or(LayoutError::IndexOutOfBounds {
            name: owner,
            index,
            len: REGISTER_COUNT,
        })?;

        if let Some(first) = *current {
            return Err(LayoutError::SlotCollision {
                index,
                first,
                second: owner,
            });
        }

        *current = Some(owner);
        Ok(Slot { index })
    }

    pub fn get(&self, slot: Slot) -> u16 {
        self.lock().values[slot.index]
    }

    pub fn set(&self, slot: Slot, value: u16) {
        self.lock().values[slot.index] = value;
    }

    /// Read-modify-write of one slot under the table lock.
    pub fn update<R>(&self, slot: Slot, f: impl FnOnce(&mut u16) -> R) -> R {
        f(&mut self.lock().values[slot.index])
    }

    /// Read generation that last refreshed `slot`, 0 if none since the last wipe.
    pub fn epoch(&self, slot: Slot) -> u64 {
        self.lock().epochs[slot.index]
    }

    /// Copy of the registers in `range`, taken under one lock.
    pub fn read_range(&self, range: RegisterRange) -> RegisterBlock {
        let inner = self.lock();
        inner.values[range.start..range.end()].iter().copied().collect()
    }

    /// Store a block received from the vehicle starting at `start`.
    pub fn apply_range(&self, start: usize, values: &[u16]) -> Result<(), LayoutError> {
        let end = start + values.len();
        if end > REGISTER_COUNT {
            return Err(LayoutError::BlockOutOfBounds {
                start,
                end,
                len: REGISTER_COUNT,
            });
        }

        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1).max(1);
        let generation = inner.generation;
        inner.values[start..end].copy_from_slice(values);
        for epoch in &mut inner.epochs[start..end] {
            *epoch = generation;
        }
        Ok(())
    }

    /// Fail-safe: every register back to the dead encoding.
    pub fn zero_all(&self) {
        let mut inner = self.lock();
        inner.values = [0; REGISTER_COUNT];
        inner.epochs = [0; REGISTER_COUNT];
    }

    pub fn values(&self) -> [u16; REGISTER_COUNT] {
        self.lock().values
    }

    pub fn owner(&self, index: usize) -> Option<&'static str> {
        self.lock().owners.get(index).copied().flatten()
    }
}

impl Default for RegisterTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout_is_valid() {
        assert_eq!(REFERENCE_LAYOUT.validate(), Ok(()));
        assert_eq!(REFERENCE_LAYOUT.named_slots().len(), REGISTER_COUNT);
    }

    #[test]
    fn test_layout_collision_detected() {
        let mut layout = REFERENCE_LAYOUT;
        layout.voltmeter = layout.relays;

        match layout.validate() {
            Err(LayoutError::SlotCollision { index, first, second }) => {
                assert_eq!(index, 14);
                assert_eq!(first, "relays");
                assert_eq!(second, "voltmeter");
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn test_layout_out_of_bounds_detected() {
        let mut layout = REFERENCE_LAYOUT;
        layout.comm_status = REGISTER_COUNT;
        assert!(matches!(
            layout.validate(),
            Err(LayoutError::IndexOutOfBounds { name: "comm_status", .. })
        ));
    }

    #[test]
    fn test_layout_tier_overlap_detected() {
        let mut layout = REFERENCE_LAYOUT;
        layout.tiers.high_write = RegisterRange::new(0, 7);
        assert_eq!(
            layout.validate(),
            Err(LayoutError::TierOverlap { write: "high_write", read: "high_read" })
        );
    }

    #[test]
    fn test_claim_twice_rejected() {
        let table = RegisterTable::new();
        let slot = table.claim(3, "first").unwrap();
        assert_eq!(slot.index(), 3);
        assert_eq!(table.owner(3), Some("first"));

        let err = table.claim(3, "second").unwrap_err();
        assert_eq!(err, LayoutError::SlotCollision { index: 3, first: "first", second: "second" });
        assert!(table.claim(REGISTER_COUNT, "past_end").is_err());
    }

    #[test]
    fn test_apply_range_bumps_epochs_and_zero_clears() {
        let table = RegisterTable::new();
        let slot = table.claim(7, "pitch").unwrap();
        assert_eq!(table.epoch(slot), 0);

        table.apply_range(6, &[1, 2, 3, 4]).unwrap();
        assert_eq!(table.get(slot), 2);
        let first = table.epoch(slot);
        assert!(first > 0);

        table.apply_range(6, &[5, 6, 7, 8]).unwrap();
        assert!(table.epoch(slot) > first);

        table.zero_all();
        assert_eq!(table.get(slot), 0);
        assert_eq!(table.epoch(slot), 0);
        assert_eq!(table.values(), [0; REGISTER_COUNT]);
    }

    #[test]
    fn test_block_past_table_end_rejected() {
        let table = RegisterTable::new();
        let err = table.apply_range(REGISTER_COUNT - 2, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, LayoutError::BlockOutOfBounds { start: 27, end: 30, len: REGISTER_COUNT });
        assert_eq!(table.values(), [0; REGISTER_COUNT]);
    }

    #[test]
    fn test_update_is_read_modify_write() {
        let table = RegisterTable::new();
        let slot = table.claim(14, "relays").unwrap();
        table.set(slot, 0b0100);

        let previous = table.update(slot, |raw| {
            let previous = *raw;
            *raw |= 0b0001;
            previous
        });
        assert_eq!(previous, 0b0100);
        assert_eq!(table.get(slot), 0b0101);
    }

    #[test]
    fn test_read_range_copies_block() {
        let table = RegisterTable::new();
        let slot = table.claim(1, "thruster").unwrap();
        table.set(slot, 0xBEEF);

        let block = table.read_range(RegisterRange::new(0, 6));
        assert_eq!(block.len(), 6);
        assert_eq!(block[1], 0xBEEF);
        assert_eq!(block[0], 0);
    }
}
