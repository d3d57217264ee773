//! Typed accessors over single register slots.
//!
//! An [`OutputChannel`] carries a command from the surface to the vehicle, an
//! [`InputChannel`] exposes a sensor value reported by the vehicle. Both map
//! between engineering units and the 16-bit wire encoding.

use crate::error::{ChannelError, LayoutError};
use crate::mapping::LinearMapping;
use crate::registers::{RegisterTable, Slot};
use std::sync::{Mutex, PoisonError};

pub const WIRE_MIN: f64 = u16::MIN as f64;
pub const WIRE_MAX: f64 = u16::MAX as f64;

/// Command channel: engineering value in, wire value out.
#[derive(Debug)]
pub struct OutputChannel {
    name: &'static str,
    slot: Slot,
    mapping: LinearMapping,
    registers: RegisterTable,
    commanded: Mutex<Option<f64>>,
}

impl OutputChannel {
    /// Claim `index` in `registers` for a command in `[min, max]`.
    pub fn new(
        registers: &RegisterTable,
        name: &'static str,
        index: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, LayoutError> {
        let slot = registers.claim(index, name)?;
        Ok(Self {
            name,
            slot,
            mapping: LinearMapping::new(min, max, WIRE_MIN, WIRE_MAX),
            registers: registers.clone(),
            commanded: Mutex::new(None),
        })
    }

    /// Validate and stage a command. It goes out with the next write of its tier.
    pub fn set_value(&self, value: f64) -> Result<(), ChannelError> {
        if !self.mapping.in_range(value) {
            let (min, max) = self.mapping.source_range();
            return Err(ChannelError::OutOfRange { value, min, max });
        }

        let mut commanded = self.commanded.lock().unwrap_or_else(PoisonError::into_inner);
        self.registers.set(self.slot, self.encode(value));
        *commanded = Some(value);
        Ok(())
    }

    /// Derive a new command from the value currently on the wire.
    ///
    /// The wire slot is read, transformed and written back under one table
    /// lock, so concurrent updates compose and a fail-safe wipe is seen as 0
    /// at the bottom of the range rather than as the last command.
    pub fn update(&self, f: impl FnOnce(f64) -> f64) -> Result<f64, ChannelError> {
        let mut commanded = self.commanded.lock().unwrap_or_else(PoisonError::into_inner);
        let decode = self.mapping.inverse();

        let value = self.registers.update(self.slot, |raw| {
            let value = f(decode.map(f64::from(*raw)));
            if !self.mapping.in_range(value) {
                let (min, max) = self.mapping.source_range();
                return Err(ChannelError::OutOfRange { value, min, max });
            }
            *raw = self.encode(value);
            Ok(value)
        })?;

        *commanded = Some(value);
        Ok(value)
    }

    fn encode(&self, value: f64) -> u16 {
        self.mapping.map(value).round().clamp(WIRE_MIN, WIRE_MAX) as u16
    }

    /// Last accepted command, independent of link state. `None` before the first.
    pub fn value(&self) -> Option<f64> {
        *self.commanded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wire value currently staged in the table.
    pub fn raw(&self) -> u16 {
        self.registers.get(self.slot)
    }

    pub fn range(&self) -> (f64, f64) {
        self.mapping.source_range()
    }

    pub fn index(&self) -> usize {
        self.slot.index()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Sensor channel: wire value in, engineering value out.
#[derive(Debug, Clone)]
pub struct InputChannel {
    name: &'static str,
    slot: Slot,
    mapping: LinearMapping,
    registers: RegisterTable,
}

impl InputChannel {
    pub fn new(
        registers: &RegisterTable,
        name: &'static str,
        index: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, LayoutError> {
        let slot = registers.claim(index, name)?;
        Ok(Self {
            name,
            slot,
            mapping: LinearMapping::new(WIRE_MIN, WIRE_MAX, min, max),
            registers: registers.clone(),
        })
    }

    /// Current engineering value. Stale or at the range minimum when the link is down.
    pub fn value(&self) -> f64 {
        self.mapping.map(f64::from(self.raw()))
    }

    /// Raw 0 is reserved for "no data", so any other value counts as alive.
    pub fn is_alive(&self) -> bool {
        self.raw() != 0
    }

    /// True once a read has refreshed this slot since the last fail-safe wipe.
    ///
    /// Unlike [`is_alive`](Self::is_alive) this also holds when the vehicle
    /// legitimately reports raw 0.
    pub fn has_update(&self) -> bool {
        self.registers.epoch(self.slot) != 0
    }

    pub fn raw(&self) -> u16 {
        self.registers.get(self.slot)
    }

    pub fn range(&self) -> (f64, f64) {
        self.mapping.target_range()
    }

    pub fn index(&self) -> usize {
        self.slot.index()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
