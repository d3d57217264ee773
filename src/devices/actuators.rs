use crate::channels::OutputChannel;
use crate::error::{ChannelError, LayoutError};
use crate::registers::{RegisterLayout, RegisterTable, MANIPULATOR_COUNT, MANIPULATOR_NAMES};
use arrayvec::ArrayVec;

pub const MANIPULATOR_MIN: f64 = -255.0;
pub const MANIPULATOR_MAX: f64 = 255.0;
pub const RELAY_COUNT: u8 = 16;

pub type Manipulators = ArrayVec<OutputChannel, MANIPULATOR_COUNT>;

pub fn manipulators(
    registers: &RegisterTable,
    layout: &RegisterLayout,
) -> Result<Manipulators, LayoutError> {
    MANIPULATOR_NAMES
        .iter()
        .zip(&layout.manipulators)
        .map(|(&name, &index)| {
            OutputChannel::new(registers, name, index, MANIPULATOR_MIN, MANIPULATOR_MAX)
        })
        .collect()
}

/// Sixteen on/off outputs packed into one register, bit n = relay n.
#[derive(Debug)]
pub struct RelayBank {
    channel: OutputChannel,
}

impl RelayBank {
    pub fn new(registers: &RegisterTable, layout: &RegisterLayout) -> Result<Self, LayoutError> {
        Ok(Self {
            channel: OutputChannel::new(
                registers,
                "relays",
                layout.relays,
                f64::from(u16::MIN),
                f64::from(u16::MAX),
            )?,
        })
    }

    pub fn set_mask(&self, mask: u16) -> Result<(), ChannelError> {
        self.channel.set_value(f64::from(mask))
    }

    /// Last commanded mask; all relays off before the first command.
    pub fn mask(&self) -> u16 {
        self.channel.value().map_or(0, |value| value as u16)
    }

    /// Switch one relay, leaving the others as they are on the wire.
    ///
    /// After a fail-safe wipe the wire holds 0, so only this relay comes back
    /// on; the rest stay off until commanded again.
    pub fn set_relay(&self, relay: u8, on: bool) -> Result<(), ChannelError> {
        if relay >= RELAY_COUNT {
            return Err(ChannelError::InvalidRelay(relay));
        }

        let bit = 1u16 << relay;
        self.channel
            .update(|current| {
                let mask = current.round() as u16;
                f64::from(if on { mask | bit } else { mask & !bit })
            })
            .map(|_| ())
    }

    pub fn relay(&self, relay: u8) -> Result<bool, ChannelError> {
        if relay >= RELAY_COUNT {
            return Err(ChannelError::InvalidRelay(relay));
        }
        Ok(self.mask() & (1u16 << relay) != 0)
    }

    pub fn channel(&self) -> &OutputChannel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::REFERENCE_LAYOUT;

    #[test]
    fn test_relay_bits_round_trip_to_wire() {
        let table = RegisterTable::new();
        let relays = RelayBank::new(&table, &REFERENCE_LAYOUT).unwrap();
        assert_eq!(relays.mask(), 0);

        relays.set_relay(0, true).unwrap();
        relays.set_relay(9, true).unwrap();
        assert_eq!(relays.mask(), 0b10_0000_0001);
        assert_eq!(table.values()[14], 0b10_0000_0001);
        assert!(relays.relay(9).unwrap());

        relays.set_relay(0, false).unwrap();
        assert!(!relays.relay(0).unwrap());
        assert_eq!(relays.mask(), 1 << 9);
    }

    #[test]
    fn test_set_relay_after_wipe_keeps_other_relays_off() {
        let table = RegisterTable::new();
        let relays = RelayBank::new(&table, &REFERENCE_LAYOUT).unwrap();
        relays.set_mask(0xFFFF).unwrap();

        table.zero_all();
        relays.set_relay(0, false).unwrap();
        assert_eq!(relays.channel().raw(), 0);
        relays.set_relay(3, true).unwrap();
        assert_eq!(relays.channel().raw(), 0b1000);
        assert_eq!(relays.mask(), 0b1000);
    }

    #[test]
    fn test_concurrent_relay_switching_loses_no_bits() {
        let table = RegisterTable::new();
        let relays = RelayBank::new(&table, &REFERENCE_LAYOUT).unwrap();

        std::thread::scope(|scope| {
            for relay in 0..RELAY_COUNT {
                let relays = &relays;
                scope.spawn(move || {
                    for _ in 0..50 {
                        relays.set_relay(relay, true).unwrap();
                    }
                });
            }
        });

        assert_eq!(relays.channel().raw(), u16::MAX);
        assert_eq!(relays.mask(), u16::MAX);
    }

    #[test]
    fn test_invalid_relay_rejected() {
        let table = RegisterTable::new();
        let relays = RelayBank::new(&table, &REFERENCE_LAYOUT).unwrap();
        assert_eq!(relays.set_relay(16, true), Err(ChannelError::InvalidRelay(16)));
        assert!(relays.relay(200).is_err());
        assert_eq!(relays.mask(), 0);
    }

    #[test]
    fn test_manipulators_bound_in_order() {
        let table = RegisterTable::new();
        let arms = manipulators(&table, &REFERENCE_LAYOUT).unwrap();
        assert_eq!(arms.len(), MANIPULATOR_COUNT);
        assert_eq!(arms[3].index(), 13);
        assert!(arms[0].set_value(300.0).is_err());
        arms[0].set_value(-255.0).unwrap();
        assert_eq!(arms[0].raw(), 0);
    }
}
