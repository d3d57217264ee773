pub mod thruster;
pub mod avionics;
pub mod actuators;
pub mod comms;

pub use thruster::{Thruster, ThrusterState};
pub use avionics::{Avionics, AvionicsState};
pub use actuators::{RelayBank, RELAY_COUNT};
pub use comms::{CommErrorCode, CommStatus, errors_since};

use serde::Serialize;

/// A named group of channels with derived health.
///
/// Devices hold no state of their own; everything is computed from the
/// register table on each call.
pub trait Device {
    type State: Clone + Serialize;

    fn get_state(&self) -> Self::State;
    fn is_alive(&self) -> bool;
}
