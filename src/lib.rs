//! # ROV Link
//!
//! Surface-station side of a tethered ROV register link. The station keeps a
//! 29-register image of the vehicle, exposes it as typed command and sensor
//! channels, and keeps it in sync with the vehicle over a serial transport.
//!
//! ## Features
//!
//! - **Typed channels**: engineering units in, 16-bit wire values out, and back
//! - **Tiered sync**: propulsion and core sensors every tick, auxiliaries every tenth
//! - **Fail-safe watchdog**: an overrunning exchange zeroes the whole register image
//! - **Silent reconnect**: a closed transport is reopened on every tick until it works
//! - **Simulation**: an in-process vehicle with injectable link faults
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rovlink::{SimulatedVehicle, StationConfig, Vehicle, REFERENCE_LAYOUT};
//!
//! # async fn run() -> Result<(), rovlink::StationError> {
//! let config = StationConfig::default();
//! let transport = SimulatedVehicle::connected(REFERENCE_LAYOUT);
//! let (vehicle, scheduler) = Vehicle::build(transport, REFERENCE_LAYOUT, &config)?;
//!
//! let sync = scheduler.spawn();
//! vehicle.thrusters()[0].speed.set_value(1200.0)?;
//! println!("yaw: {:.3} rad", vehicle.avionics().yaw.value());
//! sync.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registers`] - Register layout and the shared register table
//! - [`channels`] - Output (command) and input (sensor) channels
//! - [`devices`] - Thrusters, avionics, actuators and comm diagnostics
//! - [`scheduler`] - Tiered exchange loop with watchdog and reconnect
//! - [`link`] - Connection state, watchdog, statistics and event history
//! - [`transport`] - Transport trait and the scripted mock
//! - [`simulator`] - Simulated vehicle transport

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

extern crate alloc;

pub mod channels;
pub mod config;
pub mod devices;
pub mod error;
pub mod fault_injection;
pub mod link;
pub mod mapping;
pub mod registers;
pub mod scheduler;
pub mod simulator;
pub mod transport;
pub mod vehicle;

// Re-export main public types for convenience
pub use channels::{InputChannel, OutputChannel};
pub use config::StationConfig;
pub use error::{ChannelError, ConfigError, LayoutError, StationError, TransportError};
pub use link::{ConnectionState, LinkEvent, LinkMonitor, SyncStats};
pub use mapping::LinearMapping;
pub use registers::{RegisterLayout, RegisterTable, REFERENCE_LAYOUT, REGISTER_COUNT};
pub use scheduler::{SyncHandle, SyncScheduler, TickOutcome};
pub use simulator::SimulatedVehicle;
pub use transport::RegisterTransport;
pub use vehicle::{Vehicle, VehicleSnapshot};
