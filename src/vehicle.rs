//! Station-side view of the vehicle.
//!
//! [`Vehicle`] owns every channel bound to the register table and answers
//! status questions about the link. [`Vehicle::build`] wires a vehicle and a
//! [`SyncScheduler`] onto the same table and link monitor.

use crate::channels::{InputChannel, OutputChannel};
use crate::config::StationConfig;
use crate::devices::actuators::{self, Manipulators};
use crate::devices::{
    Avionics, AvionicsState, CommErrorCode, CommStatus, Device, RelayBank, Thruster, ThrusterState,
};
use crate::error::{LayoutError, StationError};
use crate::link::{ConnectionState, LinkMonitor, SyncStats};
use crate::registers::{RegisterLayout, RegisterTable, THRUSTER_COUNT};
use crate::scheduler::SyncScheduler;
use crate::transport::RegisterTransport;
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const VOLTMETER_MIN_V: f64 = 0.0;
pub const VOLTMETER_MAX_V: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub connection: ConnectionState,
    pub thrusters: Vec<ThrusterState>,
    pub avionics: AvionicsState,
    pub manipulators: Vec<Option<f64>>,
    pub relay_mask: u16,
    pub voltage_v: f64,
    pub voltmeter_alive: bool,
    pub comm_error: CommErrorCode,
    pub comm_error_text: String,
    pub comm_error_count: u8,
    pub stats: SyncStats,
}

#[derive(Debug)]
pub struct Vehicle {
    registers: RegisterTable,
    layout: RegisterLayout,
    link: LinkMonitor,
    thrusters: ArrayVec<Thruster, THRUSTER_COUNT>,
    avionics: Avionics,
    manipulators: Manipulators,
    relays: RelayBank,
    voltmeter: InputChannel,
    comm_status: CommStatus,
}

impl Vehicle {
    /// Bind every channel of `layout` to `registers`.
    pub fn new(
        registers: &RegisterTable,
        layout: &RegisterLayout,
        link: LinkMonitor,
    ) -> Result<Self, LayoutError> {
        let thrusters = (0..THRUSTER_COUNT)
            .map(|id| Thruster::new(registers, layout, id))
            .collect::<Result<ArrayVec<_, THRUSTER_COUNT>, _>>()?;

        Ok(Self {
            registers: registers.clone(),
            layout: *layout,
            link,
            thrusters,
            avionics: Avionics::new(registers, layout)?,
            manipulators: actuators::manipulators(registers, layout)?,
            relays: RelayBank::new(registers, layout)?,
            voltmeter: InputChannel::new(
                registers,
                "voltmeter",
                layout.voltmeter,
                VOLTMETER_MIN_V,
                VOLTMETER_MAX_V,
            )?,
            comm_status: CommStatus::new(registers, layout)?,
        })
    }

    /// Validate config and layout, then build a vehicle and the scheduler
    /// that keeps it in sync over `transport`.
    pub fn build<T: RegisterTransport>(
        transport: T,
        layout: RegisterLayout,
        config: &StationConfig,
    ) -> Result<(Self, SyncScheduler<T>), StationError> {
        config.validate()?;
        layout.validate()?;

        let registers = RegisterTable::new();
        let link = LinkMonitor::new(ConnectionState::Disconnected, config.watchdog_deadline());
        let vehicle = Self::new(&registers, &layout, link.clone())?;
        let scheduler = SyncScheduler::new(transport, registers, layout.tiers, link, config);

        info!(
            port = %config.port_name,
            baud = config.baud_rate,
            interval_ms = config.update_interval_ms,
            connected = scheduler.is_connected(),
            "Station initialized"
        );
        Ok((vehicle, scheduler))
    }

    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    pub fn thruster(&self, id: usize) -> Option<&Thruster> {
        self.thrusters.get(id)
    }

    pub fn avionics(&self) -> &Avionics {
        &self.avionics
    }

    pub fn manipulators(&self) -> &[OutputChannel] {
        &self.manipulators
    }

    pub fn manipulator(&self, index: usize) -> Option<&OutputChannel> {
        self.manipulators.get(index)
    }

    pub fn relays(&self) -> &RelayBank {
        &self.relays
    }

    pub fn voltmeter(&self) -> &InputChannel {
        &self.voltmeter
    }

    pub fn registers(&self) -> &RegisterTable {
        &self.registers
    }

    pub fn layout(&self) -> &RegisterLayout {
        &self.layout
    }

    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.connection()
    }

    pub fn last_communication_error_code(&self) -> i8 {
        self.comm_status.last_error_code()
    }

    pub fn last_communication_error(&self) -> CommErrorCode {
        self.comm_status.last_error()
    }

    pub fn last_communication_error_string(&self) -> String {
        self.comm_status.last_error().to_string()
    }

    pub fn communication_error_count(&self) -> u8 {
        self.comm_status.error_count()
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        let comm_error = self.last_communication_error();

        VehicleSnapshot {
            connection: self.connection_state(),
            thrusters: self.thrusters.iter().map(Device::get_state).collect(),
            avionics: self.avionics.get_state(),
            manipulators: self.manipulators.iter().map(OutputChannel::value).collect(),
            relay_mask: self.relays.mask(),
            voltage_v: self.voltmeter.value(),
            voltmeter_alive: self.voltmeter.is_alive(),
            comm_error,
            comm_error_text: comm_error.to_string(),
            comm_error_count: self.communication_error_count(),
            stats: self.link.stats(),
        }
    }
}
