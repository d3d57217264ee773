//! Vehicle-side register image with simple plant dynamics.
//!
//! Stands in for the serial slave on the ROV so the station can run without
//! hardware. Writes land in the image, reads advance the plant one step and
//! return the synthesized sensor registers. Link faults come from a
//! [`LinkFaultInjector`] and are reflected in the comm status register the
//! same way the real slave reports them.

use crate::devices::avionics::{ANGLE_MAX_RAD, ANGLE_MIN_RAD, DEPTH_MAX_M, DEPTH_MIN_M};
use crate::devices::thruster::{RPM_MAX, RPM_MIN, SPEED_MAX, SPEED_MIN, TEMP_MAX_C, TEMP_MIN_C};
use crate::devices::CommErrorCode;
use crate::error::TransportError;
use crate::fault_injection::{FaultInjectionConfig, LinkFault, LinkFaultInjector};
use crate::mapping::LinearMapping;
use crate::registers::{RegisterBlock, RegisterLayout, REGISTER_COUNT, THRUSTER_COUNT};
use crate::transport::RegisterTransport;
use crate::vehicle::{VOLTMETER_MAX_V, VOLTMETER_MIN_V};
use std::time::Duration;
use tracing::{debug, warn};

const STEP_S: f64 = 0.01;

const MAX_RPM: f64 = 3000.0;
const RPM_TIME_CONSTANT_S: f64 = 0.3;
const WATER_TEMP_C: f64 = 12.0;
const MOTOR_HEATING_C: f64 = 45.0;
const THERMAL_TIME_CONSTANT_S: f64 = 20.0;

const BATTERY_VOLTS: f64 = 24.0;
const VOLTS_SAG_AT_FULL_LOAD: f64 = 3.5;

const START_DEPTH_M: f64 = 1.5;
const MAX_DIVE_RATE_M_S: f64 = 0.5;
// Thrusters 4 and 5 are the vertical pair.
const VERTICAL_THRUSTERS: [usize; 2] = [4, 5];

const YAW_RATE_RAD_S: f64 = 0.2;
const SWAY_AMPLITUDE_RAD: f64 = 0.05;
const SWAY_PERIOD_S: f64 = 4.0;

#[derive(Debug, Clone)]
struct Plant {
    time_s: f64,
    yaw_rad: f64,
    depth_m: f64,
    rpm: [f64; THRUSTER_COUNT],
    temperature_c: [f64; THRUSTER_COUNT],
}

impl Plant {
    fn new() -> Self {
        Self {
            time_s: 0.0,
            yaw_rad: 0.0,
            depth_m: START_DEPTH_M,
            rpm: [0.0; THRUSTER_COUNT],
            temperature_c: [WATER_TEMP_C; THRUSTER_COUNT],
        }
    }

    /// `commands` are thruster speeds normalized to [-1, 1].
    fn step(&mut self, commands: &[f64; THRUSTER_COUNT]) {
        self.time_s += STEP_S;

        self.yaw_rad += YAW_RATE_RAD_S * STEP_S;
        if self.yaw_rad > ANGLE_MAX_RAD {
            self.yaw_rad -= 2.0 * ANGLE_MAX_RAD;
        }

        for (i, &command) in commands.iter().enumerate() {
            let target_rpm = command.abs() * MAX_RPM;
            self.rpm[i] += (target_rpm - self.rpm[i]) * (STEP_S / RPM_TIME_CONSTANT_S);

            let load = self.rpm[i] / MAX_RPM;
            let target_temp = WATER_TEMP_C + load * MOTOR_HEATING_C;
            self.temperature_c[i] +=
                (target_temp - self.temperature_c[i]) * (STEP_S / THERMAL_TIME_CONSTANT_S);
        }

        let heave: f64 = VERTICAL_THRUSTERS.iter().map(|&i| commands[i]).sum::<f64>()
            / VERTICAL_THRUSTERS.len() as f64;
        let depth = self.depth_m + heave * MAX_DIVE_RATE_M_S * STEP_S;
        self.depth_m = depth.clamp(DEPTH_MIN_M, DEPTH_MAX_M);
    }

    fn sway(&self, phase: f64) -> f64 {
        let angle = 2.0 * core::f64::consts::PI * self.time_s / SWAY_PERIOD_S;
        SWAY_AMPLITUDE_RAD * (angle + phase).sin()
    }

    fn bus_volts(&self) -> f64 {
        let load: f64 = self.rpm.iter().sum::<f64>() / (MAX_RPM * THRUSTER_COUNT as f64);
        BATTERY_VOLTS - load * VOLTS_SAG_AT_FULL_LOAD
    }
}

/// Sensor encoding as the vehicle does it. Never produces the dead value 0.
fn encode(value: f64, min: f64, max: f64) -> u16 {
    let raw = LinearMapping::new(min, max, 0.0, f64::from(u16::MAX)).map(value);
    raw.round().clamp(1.0, f64::from(u16::MAX)) as u16
}

/// In-process stand-in for the vehicle's serial slave.
#[derive(Debug)]
pub struct SimulatedVehicle {
    layout: RegisterLayout,
    open: bool,
    image: [u16; REGISTER_COUNT],
    plant: Plant,
    injector: LinkFaultInjector,
    last_error: CommErrorCode,
    error_count: u8,
}

impl SimulatedVehicle {
    pub fn new(layout: RegisterLayout, faults: FaultInjectionConfig) -> Self {
        let mut vehicle = Self {
            layout,
            open: false,
            image: [0; REGISTER_COUNT],
            plant: Plant::new(),
            injector: LinkFaultInjector::new_with_config(faults),
            last_error: CommErrorCode::NoError,
            error_count: 0,
        };
        vehicle.publish_sensors();
        vehicle
    }

    /// A fault-free vehicle with the port already open.
    pub fn connected(layout: RegisterLayout) -> Self {
        let mut vehicle = Self::new(layout, FaultInjectionConfig::disabled());
        vehicle.open = true;
        vehicle
    }

    pub fn injector(&self) -> &LinkFaultInjector {
        &self.injector
    }

    pub fn injector_mut(&mut self) -> &mut LinkFaultInjector {
        &mut self.injector
    }

    /// Force the port closed, as if the tether was unplugged.
    pub fn drop_link(&mut self) {
        self.open = false;
    }

    pub fn image(&self) -> [u16; REGISTER_COUNT] {
        self.image
    }

    pub fn depth_m(&self) -> f64 {
        self.plant.depth_m
    }

    fn thruster_commands(&self) -> [f64; THRUSTER_COUNT] {
        let decode = LinearMapping::new(0.0, f64::from(u16::MAX), SPEED_MIN, SPEED_MAX);
        let mut commands = [0.0; THRUSTER_COUNT];
        for (command, &index) in commands.iter_mut().zip(&self.layout.thruster_speed) {
            *command = (decode.map(f64::from(self.image[index])) / SPEED_MAX).clamp(-1.0, 1.0);
        }
        commands
    }

    fn publish_sensors(&mut self) {
        let layout = self.layout;
        let plant = &self.plant;

        self.image[layout.yaw] = encode(plant.yaw_rad, ANGLE_MIN_RAD, ANGLE_MAX_RAD);
        self.image[layout.pitch] = encode(plant.sway(0.0), ANGLE_MIN_RAD, ANGLE_MAX_RAD);
        self.image[layout.roll] = encode(plant.sway(1.3), ANGLE_MIN_RAD, ANGLE_MAX_RAD);
        self.image[layout.depth] = encode(plant.depth_m, DEPTH_MIN_M, DEPTH_MAX_M);
        self.image[layout.voltmeter] = encode(plant.bus_volts(), VOLTMETER_MIN_V, VOLTMETER_MAX_V);

        for i in 0..THRUSTER_COUNT {
            self.image[layout.tachometers[i]] = encode(plant.rpm[i], RPM_MIN, RPM_MAX);
            self.image[layout.thermometers[i]] =
                encode(plant.temperature_c[i], TEMP_MIN_C, TEMP_MAX_C);
        }

        self.image[layout.comm_status] =
            (u16::from(self.last_error.code() as u8) << 8) | u16::from(self.error_count);
    }

    fn report(&mut self, code: CommErrorCode) {
        self.last_error = code;
        self.error_count = self.error_count.wrapping_add(1);
    }

    /// Roll for a fault on this exchange and apply it.
    fn exchange_fault(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let Some(fault) = self.injector.roll_exchange() else {
            return Ok(());
        };
        debug!(?fault, "Injecting link fault");

        match fault {
            LinkFault::Timeout => {
                self.report(CommErrorCode::Polling);
                Err(TransportError::Timeout)
            }
            LinkFault::BadChecksum => {
                self.report(CommErrorCode::BadCrc);
                Err(TransportError::Checksum)
            }
            LinkFault::Framing => {
                self.report(CommErrorCode::BufferOverflow);
                Err(TransportError::Framing("truncated response".into()))
            }
            LinkFault::LinkDrop => {
                warn!("Simulated tether drop");
                self.report(CommErrorCode::Exception);
                self.open = false;
                Err(TransportError::Io("link dropped".into()))
            }
            LinkFault::Stall => {
                std::thread::sleep(Duration::from_millis(self.injector.get_config().stall_ms));
                Ok(())
            }
        }
    }

    fn check_bounds(start: u16, count: usize) -> Result<usize, TransportError> {
        let start = usize::from(start);
        if start + count > REGISTER_COUNT {
            return Err(TransportError::Framing(format!(
                "registers {}..{} outside vehicle map",
                start,
                start + count
            )));
        }
        Ok(start)
    }
}

impl RegisterTransport for SimulatedVehicle {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.injector.roll_open() {
            return Err(TransportError::Io("port open failed".into()));
        }
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_range(&mut self, start: u16, values: &[u16]) -> Result<(), TransportError> {
        let start = Self::check_bounds(start, values.len())?;
        self.exchange_fault()?;
        self.image[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn read_range(&mut self, start: u16, count: u16) -> Result<RegisterBlock, TransportError> {
        let start = Self::check_bounds(start, usize::from(count))?;
        self.exchange_fault()?;

        let commands = self.thruster_commands();
        self.plant.step(&commands);
        self.publish_sensors();

        Ok(self.image[start..start + usize::from(count)].iter().copied().collect())
    }
}
