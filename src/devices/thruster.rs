use super::Device;
use crate::channels::{InputChannel, OutputChannel};
use crate::error::LayoutError;
use crate::registers::{
    RegisterLayout, RegisterTable, TACHOMETER_NAMES, THERMOMETER_NAMES, THRUSTER_COUNT,
    THRUSTER_SPEED_NAMES,
};
use serde::{Deserialize, Serialize};

pub const SPEED_MIN: f64 = i16::MIN as f64;
pub const SPEED_MAX: f64 = i16::MAX as f64;
pub const RPM_MIN: f64 = 0.0;
pub const RPM_MAX: f64 = u16::MAX as f64;
pub const TEMP_MIN_C: f64 = 0.0;
pub const TEMP_MAX_C: f64 = 100.0;

pub const OVER_RPM_LIMIT: f64 = 1000.0;
pub const OVER_TEMP_LIMIT_C: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrusterState {
    pub id: usize,
    pub speed_command: Option<f64>,
    pub rpm: f64,
    pub temperature_c: f64,
    pub over_rpm: bool,
    pub over_temp: bool,
    pub alive: bool,
}

/// One propulsion unit: speed command plus rpm and motor temperature feedback.
#[derive(Debug)]
pub struct Thruster {
    id: usize,
    pub speed: OutputChannel,
    pub tachometer: InputChannel,
    pub thermometer: InputChannel,
}

impl Thruster {
    pub fn new(
        registers: &RegisterTable,
        layout: &RegisterLayout,
        id: usize,
    ) -> Result<Self, LayoutError> {
        if id >= THRUSTER_COUNT {
            return Err(LayoutError::IndexOutOfBounds {
                name: "thruster",
                index: id,
                len: THRUSTER_COUNT,
            });
        }

        Ok(Self {
            id,
            speed: OutputChannel::new(
                registers,
                THRUSTER_SPEED_NAMES[id],
                layout.thruster_speed[id],
                SPEED_MIN,
                SPEED_MAX,
            )?,
            tachometer: InputChannel::new(
                registers,
                TACHOMETER_NAMES[id],
                layout.tachometers[id],
                RPM_MIN,
                RPM_MAX,
            )?,
            thermometer: InputChannel::new(
                registers,
                THERMOMETER_NAMES[id],
                layout.thermometers[id],
                TEMP_MIN_C,
                TEMP_MAX_C,
            )?,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn over_rpm(&self) -> bool {
        self.tachometer.value() > OVER_RPM_LIMIT
    }

    pub fn over_temp(&self) -> bool {
        self.thermometer.value() > OVER_TEMP_LIMIT_C
    }
}

impl Device for Thruster {
    type State = ThrusterState;

    fn get_state(&self) -> Self::State {
        ThrusterState {
            id: self.id,
            speed_command: self.speed.value(),
            rpm: self.tachometer.value(),
            temperature_c: self.thermometer.value(),
            over_rpm: self.over_rpm(),
            over_temp: self.over_temp(),
            alive: self.is_alive(),
        }
    }

    fn is_alive(&self) -> bool {
        self.tachometer.is_alive() && self.thermometer.is_alive()
    }
}
