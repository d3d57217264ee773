use super::Device;
use crate::channels::InputChannel;
use crate::error::LayoutError;
use crate::registers::{RegisterLayout, RegisterTable};
use core::f64::consts::PI;
use serde::{Deserialize, Serialize};

pub const ANGLE_MIN_RAD: f64 = -PI;
pub const ANGLE_MAX_RAD: f64 = PI;
pub const DEPTH_MIN_M: f64 = 0.0;
pub const DEPTH_MAX_M: f64 = 25.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvionicsState {
    pub yaw_rad: f64,
    pub pitch_rad: f64,
    pub roll_rad: f64,
    pub depth_m: f64,
    pub imu_alive: bool,
    pub depth_alive: bool,
}

/// Orientation and depth sensors, refreshed on every high-priority read.
#[derive(Debug)]
pub struct Avionics {
    pub yaw: InputChannel,
    pub pitch: InputChannel,
    pub roll: InputChannel,
    pub depth: InputChannel,
}

impl Avionics {
    pub fn new(registers: &RegisterTable, layout: &RegisterLayout) -> Result<Self, LayoutError> {
        Ok(Self {
            yaw: InputChannel::new(registers, "yaw", layout.yaw, ANGLE_MIN_RAD, ANGLE_MAX_RAD)?,
            pitch: InputChannel::new(
                registers,
                "pitch",
                layout.pitch,
                ANGLE_MIN_RAD,
                ANGLE_MAX_RAD,
            )?,
            roll: InputChannel::new(registers, "roll", layout.roll, ANGLE_MIN_RAD, ANGLE_MAX_RAD)?,
            depth: InputChannel::new(registers, "depth", layout.depth, DEPTH_MIN_M, DEPTH_MAX_M)?,
        })
    }

    /// All three orientation axes reporting. Depth is tracked on its own.
    pub fn imu_alive(&self) -> bool {
        self.yaw.is_alive() && self.pitch.is_alive() && self.roll.is_alive()
    }
}

impl Device for Avionics {
    type State = AvionicsState;

    fn get_state(&self) -> Self::State {
        AvionicsState {
            yaw_rad: self.yaw.value(),
            pitch_rad: self.pitch.value(),
            roll_rad: self.roll.value(),
            depth_m: self.depth.value(),
            imu_alive: self.imu_alive(),
            depth_alive: self.depth.is_alive(),
        }
    }

    fn is_alive(&self) -> bool {
        self.imu_alive()
    }
}
