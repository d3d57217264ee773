//! Link diagnostics maintained by the vehicle's serial slave.
//!
//! The vehicle packs its last communication error code (signed, high byte)
//! and a free-running error counter (low byte) into one status register.

use crate::channels::InputChannel;
use crate::error::LayoutError;
use crate::registers::{RegisterLayout, RegisterTable};
use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommErrorCode {
    NoError,
    NotMaster,
    Polling,
    BufferOverflow,
    BadCrc,
    Exception,
    Unknown(i8),
}

impl From<i8> for CommErrorCode {
    fn from(code: i8) -> Self {
        match code {
            0 => CommErrorCode::NoError,
            -1 => CommErrorCode::NotMaster,
            -2 => CommErrorCode::Polling,
            -3 => CommErrorCode::BufferOverflow,
            -4 => CommErrorCode::BadCrc,
            -5 => CommErrorCode::Exception,
            other => CommErrorCode::Unknown(other),
        }
    }
}

impl CommErrorCode {
    pub fn code(&self) -> i8 {
        match self {
            CommErrorCode::NoError => 0,
            CommErrorCode::NotMaster => -1,
            CommErrorCode::Polling => -2,
            CommErrorCode::BufferOverflow => -3,
            CommErrorCode::BadCrc => -4,
            CommErrorCode::Exception => -5,
            CommErrorCode::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for CommErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommErrorCode::NoError => write!(f, "0: No Error"),
            CommErrorCode::NotMaster => write!(f, "-1: You are not a master device"),
            CommErrorCode::Polling => write!(f, "-2: Error polling slave"),
            CommErrorCode::BufferOverflow => write!(f, "-3: Slave received data buffer overflow"),
            CommErrorCode::BadCrc => write!(f, "-4: Bad checksum on message"),
            CommErrorCode::Exception => write!(f, "-5: Communication exception"),
            CommErrorCode::Unknown(code) => write!(f, "unknown error {}", code),
        }
    }
}

/// Errors counted between two readings of the 8-bit counter.
pub fn errors_since(previous: u8, current: u8) -> u8 {
    current.wrapping_sub(previous)
}

#[derive(Debug)]
pub struct CommStatus {
    channel: InputChannel,
}

impl CommStatus {
    pub fn new(registers: &RegisterTable, layout: &RegisterLayout) -> Result<Self, LayoutError> {
        Ok(Self {
            channel: InputChannel::new(
                registers,
                "comm_status",
                layout.comm_status,
                f64::from(u16::MIN),
                f64::from(u16::MAX),
            )?,
        })
    }

    pub fn last_error_code(&self) -> i8 {
        (self.channel.raw() >> 8) as u8 as i8
    }

    pub fn last_error(&self) -> CommErrorCode {
        CommErrorCode::from(self.last_error_code())
    }

    pub fn error_count(&self) -> u8 {
        (self.channel.raw() & 0x00FF) as u8
    }

    pub fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }
}
