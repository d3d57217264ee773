//! Register transport seam.
//!
//! The sync loop only needs "write a run of registers" and "read a run of
//! registers" from the link. Framing, checksums and timeouts live behind this
//! trait; every failure comes back as a [`TransportError`].

pub mod mock;

pub use mock::{MockCall, MockTransport};

use crate::error::TransportError;
use crate::registers::RegisterBlock;

pub trait RegisterTransport: Send {
    fn open(&mut self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    /// Write `values` to consecutive registers starting at `start`.
    fn write_range(&mut self, start: u16, values: &[u16]) -> Result<(), TransportError>;

    /// Read `count` consecutive registers starting at `start`.
    fn read_range(&mut self, start: u16, count: u16) -> Result<RegisterBlock, TransportError>;
}
