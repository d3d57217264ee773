//! Scripted in-memory transport for exercising the sync loop without a vehicle.

use super::RegisterTransport;
use crate::error::TransportError;
use crate::registers::{RegisterBlock, REGISTER_COUNT};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Open,
    Write { start: u16, count: u16 },
    Read { start: u16, count: u16 },
}

#[derive(Debug)]
struct MockState {
    open: bool,
    open_error: Option<TransportError>,
    fail_next: Option<TransportError>,
    fail_all: Option<TransportError>,
    exchange_delay: Duration,
    remote: [u16; REGISTER_COUNT],
    calls: Vec<MockCall>,
}

/// Transport backed by a register image in memory.
///
/// Clones share state, so a test can keep one handle while the scheduler owns
/// the other.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(open: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                open,
                open_error: None,
                fail_next: None,
                fail_all: None,
                exchange_delay: Duration::ZERO,
                remote: [0; REGISTER_COUNT],
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_open(&self, open: bool) {
        self.lock().open = open;
    }

    /// Make `open()` fail with `error` until cleared with `None`.
    pub fn set_open_error(&self, error: Option<TransportError>) {
        self.lock().open_error = error;
    }

    /// Fail only the next read or write.
    pub fn fail_next(&self, error: TransportError) {
        self.lock().fail_next = Some(error);
    }

    /// Fail every read and write until cleared with `None`.
    pub fn set_fail_all(&self, error: Option<TransportError>) {
        self.lock().fail_all = error;
    }

    /// Sleep this long inside every read and write.
    pub fn set_exchange_delay(&self, delay: Duration) {
        self.lock().exchange_delay = delay;
    }

    pub fn set_remote(&self, index: usize, value: u16) {
        self.lock().remote[index] = value;
    }

    pub fn fill_remote(&self, value: u16) {
        self.lock().remote = [value; REGISTER_COUNT];
    }

    pub fn remote(&self) -> [u16; REGISTER_COUNT] {
        self.lock().remote
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn begin_exchange(&self, call: MockCall) -> Result<MutexGuard<'_, MockState>, TransportError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(call);
            state.exchange_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        if let Some(error) = state.fail_all.clone() {
            return Err(error);
        }
        Ok(state)
    }
}

impl RegisterTransport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Open);
        if let Some(error) = state.open_error.clone() {
            return Err(error);
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn write_range(&mut self, start: u16, values: &[u16]) -> Result<(), TransportError> {
        let mut state = self.begin_exchange(MockCall::Write {
            start,
            count: values.len() as u16,
        })?;
        let start = usize::from(start);
        state.remote[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn read_range(&mut self, start: u16, count: u16) -> Result<RegisterBlock, TransportError> {
        let state = self.begin_exchange(MockCall::Read { start, count })?;
        let start = usize::from(start);
        Ok(state.remote[start..start + usize::from(count)].iter().copied().collect())
    }
}
