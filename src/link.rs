//! Link health shared between the sync loop and the rest of the station.
//!
//! The sync loop is the only writer. Everything else reads through a
//! [`LinkMonitor`] handle, which keeps the connection state, the exchange
//! watchdog, loop statistics and a bounded event history behind one lock.

use heapless::Vec;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const MAX_LINK_EVENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport closed, or the last exchange failed outright.
    Disconnected,
    Connected,
    /// Transport open but the watchdog caught an exchange overrunning its deadline.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkEvent {
    Connected,
    Reconnected,
    ReconnectFailed,
    Recovered,
    ExchangeFailed,
    WatchdogTripped,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEventRecord {
    pub event: LinkEvent,
    pub timestamp_ms: u64,
    pub tick: u64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncStats {
    pub ticks: u64,
    pub high_priority_exchanges: u64,
    pub low_priority_exchanges: u64,
    pub failed_exchanges: u64,
    pub watchdog_trips: u64,
    pub reconnect_attempts: u64,
    pub reconnects: u64,
    pub last_exchange_us: u32,
}

/// Exchange deadline check.
///
/// Armed when an exchange starts and disarmed when it ends. It reads as
/// tripped at the next check if the exchange never ended or took longer than
/// the deadline.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    deadline: Duration,
    armed_at: Option<Instant>,
    overran: bool,
}

impl Watchdog {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            armed_at: None,
            overran: false,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
        self.overran = false;
    }

    pub fn disarm(&mut self, now: Instant) {
        if let Some(started) = self.armed_at.take() {
            self.overran = now.saturating_duration_since(started) > self.deadline;
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.armed_at.is_some() || self.overran
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn clear(&mut self) {
        self.armed_at = None;
        self.overran = false;
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[derive(Debug)]
struct LinkState {
    connection: ConnectionState,
    watchdog: Watchdog,
    stats: SyncStats,
    events: Vec<LinkEventRecord, MAX_LINK_EVENTS>,
    started: Instant,
}

/// Cloneable handle to the shared link state.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    state: Arc<Mutex<LinkState>>,
}

impl LinkMonitor {
    pub fn new(connection: ConnectionState, watchdog_deadline: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState {
                connection,
                watchdog: Watchdog::new(watchdog_deadline),
                stats: SyncStats::default(),
                events: Vec::new(),
                started: Instant::now(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection(&self) -> ConnectionState {
        self.lock().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection() == ConnectionState::Connected
    }

    pub fn watchdog(&self) -> Watchdog {
        self.lock().watchdog
    }

    pub fn stats(&self) -> SyncStats {
        self.lock().stats.clone()
    }

    pub fn events(&self) -> alloc::vec::Vec<LinkEventRecord> {
        self.lock().events.iter().cloned().collect()
    }

    pub fn last_event(&self) -> Option<LinkEventRecord> {
        self.lock().events.last().cloned()
    }

    /// Start of a tick on an open transport. Returns true if the previous
    /// exchange tripped the watchdog; the trip is consumed.
    pub(crate) fn begin_tick(&self) -> bool {
        let mut state = self.lock();
        state.stats.ticks += 1;
        let tripped = state.watchdog.is_tripped();
        if tripped {
            state.watchdog.clear();
            state.connection = ConnectionState::Degraded;
            state.stats.watchdog_trips += 1;
            state.record(LinkEvent::WatchdogTripped, None);
        }
        tripped
    }

    pub(crate) fn begin_exchange(&self, now: Instant) {
        self.lock().watchdog.arm(now);
    }

    /// End of an exchange. `failure` carries the transport error, if any.
    pub(crate) fn end_exchange(&self, now: Instant, started: Instant, failure: Option<String>) {
        let mut state = self.lock();
        state.watchdog.disarm(now);
        state.stats.last_exchange_us =
            u32::try_from(now.saturating_duration_since(started).as_micros()).unwrap_or(u32::MAX);

        match failure {
            Some(detail) => {
                state.connection = ConnectionState::Disconnected;
                state.stats.failed_exchanges += 1;
                state.record(LinkEvent::ExchangeFailed, Some(detail));
            }
            None if state.connection != ConnectionState::Connected => {
                state.connection = ConnectionState::Connected;
                state.record(LinkEvent::Recovered, None);
            }
            None => {}
        }
    }

    pub(crate) fn count_exchange(&self, low_priority: bool) {
        let mut state = self.lock();
        if low_priority {
            state.stats.low_priority_exchanges += 1;
        } else {
            state.stats.high_priority_exchanges += 1;
        }
    }

    pub(crate) fn reconnect_attempted(&self, outcome: Result<(), String>) {
        let mut state = self.lock();
        state.stats.reconnect_attempts += 1;
        match outcome {
            Ok(()) => {
                state.connection = ConnectionState::Connected;
                state.watchdog.clear();
                state.stats.reconnects += 1;
                state.record(LinkEvent::Reconnected, None);
            }
            Err(detail) => {
                state.connection = ConnectionState::Disconnected;
                // Retried every tick; only keep the first of a run.
                let repeat = matches!(
                    state.events.last(),
                    Some(record) if record.event == LinkEvent::ReconnectFailed
                );
                if !repeat {
                    state.record(LinkEvent::ReconnectFailed, Some(detail));
                }
            }
        }
    }

    pub(crate) fn mark_connected(&self) {
        let mut state = self.lock();
        state.connection = ConnectionState::Connected;
        state.record(LinkEvent::Connected, None);
    }

    pub(crate) fn mark_stopped(&self) {
        self.lock().record(LinkEvent::Stopped, None);
    }
}

impl LinkState {
    fn record(&mut self, event: LinkEvent, detail: Option<String>) {
        let record = LinkEventRecord {
            event,
            timestamp_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            tick: self.stats.ticks,
            detail,
        };

        // Add to history (circular buffer)
        if self.events.is_full() {
            self.events.remove(0);
        }

        let _ = self.events.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_fast_exchange_does_not_trip() {
        let mut watchdog = Watchdog::new(Duration::from_millis(10));
        let start = Instant::now();
        assert!(!watchdog.is_tripped());

        watchdog.arm(start);
        assert!(watchdog.is_tripped());
        watchdog.disarm(start + Duration::from_millis(3));
        assert!(!watchdog.is_tripped());
    }

    #[test]
    fn test_watchdog_overrun_trips_until_rearmed() {
        let mut watchdog = Watchdog::new(Duration::from_millis(10));
        let start = Instant::now();

        watchdog.arm(start);
        watchdog.disarm(start + Duration::from_millis(11));
        assert!(watchdog.is_tripped());
        assert!(!watchdog.is_armed());

        watchdog.arm(start + Duration::from_millis(20));
        watchdog.disarm(start + Duration::from_millis(21));
        assert!(!watchdog.is_tripped());

        watchdog.arm(start);
        watchdog.clear();
        assert!(!watchdog.is_tripped());
    }

    #[test]
    fn test_monitor_exchange_cycle() {
        let link = LinkMonitor::new(ConnectionState::Connected, Duration::from_millis(10));
        let start = Instant::now();

        assert!(!link.begin_tick());
        link.begin_exchange(start);
        assert!(link.watchdog().is_armed());
        link.end_exchange(start + Duration::from_millis(1), start, None);
        assert!(link.is_connected());

        assert!(!link.begin_tick());
        link.begin_exchange(start);
        link.end_exchange(start, start, Some("Exchange timed out".into()));
        assert_eq!(link.connection(), ConnectionState::Disconnected);
        assert_eq!(link.last_event().map(|e| e.event), Some(LinkEvent::ExchangeFailed));

        let stats = link.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.failed_exchanges, 1);
    }

    #[test]
    fn test_overrun_degrades_link_once() {
        let link = LinkMonitor::new(ConnectionState::Connected, Duration::from_millis(10));
        let start = Instant::now();

        assert!(!link.begin_tick());
        link.begin_exchange(start);
        link.end_exchange(start + Duration::from_millis(40), start, None);
        assert!(link.is_connected());

        assert!(link.begin_tick());
        assert_eq!(link.connection(), ConnectionState::Degraded);
        assert_eq!(link.last_event().map(|e| e.event), Some(LinkEvent::WatchdogTripped));

        // Consumed by the first check.
        assert!(!link.begin_tick());
        link.begin_exchange(start);
        link.end_exchange(start + Duration::from_millis(1), start, None);
        assert!(link.is_connected());
        assert_eq!(link.last_event().map(|e| e.event), Some(LinkEvent::Recovered));
        assert_eq!(link.stats().watchdog_trips, 1);
    }

    #[test]
    fn test_repeated_reconnect_failures_logged_once() {
        let link = LinkMonitor::new(ConnectionState::Disconnected, Duration::from_millis(10));
        for _ in 0..5 {
            link.reconnect_attempted(Err("port busy".into()));
        }
        assert_eq!(link.events().len(), 1);
        assert_eq!(link.stats().reconnect_attempts, 5);

        link.reconnect_attempted(Ok(()));
        assert!(link.is_connected());
        assert_eq!(link.stats().reconnects, 1);
    }

    #[test]
    fn test_event_history_is_bounded() {
        let link = LinkMonitor::new(ConnectionState::Connected, Duration::from_millis(10));
        for _ in 0..(MAX_LINK_EVENTS + 8) {
            link.mark_connected();
        }
        assert_eq!(link.events().len(), MAX_LINK_EVENTS);
    }
}
