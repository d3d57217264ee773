//! Tiered register exchange loop.
//!
//! Every tick writes the propulsion commands and reads back orientation and
//! depth. Every `low_priority_divisor` ticks the auxiliary outputs and the
//! diagnostic registers are exchanged first. Transport failures never leave
//! this module; they show up as link state, watchdog trips and a zeroed
//! register table.

use crate::config::StationConfig;
use crate::error::TransportError;
use crate::link::LinkMonitor;
use crate::registers::{RegisterRange, RegisterTable, TierLayout};
use crate::transport::RegisterTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Reconnected,
    ReconnectFailed,
    /// The previous exchange overran; the table was zeroed and nothing was sent.
    WatchdogTripped,
    Exchanged { low_priority: bool },
    Failed,
}

pub struct SyncScheduler<T> {
    transport: T,
    registers: RegisterTable,
    tiers: TierLayout,
    link: LinkMonitor,
    interval: Duration,
    low_priority_divisor: u32,
    tick_counter: u32,
}

impl<T: RegisterTransport> SyncScheduler<T> {
    /// Starts out connected if the transport is already open.
    pub fn new(
        transport: T,
        registers: RegisterTable,
        tiers: TierLayout,
        link: LinkMonitor,
        config: &StationConfig,
    ) -> Self {
        if transport.is_open() {
            link.mark_connected();
        }

        Self {
            transport,
            registers,
            tiers,
            link,
            interval: config.update_interval(),
            low_priority_divisor: config.low_priority_divisor.max(1),
            tick_counter: 0,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.transport.is_open() {
            return if self.reconnect() {
                TickOutcome::Reconnected
            } else {
                TickOutcome::ReconnectFailed
            };
        }

        if self.link.begin_tick() {
            // The cadence follows ticks, so a low-priority slot falling here is lost.
            self.advance_tier_counter();
            // Nothing commanded or sensed before the overrun may be trusted.
            self.registers.zero_all();
            warn!(
                deadline_ms = self.link.watchdog().deadline().as_millis() as u64,
                "Exchange watchdog tripped, register table zeroed"
            );
            return TickOutcome::WatchdogTripped;
        }

        let was_connected = self.link.is_connected();
        let started = Instant::now();
        self.link.begin_exchange(started);
        let result = self.exchange();
        let finished = Instant::now();

        match result {
            Ok(low_priority) => {
                self.link.end_exchange(finished, started, None);
                if !was_connected {
                    info!("Link recovered");
                }
                trace!(low_priority, "Tick complete");
                TickOutcome::Exchanged { low_priority }
            }
            Err(e) => {
                warn!(error = %e, "Register exchange failed, link marked disconnected");
                self.link.end_exchange(finished, started, Some(e.to_string()));
                TickOutcome::Failed
            }
        }
    }

    /// Try to reopen a closed transport. Failures are swallowed and retried
    /// on the next tick.
    pub fn reconnect(&mut self) -> bool {
        if self.transport.is_open() {
            return self.link.is_connected();
        }

        match self.transport.open() {
            Ok(()) => {
                self.link.reconnect_attempted(Ok(()));
                info!("Transport reopened, link connected");
                true
            }
            Err(e) => {
                debug!(error = %e, "Reconnect attempt failed");
                self.link.reconnect_attempted(Err(e.to_string()));
                false
            }
        }
    }

    /// Count one tick; true when the low-priority tier is due.
    fn advance_tier_counter(&mut self) -> bool {
        self.tick_counter += 1;
        if self.tick_counter >= self.low_priority_divisor {
            self.tick_counter = 0;
            return true;
        }
        false
    }

    /// Returns whether the low-priority tier went out this tick.
    fn exchange(&mut self) -> Result<bool, TransportError> {
        let low_priority = self.advance_tier_counter();
        if low_priority {
            self.low_priority_exchange()?;
        }

        self.high_priority_exchange()?;
        Ok(low_priority)
    }

    fn high_priority_exchange(&mut self) -> Result<(), TransportError> {
        self.write_range(self.tiers.high_write)?;
        self.read_range(self.tiers.high_read)?;
        self.link.count_exchange(false);
        Ok(())
    }

    fn low_priority_exchange(&mut self) -> Result<(), TransportError> {
        self.write_range(self.tiers.low_write)?;
        self.read_range(self.tiers.low_read)?;
        self.link.count_exchange(true);
        debug!("Low-priority exchange complete");
        Ok(())
    }

    fn write_range(&mut self, range: RegisterRange) -> Result<(), TransportError> {
        let block = self.registers.read_range(range);
        self.transport.write_range(range.start as u16, &block)
    }

    fn read_range(&mut self, range: RegisterRange) -> Result<(), TransportError> {
        let block = self.transport.read_range(range.start as u16, range.count as u16)?;
        if block.len() != range.count {
            return Err(TransportError::Framing(format!(
                "expected {} registers from {}, got {}",
                range.count,
                range.start,
                block.len()
            )));
        }

        self.registers
            .apply_range(range.start, &block)
            .map_err(|e| TransportError::Framing(e.to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Ticks since the last low-priority exchange.
    pub fn tick_counter(&self) -> u32 {
        self.tick_counter
    }

    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }

    pub fn registers(&self) -> &RegisterTable {
        &self.registers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<T: RegisterTransport + 'static> SyncScheduler<T> {
    /// Run the loop on the tokio runtime until [`SyncHandle::stop`].
    pub fn spawn(self) -> SyncHandle<T> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let link = self.link.clone();
        let task = tokio::spawn(run_loop(self, shutdown_rx, Arc::clone(&running)));

        SyncHandle {
            shutdown: shutdown_tx,
            running,
            link,
            task,
        }
    }
}

async fn run_loop<T: RegisterTransport + 'static>(
    mut scheduler: SyncScheduler<T>,
    mut shutdown: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
) -> Option<SyncScheduler<T>> {
    let mut interval = time::interval(scheduler.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_ms = scheduler.interval.as_millis() as u64, "Sync loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        // Transport calls block; keep them off the async workers.
        let joined = tokio::task::spawn_blocking(move || {
            scheduler.tick();
            scheduler
        })
        .await;

        scheduler = match joined {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!(error = %e, "Sync tick panicked, loop stopped");
                running.store(false, Ordering::SeqCst);
                return None;
            }
        };
    }

    running.store(false, Ordering::SeqCst);
    scheduler.link.mark_stopped();
    info!("Sync loop stopped");
    Some(scheduler)
}

/// Control handle for a spawned sync loop.
pub struct SyncHandle<T> {
    shutdown: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    link: LinkMonitor,
    task: JoinHandle<Option<SyncScheduler<T>>>,
}

impl<T> SyncHandle<T> {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }

    /// Ask the loop to stop after the tick in progress, without waiting.
    pub fn request_stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop the loop and wait for it. No exchange starts after this returns.
    /// Hands the scheduler back unless a tick panicked.
    pub async fn stop(self) -> Option<SyncScheduler<T>> {
        self.request_stop();
        match self.task.await {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!(error = %e, "Sync loop task failed");
                None
            }
        }
    }
}
