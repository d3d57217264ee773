use serde::{Deserialize, Serialize};

// Per-exchange fault rate for a noisy tether
const EXCHANGE_FAULT_RATE_PERCENT: f32 = 1.0;
const OPEN_FAULT_RATE_PERCENT: f32 = 20.0;

// Fault kind weights
const TIMEOUT_WEIGHT: u8 = 40;
const CHECKSUM_WEIGHT: u8 = 35;
const FRAMING_WEIGHT: u8 = 15;
const LINK_DROP_WEIGHT: u8 = 5;
const STALL_WEIGHT: u8 = 5;

const DEFAULT_STALL_MS: u64 = 25;

/// Fault applied to a single simulated exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFault {
    Timeout,
    BadChecksum,
    Framing,
    /// The port goes away and has to be reopened.
    LinkDrop,
    /// The exchange succeeds but only after `stall_ms`.
    Stall,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FaultInjectionStats {
    pub exchanges_seen: u32,
    pub total_faults_injected: u32,
    pub timeouts: u32,
    pub checksum_errors: u32,
    pub framing_errors: u32,
    pub link_drops: u32,
    pub stalls: u32,
    pub open_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultInjectionConfig {
    pub enabled: bool,
    pub exchange_rate_percent: f32,
    pub open_rate_percent: f32,
    pub timeout_weight: u8,
    pub checksum_weight: u8,
    pub framing_weight: u8,
    pub link_drop_weight: u8,
    pub stall_weight: u8,
    pub stall_ms: u64,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exchange_rate_percent: EXCHANGE_FAULT_RATE_PERCENT,
            open_rate_percent: OPEN_FAULT_RATE_PERCENT,
            timeout_weight: TIMEOUT_WEIGHT,
            checksum_weight: CHECKSUM_WEIGHT,
            framing_weight: FRAMING_WEIGHT,
            link_drop_weight: LINK_DROP_WEIGHT,
            stall_weight: STALL_WEIGHT,
            stall_ms: DEFAULT_STALL_MS,
        }
    }
}

impl FaultInjectionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Default weights with a custom per-exchange rate.
    pub fn with_rate(exchange_rate_percent: f32) -> Self {
        Self {
            exchange_rate_percent,
            ..Self::default()
        }
    }
}

/// Probabilistic link fault source
#[derive(Debug)]
pub struct LinkFaultInjector {
    config: FaultInjectionConfig,
    stats: FaultInjectionStats,

    // Simple Linear Congruential Generator for deterministic testing
    rng_state: u64,
}

impl LinkFaultInjector {
    pub fn new() -> Self {
        Self::new_with_config(FaultInjectionConfig::default())
    }

    pub fn new_with_config(config: FaultInjectionConfig) -> Self {
        Self {
            config,
            stats: FaultInjectionStats::default(),
            rng_state: 0x1234_5678_9ABC_DEF0, // Fixed seed for deterministic behavior
        }
    }

    /// Decide the fate of one read or write exchange.
    pub fn roll_exchange(&mut self) -> Option<LinkFault> {
        if !self.config.enabled {
            return None;
        }

        self.stats.exchanges_seen = self.stats.exchanges_seen.saturating_add(1);
        if !self.chance(self.config.exchange_rate_percent) {
            return None;
        }

        let fault = self.select_fault()?;
        self.record(fault);
        Some(fault)
    }

    /// True if this attempt to open the port should fail.
    pub fn roll_open(&mut self) -> bool {
        if !self.config.enabled {
            return false;
        }

        let fail = self.chance(self.config.open_rate_percent);
        if fail {
            self.stats.open_failures = self.stats.open_failures.saturating_add(1);
        }
        fail
    }

    fn chance(&mut self, rate_percent: f32) -> bool {
        rate_percent >= 100.0 || self.random_float() < rate_percent / 100.0
    }

    /// Select fault kind based on weighted probabilities
    fn select_fault(&mut self) -> Option<LinkFault> {
        let weights = [
            (LinkFault::Timeout, self.config.timeout_weight),
            (LinkFault::BadChecksum, self.config.checksum_weight),
            (LinkFault::Framing, self.config.framing_weight),
            (LinkFault::LinkDrop, self.config.link_drop_weight),
            (LinkFault::Stall, self.config.stall_weight),
        ];
        let total: u32 = weights.iter().map(|&(_, w)| u32::from(w)).sum();
        if total == 0 {
            return None;
        }

        let mut pick = u32::from(self.random_u8()) * total / 256;
        for (fault, weight) in weights {
            let weight = u32::from(weight);
            if pick < weight {
                return Some(fault);
            }
            pick -= weight;
        }
        None
    }

    fn record(&mut self, fault: LinkFault) {
        self.stats.total_faults_injected += 1;

        match fault {
            LinkFault::Timeout => self.stats.timeouts += 1,
            LinkFault::BadChecksum => self.stats.checksum_errors += 1,
            LinkFault::Framing => self.stats.framing_errors += 1,
            LinkFault::LinkDrop => self.stats.link_drops += 1,
            LinkFault::Stall => self.stats.stalls += 1,
        }
    }

    pub fn get_stats(&self) -> &FaultInjectionStats {
        &self.stats
    }

    pub fn get_config(&self) -> &FaultInjectionConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    fn next_random(&mut self) -> u64 {
        // Linear Congruential Generator: X(n+1) = (aX(n) + c) mod m
        // Using parameters from Numerical Recipes
        self.rng_state = self.rng_state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.rng_state
    }

    fn random_u8(&mut self) -> u8 {
        (self.next_random() >> 24) as u8
    }

    fn random_float(&mut self) -> f32 {
        (self.next_random() as f32) / (u64::MAX as f32)
    }
}

impl Default for LinkFaultInjector {
    fn default() -> Self {
        Self::new()
    }
}
