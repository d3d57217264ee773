use rovlink::devices::Device;
use rovlink::link::LinkEvent;
use rovlink::transport::{MockCall, MockTransport};
use rovlink::*;
use std::time::Duration;

fn station(transport: &MockTransport) -> (Vehicle, SyncScheduler<MockTransport>) {
    Vehicle::build(transport.clone(), REFERENCE_LAYOUT, &StationConfig::default()).unwrap()
}

const HIGH_WRITE: MockCall = MockCall::Write { start: 0, count: 6 };
const HIGH_READ: MockCall = MockCall::Read { start: 6, count: 4 };
const LOW_WRITE: MockCall = MockCall::Write { start: 10, count: 5 };
const LOW_READ: MockCall = MockCall::Read { start: 15, count: 14 };

#[test]
fn test_tier_cadence_over_25_ticks() {
    let transport = MockTransport::new(true);
    let (_vehicle, mut sync) = station(&transport);

    let mut low_ticks = Vec::new();
    for tick in 1..=25 {
        if let TickOutcome::Exchanged { low_priority: true } = sync.tick() {
            low_ticks.push(tick);
        }
    }

    assert_eq!(low_ticks, vec![10, 20]);
    let stats = sync.link().stats();
    assert_eq!(stats.high_priority_exchanges, 25);
    assert_eq!(stats.low_priority_exchanges, 2);
    assert_eq!(stats.ticks, 25);
    assert_eq!(sync.tick_counter(), 5);
}

#[test]
fn test_writes_precede_reads_in_every_tier() {
    let transport = MockTransport::new(true);
    let (_vehicle, mut sync) = station(&transport);

    for _ in 0..10 {
        sync.tick();
    }

    let calls = transport.calls();
    assert_eq!(calls.len(), 22);
    for pair in calls[..18].chunks(2) {
        assert_eq!(pair, &[HIGH_WRITE, HIGH_READ][..]);
    }
    assert_eq!(&calls[18..], &[LOW_WRITE, LOW_READ, HIGH_WRITE, HIGH_READ][..]);
}

#[test]
fn test_commands_reach_vehicle_on_their_tier() {
    let transport = MockTransport::new(true);
    let (vehicle, mut sync) = station(&transport);

    vehicle.thrusters()[2].speed.set_value(0.0).unwrap();
    vehicle.manipulators()[0].set_value(255.0).unwrap();

    sync.tick();
    assert_eq!(transport.remote()[2], 32768);
    assert_eq!(transport.remote()[10], 0);

    for _ in 0..9 {
        sync.tick();
    }
    assert_eq!(transport.remote()[10], u16::MAX);
}

#[test]
fn test_sensor_values_arrive_through_reads() {
    let transport = MockTransport::new(true);
    let (vehicle, mut sync) = station(&transport);

    transport.set_remote(6, u16::MAX);
    transport.set_remote(9, 65535 / 5);
    transport.set_remote(16, 1500);
    sync.tick();

    assert!((vehicle.avionics().yaw.value() - std::f64::consts::PI).abs() < 1e-9);
    assert!((vehicle.avionics().depth.value() - 5.0).abs() < 1e-3);
    // Tachometers are on the low-priority tier.
    assert!(!vehicle.thrusters()[0].tachometer.is_alive());

    for _ in 0..9 {
        sync.tick();
    }
    assert!(vehicle.thrusters()[0].tachometer.is_alive());
    assert!(vehicle.thrusters()[0].over_rpm());
}

#[test]
fn test_transport_failure_is_absorbed() {
    let transport = MockTransport::new(true);
    let (vehicle, mut sync) = station(&transport);
    assert!(vehicle.is_connected());

    transport.set_fail_all(Some(TransportError::Timeout));
    for _ in 0..3 {
        assert_eq!(sync.tick(), TickOutcome::Failed);
    }
    assert!(!vehicle.is_connected());
    assert_eq!(vehicle.connection_state(), ConnectionState::Disconnected);
    assert_eq!(sync.link().stats().failed_exchanges, 3);

    transport.set_fail_all(None);
    sync.tick();
    assert!(vehicle.is_connected());
    assert_eq!(sync.link().last_event().map(|e| e.event), Some(LinkEvent::Recovered));
}

#[test]
fn test_low_priority_failure_skips_high_priority_tier() {
    let transport = MockTransport::new(true);
    let (_vehicle, mut sync) = station(&transport);

    for _ in 0..9 {
        sync.tick();
    }
    transport.clear_calls();
    transport.fail_next(TransportError::Checksum);

    assert_eq!(sync.tick(), TickOutcome::Failed);
    assert_eq!(transport.calls(), vec![LOW_WRITE]);
    // The counter restarts even though the exchange failed.
    assert_eq!(sync.tick_counter(), 0);
}

#[test]
fn test_watchdog_trip_zeroes_everything() {
    let transport = MockTransport::new(true);
    transport.fill_remote(0x4000);
    let (vehicle, mut sync) = station(&transport);

    vehicle.thrusters()[0].speed.set_value(20000.0).unwrap();
    vehicle.relays().set_mask(0xFFFF).unwrap();
    for _ in 0..10 {
        sync.tick();
    }
    assert!(vehicle.avionics().is_alive());
    assert!(vehicle.thrusters()[0].is_alive());

    // One exchange overruns its deadline, then the link goes quiet.
    transport.set_exchange_delay(Duration::from_millis(30));
    sync.tick();
    transport.set_exchange_delay(Duration::ZERO);
    transport.set_fail_all(Some(TransportError::Timeout));

    assert_eq!(sync.tick(), TickOutcome::WatchdogTripped);
    assert!(!vehicle.is_connected());
    assert_eq!(vehicle.registers().values(), [0; REGISTER_COUNT]);

    assert!(!vehicle.avionics().yaw.is_alive());
    assert!(!vehicle.avionics().depth.is_alive());
    assert!(!vehicle.voltmeter().is_alive());
    assert!(!vehicle.thrusters()[0].is_alive());
    assert!((vehicle.avionics().yaw.value() + std::f64::consts::PI).abs() < 1e-9);
    assert_eq!(vehicle.avionics().depth.value(), 0.0);

    // Commands are remembered but the wire holds the dead encoding.
    assert_eq!(vehicle.thrusters()[0].speed.value(), Some(20000.0));
    assert_eq!(vehicle.thrusters()[0].speed.raw(), 0);
    assert_eq!(vehicle.relays().mask(), 0xFFFF);
    assert_eq!(vehicle.relays().channel().raw(), 0);

    let stats = sync.link().stats();
    assert_eq!(stats.watchdog_trips, 1);
    assert!(sync
        .link()
        .events()
        .iter()
        .any(|record| record.event == LinkEvent::WatchdogTripped));
}

#[test]
fn test_relay_switch_after_trip_restores_only_that_relay() {
    let transport = MockTransport::new(true);
    let (vehicle, mut sync) = station(&transport);
    let relays = vehicle.relays();

    relays.set_mask(0xFFFF).unwrap();
    transport.set_exchange_delay(Duration::from_millis(30));
    sync.tick();
    transport.set_exchange_delay(Duration::ZERO);
    assert_eq!(sync.tick(), TickOutcome::WatchdogTripped);

    relays.set_relay(0, false).unwrap();
    assert_eq!(relays.channel().raw(), 0);
    relays.set_relay(3, true).unwrap();
    assert_eq!(relays.channel().raw(), 0b1000);
    assert_eq!(relays.mask(), 0b1000);

    for _ in 0..10 {
        sync.tick();
    }
    assert_eq!(transport.remote()[REFERENCE_LAYOUT.relays], 0b1000);
}

#[test]
fn test_reconnect_clears_pending_trip_without_wiping() {
    let transport = MockTransport::new(true);
    transport.fill_remote(0x2000);
    let (vehicle, mut sync) = station(&transport);
    vehicle.thrusters()[1].speed.set_value(500.0).unwrap();

    // The overrunning exchange leaves a trip pending, then the port goes away.
    transport.set_exchange_delay(Duration::from_millis(30));
    assert_eq!(sync.tick(), TickOutcome::Exchanged { low_priority: false });
    transport.set_exchange_delay(Duration::ZERO);
    assert!(sync.link().watchdog().is_tripped());
    let before = vehicle.registers().values();

    transport.set_open(false);
    transport.clear_calls();
    assert_eq!(sync.tick(), TickOutcome::Reconnected);
    assert_eq!(transport.calls(), vec![MockCall::Open]);
    assert!(!sync.link().watchdog().is_tripped());
    assert_eq!(vehicle.registers().values(), before);
    assert_eq!(vehicle.connection_state(), ConnectionState::Connected);

    assert_eq!(sync.tick(), TickOutcome::Exchanged { low_priority: false });
    assert!(vehicle.avionics().is_alive());
    assert_eq!(sync.link().stats().watchdog_trips, 0);
}

#[test]
fn test_reconnect_after_port_loss() {
    let transport = MockTransport::new(true);
    let (vehicle, mut sync) = station(&transport);
    sync.tick();

    transport.set_open(false);
    transport.set_open_error(Some(TransportError::Io("device busy".into())));
    transport.clear_calls();

    for _ in 0..5 {
        assert_eq!(sync.tick(), TickOutcome::ReconnectFailed);
    }
    assert!(!vehicle.is_connected());
    assert!(transport.calls().iter().all(|call| *call == MockCall::Open));

    transport.set_open_error(None);
    assert_eq!(sync.tick(), TickOutcome::Reconnected);
    assert!(vehicle.is_connected());

    let stats = sync.link().stats();
    assert_eq!(stats.reconnect_attempts, 6);
    assert_eq!(stats.reconnects, 1);

    let reconnect_failures = sync
        .link()
        .events()
        .iter()
        .filter(|record| record.event == LinkEvent::ReconnectFailed)
        .count();
    assert_eq!(reconnect_failures, 1);
}

#[test]
fn test_reconnect_is_noop_when_open() {
    let transport = MockTransport::new(true);
    let (_vehicle, mut sync) = station(&transport);

    assert!(sync.reconnect());
    assert!(transport.calls().is_empty());
}

#[test]
fn test_starts_disconnected_on_closed_transport() {
    let transport = MockTransport::new(false);
    let (vehicle, mut sync) = station(&transport);
    assert!(!vehicle.is_connected());

    assert_eq!(sync.tick(), TickOutcome::Reconnected);
    assert!(vehicle.is_connected());
    assert_eq!(sync.tick(), TickOutcome::Exchanged { low_priority: false });
}
