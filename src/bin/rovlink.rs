use clap::{App, Arg, ArgMatches};
use colored::*;
use rovlink::devices::Device;
use rovlink::fault_injection::FaultInjectionConfig;
use rovlink::{
    ConnectionState, SimulatedVehicle, StationConfig, Vehicle, VehicleSnapshot, REFERENCE_LAYOUT,
};
use std::time::Duration;
use tracing::{info, Level};

const DEFAULT_TICKS: &str = "500";
const DEFAULT_FAULT_RATE: &str = "0";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("rovlink")
        .version("0.1.0")
        .about("ROV surface station register link, running against a simulated vehicle")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Station config (JSON)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Serial port name")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("baud")
                .short("b")
                .long("baud")
                .value_name("BAUD")
                .help("Serial baud rate")
                .takes_value(true)
                .validator(is_number),
        )
        .arg(
            Arg::with_name("interval")
                .short("i")
                .long("interval")
                .value_name("MS")
                .help("Sync tick interval in milliseconds")
                .takes_value(true)
                .validator(is_number),
        )
        .arg(
            Arg::with_name("ticks")
                .short("t")
                .long("ticks")
                .value_name("N")
                .help("Number of ticks to run before printing the final snapshot")
                .takes_value(true)
                .default_value(DEFAULT_TICKS)
                .validator(is_number),
        )
        .arg(
            Arg::with_name("fault-rate")
                .long("fault-rate")
                .value_name("PERCENT")
                .help("Per-exchange link fault rate for the simulated vehicle")
                .takes_value(true)
                .default_value(DEFAULT_FAULT_RATE)
                .validator(|v| match v.parse::<f32>() {
                    Ok(rate) if (0.0..=100.0).contains(&rate) => Ok(()),
                    _ => Err("Fault rate must be a number between 0 and 100".into()),
                }),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    if matches.is_present("verbose") {
        tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let config = station_config(&matches)?;
    let ticks: u32 = matches.value_of("ticks").unwrap_or(DEFAULT_TICKS).parse()?;
    let fault_rate: f32 = matches.value_of("fault-rate").unwrap_or(DEFAULT_FAULT_RATE).parse()?;
    let format = matches.value_of("format").unwrap_or("table");

    let faults = if fault_rate > 0.0 {
        FaultInjectionConfig::with_rate(fault_rate)
    } else {
        FaultInjectionConfig::disabled()
    };
    let transport = SimulatedVehicle::new(REFERENCE_LAYOUT, faults);
    let (vehicle, scheduler) = Vehicle::build(transport, REFERENCE_LAYOUT, &config)?;

    // Slow ahead, descend, open the gripper, lights on.
    for thruster in &vehicle.thrusters()[..4] {
        thruster.speed.set_value(8000.0)?;
    }
    for thruster in &vehicle.thrusters()[4..] {
        thruster.speed.set_value(12000.0)?;
    }
    if let Some(gripper) = vehicle.manipulator(0) {
        gripper.set_value(120.0)?;
    }
    vehicle.relays().set_relay(0, true)?;

    let sync = scheduler.spawn();
    let run_for = config.update_interval() * ticks;
    info!(ticks, run_ms = run_for.as_millis() as u64, "Running sync loop");
    tokio::time::sleep(run_for).await;

    let scheduler = sync.stop().await;
    let snapshot = vehicle.snapshot();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        _ => print_table(&vehicle, &snapshot),
    }

    if let Some(scheduler) = scheduler {
        let stats = scheduler.transport().injector().get_stats();
        if stats.total_faults_injected > 0 || stats.open_failures > 0 {
            println!(
                "{} {} faults injected over {} exchanges, {} failed opens",
                "⚠️".yellow(),
                stats.total_faults_injected.to_string().bright_yellow(),
                stats.exchanges_seen,
                stats.open_failures
            );
        }
    }

    Ok(())
}

fn is_number(v: String) -> Result<(), String> {
    match v.parse::<u64>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Value must be a positive integer".into()),
    }
}

fn station_config(matches: &ArgMatches<'_>) -> Result<StationConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => StationConfig::load(path)?,
        None => StationConfig::default(),
    };

    if let Some(port) = matches.value_of("port") {
        config.port_name = port.to_string();
    }
    if let Some(baud) = matches.value_of("baud") {
        config.baud_rate = baud.parse()?;
    }
    if let Some(interval) = matches.value_of("interval") {
        config.update_interval_ms = interval.parse()?;
    }

    config.validate()?;
    Ok(config)
}

fn flag(ok: bool) -> ColoredString {
    if ok {
        "OK".bright_green()
    } else {
        "DEAD".bright_red()
    }
}

fn warning(active: bool, label: &str) -> ColoredString {
    if active {
        label.bright_red().bold()
    } else {
        "-".dimmed()
    }
}

fn print_table(vehicle: &Vehicle, snapshot: &VehicleSnapshot) {
    let connection = match snapshot.connection {
        ConnectionState::Connected => "CONNECTED".bright_green(),
        ConnectionState::Degraded => "DEGRADED".bright_yellow(),
        ConnectionState::Disconnected => "DISCONNECTED".bright_red(),
    };

    println!("\n{}", "🌊 ROV Link Status".bright_blue().bold());
    println!("{}", "══════════════════".bright_blue());
    println!("{} {}", "Link:".bright_white(), connection);
    println!(
        "{} {} (count {})",
        "Last comm error:".bright_white(),
        snapshot.comm_error_text,
        snapshot.comm_error_count
    );

    println!("\n{}", "Thrusters".bright_white().bold());
    println!(
        "  {:<3} {:>10} {:>9} {:>8} {:>6} {:>6} {:>6}",
        "#", "command", "rpm", "temp °C", "state", "speed", "heat"
    );
    for state in &snapshot.thrusters {
        let command = state
            .speed_command
            .map_or_else(|| "-".to_string(), |v| format!("{:.0}", v));
        println!(
            "  {:<3} {:>10} {:>9.0} {:>8.1} {:>6} {:>6} {:>6}",
            state.id,
            command,
            state.rpm,
            state.temperature_c,
            flag(state.alive),
            warning(state.over_rpm, "OVER"),
            warning(state.over_temp, "HOT"),
        );
    }

    let avionics = &snapshot.avionics;
    println!("\n{} {}", "Avionics".bright_white().bold(), flag(vehicle.avionics().is_alive()));
    println!(
        "  yaw {:+.3} rad  pitch {:+.3} rad  roll {:+.3} rad",
        avionics.yaw_rad, avionics.pitch_rad, avionics.roll_rad
    );
    println!("  depth {:.2} m ({})", avionics.depth_m, flag(avionics.depth_alive));

    println!("\n{}", "Auxiliaries".bright_white().bold());
    for (i, value) in snapshot.manipulators.iter().enumerate() {
        if let Some(value) = value {
            println!("  manipulator[{}] {:+.0}", i, value);
        }
    }
    println!("  relays {:#018b}", snapshot.relay_mask);
    println!("  bus {:.2} V ({})", snapshot.voltage_v, flag(snapshot.voltmeter_alive));

    let stats = &snapshot.stats;
    println!("\n{}", "📊 Sync Statistics".bright_white().bold());
    println!(
        "  ticks {}  high {}  low {}  failed {}  watchdog {}  reconnects {}/{}  last {} µs",
        stats.ticks.to_string().bright_cyan(),
        stats.high_priority_exchanges,
        stats.low_priority_exchanges,
        stats.failed_exchanges.to_string().bright_yellow(),
        stats.watchdog_trips.to_string().bright_yellow(),
        stats.reconnects,
        stats.reconnect_attempts,
        stats.last_exchange_us
    );
}
