//! Command line driver for the exposure notification beacon
//!
//! `advertise` broadcasts an identifier until Enter is pressed, `listen`
//! prints identifiers heard from other beacons.

use clap::{Parser, Subcommand};
use ctbeacon::{Beacon, BeaconError, Identifier};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::time::{Duration, Instant, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "ctbeacon", about = "Exposure notification BLE beacon")]
struct Cli {
    /// HCI device to use
    #[arg(short, long, default_value = "hci0")]
    device: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advertise an identifier until Enter is pressed
    Advertise {
        /// Identifier as 32 hex digits; random if omitted
        #[arg(short, long, conflicts_with = "demo")]
        identifier: Option<Identifier>,

        /// Advertise the identifier 00 01 02 .. 0f
        #[arg(long)]
        demo: bool,
    },
    /// Print identifiers advertised by nearby beacons
    Listen {
        /// Stop after this many seconds; run until interrupted if omitted
        #[arg(short, long)]
        duration: Option<u64>,

        /// Longest single wait for an event, in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

fn advertise(beacon: &mut Beacon, identifier: Identifier) -> Result<(), Box<dyn std::error::Error>> {
    beacon.start_advertising(identifier.as_bytes())?;
    println!("Advertising {}...", identifier);
    println!("Press Enter to stop advertising");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    beacon.stop_advertising()?;
    println!("Advertising stopped.");
    Ok(())
}

fn listen(beacon: &mut Beacon, duration: Option<Duration>, poll: Duration) -> Result<(), BeaconError> {
    beacon.start_listening()?;
    log::info!("Listening for exposure notification beacons");

    let start = Instant::now();
    let result = loop {
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break Ok(());
        }

        let observations = match beacon.poll_for_identifier(poll) {
            Ok(observations) => observations,
            Err(e) => break Err(e),
        };

        for observation in observations {
            let timestamp = observation
                .timestamp
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            println!(
                "{}.{:03} {} {:>4} {}",
                timestamp.as_secs(),
                timestamp.subsec_millis(),
                observation.address,
                observation.rssi,
                observation.identifier
            );
        }
    };

    beacon.stop_listening()?;
    result
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let mut beacon = match Beacon::open(&cli.device) {
        Ok(beacon) => beacon,
        Err(e) => {
            eprintln!("Failed to open {}: {}", cli.device, e);
            eprintln!("This might be because:");
            eprintln!("1. No Bluetooth adapter with that name is available");
            eprintln!("2. The Bluetooth adapter is not powered on");
            eprintln!("3. You don't have sufficient permissions to access the Bluetooth device");
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Advertise { identifier, demo } => {
            let identifier = match identifier {
                Some(identifier) => identifier,
                None if demo => {
                    let mut bytes = [0u8; 16];
                    for (i, b) in bytes.iter_mut().enumerate() {
                        *b = i as u8;
                    }
                    Identifier::new(bytes)
                }
                None => Identifier::new(rand::random()),
            };
            advertise(&mut beacon, identifier)?;
        }
        Command::Listen { duration, poll_ms } => {
            listen(
                &mut beacon,
                duration.map(Duration::from_secs),
                Duration::from_millis(poll_ms),
            )?;
        }
    }

    Ok(())
}
