use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use gimbal_rs::compass::Direction;
use gimbal_rs::error::{ControlError, PointingError};
use gimbal_rs::gps::FixReader;
use gimbal_rs::imu::WitImu;
use gimbal_rs::relay::RelayBank;
use gimbal_rs::signal;
use gimbal_rs::sim::SimGimbal;
use gimbal_rs::{
    ActuatorBank, AttitudeController, Declination, GimbalConfig, OrientationSource, Pointer,
    Position,
};

const IMU_WAIT_ATTEMPTS: u32 = 50;

#[derive(Parser)]
#[command(name = "gimbal")]
#[command(version, about = "Point a relay-driven pan/tilt head at angles, offsets or coordinates", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Drive a simulated head instead of the GPIO relays and IMU
    #[arg(long, global = true)]
    simulate: bool,

    /// Magnetic declination in degrees east, overriding the config
    #[arg(long, value_name = "DEGREES", global = true, allow_negative_numbers = true)]
    declination: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep into every mechanical stop and print the travel envelope
    Calibrate,

    /// Move to a sensor-frame yaw and pitch
    Goto {
        #[arg(long, allow_negative_numbers = true)]
        yaw: f64,
        #[arg(long, allow_negative_numbers = true)]
        pitch: f64,
        #[command(flatten)]
        setup: Setup,
    },

    /// Point at a spot given in meters north/east (and up) of the gimbal
    PointRelative {
        #[arg(long, allow_negative_numbers = true)]
        northing: f64,
        #[arg(long, allow_negative_numbers = true)]
        easting: f64,
        /// Height above the gimbal. Pitch is held when omitted.
        #[arg(long, allow_negative_numbers = true)]
        elevation: Option<f64>,
        #[command(flatten)]
        setup: Setup,
    },

    /// Point at a latitude/longitude on the ground plane of the origin
    PointAbsolute {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[command(flatten)]
        setup: Setup,
    },

    /// Follow a moving target from an NMEA stream (serial device or log file)
    Track {
        #[arg(long, value_name = "PATH")]
        nmea: PathBuf,
        #[command(flatten)]
        setup: Setup,
    },

    /// Print the current orientation and true bearing
    Bearing,

    /// Release every relay
    Stop,
}

#[derive(Args)]
struct Setup {
    /// Latitude of the gimbal, overriding the config origin
    #[arg(long, requires = "origin_lon", allow_negative_numbers = true)]
    origin_lat: Option<f64>,

    /// Longitude of the gimbal, overriding the config origin
    #[arg(long, requires = "origin_lat", allow_negative_numbers = true)]
    origin_lon: Option<f64>,

    /// Take the origin from the first fix of a local GPS receiver
    #[arg(long, value_name = "PATH", conflicts_with = "origin_lat")]
    origin_nmea: Option<PathBuf>,

    /// Sweep the travel limits before moving
    #[arg(long)]
    calibrate: bool,
}

impl Setup {
    fn origin(&self, config: &GimbalConfig) -> Result<Option<Position>, Box<dyn Error>> {
        if let Some(path) = &self.origin_nmea {
            println!("Waiting for a GPS fix on {}...", path.display());
            let fix = FixReader::open(path)?
                .next()
                .ok_or("GPS stream ended before a fix")??;
            println!("✓ GPS fix acquired: {}", fix);
            return Ok(Some(fix));
        }
        Ok(match (self.origin_lat, self.origin_lon) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => config.geodetic.origin,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let config = GimbalConfig::load(path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => GimbalConfig::default(),
    };
    let declination = Declination::new(config.geodetic.declination_deg);
    if let Some(degrees) = cli.declination {
        declination.set(degrees)?;
    }

    if cli.simulate {
        // Stops straddle north like a head mounted facing south
        let sim = SimGimbal::new(180.0, 0.0)
            .with_yaw_stops(10.0, 350.0)
            .with_pitch_stops(-30.0, 60.0)
            .with_steps(3.0, 2.0);
        println!("Simulated head at {}", sim.read().map_or("?".to_string(), |o| o.to_string()));
        run(sim.clone(), sim, &config, declination, cli.command)
    } else {
        let imu = WitImu::open(&config.imu)?;
        wait_for_imu(&imu);
        let relays = RelayBank::new(&config.relays)?;
        run(imu, relays, &config, declination, cli.command)
    }
}

/// Gives the decoder thread a moment to see the first angle frame.
fn wait_for_imu(imu: &WitImu) {
    println!("Waiting for IMU data...");
    for _ in 0..IMU_WAIT_ATTEMPTS {
        if let Some(orientation) = imu.read() {
            println!("✓ IMU reporting {}", orientation);
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    warn!("No IMU data after {} s, continuing anyway", IMU_WAIT_ATTEMPTS / 10);
}

fn run<S: OrientationSource, A: ActuatorBank>(
    source: S,
    bank: A,
    config: &GimbalConfig,
    declination: Declination,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let controller = AttitudeController::new(
        source,
        bank,
        config.control.clone(),
        config.calibration.clone(),
    );
    let mut pointer = Pointer::new(controller, declination);
    signal::cancel_on_interrupt(pointer.controller().cancel_token())?;

    match command {
        Command::Calibrate => calibrate(&mut pointer)?,
        Command::Goto { yaw, pitch, setup } => {
            prepare(&mut pointer, &setup, config)?;
            let done = pointer.goto(yaw, pitch)?;
            println!("✓ Reached yaw {:.1}°, pitch {:.1}° in {} ticks", yaw, pitch, done.ticks);
        }
        Command::PointRelative {
            northing,
            easting,
            elevation,
            setup,
        } => {
            prepare(&mut pointer, &setup, config)?;
            let done = pointer.point_at_relative(northing, easting, elevation)?;
            println!("✓ On target in {} ticks", done.ticks);
        }
        Command::PointAbsolute { lat, lon, setup } => {
            prepare(&mut pointer, &setup, config)?;
            let done = pointer.point_at_absolute(lat, lon)?;
            println!("✓ On {} in {} ticks", Position::new(lat, lon), done.ticks);
        }
        Command::Track { nmea, setup } => {
            prepare(&mut pointer, &setup, config)?;
            track(&mut pointer, FixReader::open(&nmea)?)?;
        }
        Command::Bearing => match pointer.get_orientation() {
            Some(orientation) => {
                println!("Orientation: {}", orientation);
                match pointer.get_bearing() {
                    Some(bearing) => println!(
                        "True bearing: {:.1}° ({}), declination {:.2}°",
                        bearing,
                        Direction::from_heading(bearing),
                        pointer.declination()
                    ),
                    None => println!("True bearing: N/A (sensor not live)"),
                }
            }
            None => println!("No orientation data yet"),
        },
        Command::Stop => {
            pointer.stop();
            println!("✓ All relays released");
        }
    }

    Ok(())
}

fn calibrate<S: OrientationSource, A: ActuatorBank>(
    pointer: &mut Pointer<S, A>,
) -> Result<(), Box<dyn Error>> {
    println!("Sweeping into the mechanical stops. Keep clear of the head.");
    let envelope = pointer.initialize()?;
    println!("✓ Travel envelope: {}", envelope);
    Ok(())
}

fn prepare<S: OrientationSource, A: ActuatorBank>(
    pointer: &mut Pointer<S, A>,
    setup: &Setup,
    config: &GimbalConfig,
) -> Result<(), Box<dyn Error>> {
    if let Some(origin) = setup.origin(config)? {
        pointer.set_origin(origin.latitude, origin.longitude)?;
    }
    if setup.calibrate {
        calibrate(pointer)?;
    }
    Ok(())
}

/// Re-aims at every new fix. Unreachable fixes are reported and skipped.
fn track<S, A, I>(pointer: &mut Pointer<S, A>, fixes: I) -> Result<(), Box<dyn Error>>
where
    S: OrientationSource,
    A: ActuatorBank,
    I: Iterator<Item = std::io::Result<Position>>,
{
    let origin = pointer.origin().ok_or(PointingError::OriginUnset)?;
    println!("Tracking from {}. Waiting for fixes...", origin);

    for fix in fixes {
        let fix = fix?;
        let heading = origin.heading_to(&fix);
        info!(
            "Target at {}: {:.0} m, {:.1}° ({})",
            fix,
            origin.distance_to(&fix),
            heading,
            Direction::from_heading(heading)
        );
        match pointer.point_at_absolute(fix.latitude, fix.longitude) {
            Ok(done) => println!("  → {} on target in {} ticks", fix, done.ticks),
            Err(PointingError::Control(ControlError::Cancelled)) => {
                println!("Tracking cancelled");
                return Ok(());
            }
            Err(PointingError::Control(ControlError::DidNotConverge {
                ticks,
                yaw_in_deadzone,
                ..
            })) => {
                warn!(
                    "Gave up on {} after {} ticks{}",
                    fix,
                    ticks,
                    if yaw_in_deadzone { " (yaw in deadzone)" } else { "" }
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("NMEA stream ended");
    Ok(())
}
