use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;

use gimbal_rs::config::GimbalConfig;
use gimbal_rs::imu::WitImu;
use gimbal_rs::relay::RelayBank;
use gimbal_rs::signal;
use gimbal_rs::{ActuatorBank, AttitudeController, OrientationSource};

#[derive(Parser)]
#[command(name = "calibrate", version, about = "Measure the travel envelope of the pan/tilt head")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GimbalConfig::load(path)?,
        None => GimbalConfig::default(),
    };

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     Gimbal Travel Calibration                        ║");
    println!("╚══════════════════════════════════════════════════════╝\n");

    println!("The head will drive into each mechanical stop in turn:");
    println!("1. Pitch down for {:.0} s", config.calibration.pitch_sweep_secs);
    println!("2. Pitch up for {:.0} s", config.calibration.pitch_sweep_secs);
    println!("3. Yaw clockwise for {:.0} s", config.calibration.yaw_sweep_secs);
    println!("4. Yaw counter-clockwise for {:.0} s", config.calibration.yaw_sweep_secs);
    println!("Keep cables and hands clear. Once sweeping, Ctrl+C stops the head.\n");

    println!("Starting in 5 seconds...\n");
    thread::sleep(Duration::from_secs(5));

    let imu = WitImu::open(&config.imu)?;
    let relays = RelayBank::new(&config.relays)?;
    sweep(imu, relays, &config)
}

fn sweep<S: OrientationSource, A: ActuatorBank>(
    source: S,
    bank: A,
    config: &GimbalConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = AttitudeController::new(
        source,
        bank,
        config.control.clone(),
        config.calibration.clone(),
    );
    signal::cancel_on_interrupt(controller.cancel_token())?;
    let envelope = controller.initialize()?;

    println!("\n{:^12} | {:^10} | {:^10}", "Axis", "Low", "High");
    println!("{:-<12}-+-{:-<10}-+-{:-<10}", "", "", "");
    println!(
        "{:^12} | {:>9.1}° | {:>9.1}°",
        "Pitch", envelope.pitch_min, envelope.pitch_max
    );
    println!(
        "{:^12} | {:>9.1}° | {:>9.1}°",
        "Yaw (cw/ccw)", envelope.yaw_cw_limit, envelope.yaw_ccw_limit
    );

    let (low, high) = if envelope.yaw_cw_limit < envelope.yaw_ccw_limit {
        (envelope.yaw_cw_limit, envelope.yaw_ccw_limit)
    } else {
        (envelope.yaw_ccw_limit, envelope.yaw_cw_limit)
    };
    let reachable = format!("{:.1}° to {:.1}°", low, high);
    println!("\n✓ Reachable yaw: {}", reachable);

    Ok(())
}
