use clap::Parser;
use client::remote::RemoteClient;
use log::{info, warn};
use shared::commands::ControlKey;
use shared::CONTROL_PORT;
use std::time::{Duration, Instant};

/// Demo driver: holds the throttle and logs telemetry.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Simulation server host
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Simulation server control port
    #[clap(short, long, default_value_t = CONTROL_PORT)]
    port: u16,
    /// How long to hold the throttle, seconds
    #[clap(short, long, default_value = "5.0")]
    drive_secs: f32,
    /// Request sensor-ray visualization while driving
    #[clap(long)]
    show_rays: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let addr = format!("{}:{}", args.host, args.port);
    let mut client = RemoteClient::connect(&addr).await?;

    if args.show_rays {
        client.set_ray_visible(true).await?;
    }
    client.push(ControlKey::Forward).await?;
    info!("Throttle down for {:.1}s", args.drive_secs);

    let deadline = Instant::now() + Duration::from_secs_f32(args.drive_secs);
    while Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_secs(2), client.next_snapshot()).await {
            Ok(Ok(snapshot)) => {
                let nearest = snapshot
                    .ray_distances
                    .iter()
                    .cloned()
                    .fold(f32::INFINITY, f32::min);
                info!(
                    "t={:.2}s pos=({:.1}, {:.1}, {:.1}) speed={:.1} angle={:.0} nearest={:.1}",
                    snapshot.absolute_time,
                    snapshot.car_position.x,
                    snapshot.car_position.y,
                    snapshot.car_position.z,
                    snapshot.car_speed,
                    snapshot.car_angle,
                    nearest
                );
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => warn!("No telemetry within 2s"),
        }
    }

    client.release_all().await?;
    info!("Released controls, disconnecting");
    Ok(())
}
