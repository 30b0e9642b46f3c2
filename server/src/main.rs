use clap::Parser;
use log::info;
use server::collision::FlatWorld;
use server::game::{GameSession, SessionConfig};
use server::recorder::RaceRecorder;
use server::timer::{GameMode, TrackSegment};
use server::track::TrackConfig;
use server::vehicle::VehicleConfig;
use shared::{CONTROL_PORT, SENSING_PERIOD};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Rally simulation server with a remote control/telemetry socket.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the control listener to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Control listener port
    #[clap(short, long, default_value_t = CONTROL_PORT)]
    port: u16,
    /// Simulation tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Seconds between telemetry snapshots
    #[clap(long, default_value_t = SENSING_PERIOD)]
    sensing_period: f32,
    /// Game mode: race, time-trial or drift
    #[clap(short, long, default_value = "race")]
    mode: GameMode,
    /// Active track segment (keys the drift time budget)
    #[clap(short, long, default_value = "forest")]
    segment: TrackSegment,
    /// Finish-line definition file (JSON)
    #[clap(long)]
    finish_lines: Option<PathBuf>,
    /// Record a race trace to this file on shutdown
    #[clap(long)]
    trace_out: Option<PathBuf>,
    /// Ground plane height for the standalone flat world
    #[clap(long, default_value = "-36.4", allow_hyphen_values = true)]
    ground_height: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let bind_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let track = match &args.finish_lines {
        Some(path) => {
            let track = TrackConfig::load(path)?;
            info!(
                "Loaded {} finish lines from {}",
                track.finish_lines.len(),
                path.display()
            );
            track
        }
        None => TrackConfig::default(),
    };

    let config = SessionConfig {
        bind_addr,
        tick_rate: args.tick_rate,
        sensing_period: Duration::from_secs_f32(args.sensing_period),
        mode: args.mode,
        segment: args.segment,
    };

    let world = FlatWorld::new(args.ground_height);
    let mut session = GameSession::new(config, world, track, VehicleConfig::default());
    if let Some(path) = args.trace_out {
        session = session.with_recorder(RaceRecorder::new(path));
    }

    tokio::select! {
        _ = session.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    session.finish()?;
    Ok(())
}
