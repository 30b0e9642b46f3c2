//! The simulation session: one vehicle, one timer, one remote controller.
//!
//! Everything runs in a single scheduling domain. Each tick polls the
//! network, applies decoded commands to the input state, advances the
//! physics and timers, and emits telemetry at the sensing cadence. No
//! other task mutates the vehicle, so no locks are involved.

use crate::collision::{CollisionProbe, MultiRaySensor, RaycastWorld};
use crate::network::ConnectionManager;
use crate::recorder::{RaceRecorder, TraceRow};
use crate::timer::{GameMode, LapTimer, TrackSegment};
use crate::track::TrackConfig;
use crate::vehicle::{Vehicle, VehicleConfig};
use log::{debug, info, warn};
use shared::commands::{ControlKey, RemoteCommand};
use shared::snapshot::SensingSnapshot;
use shared::{InputState, Vec3, CONTROL_PORT, SENSING_PERIOD};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Default reset pose on the forest track.
pub const DEFAULT_RESET_POSITION: Vec3 = Vec3 {
    x: 12.0,
    y: -35.0,
    z: 76.0,
};
pub const DEFAULT_RESET_HEADING: f32 = 90.0;

/// Ceiling on per-tick delta time; longer stalls are capped to keep the
/// integrator stable.
const MAX_DELTA_TIME: f32 = 1.0 / 20.0;
const STATS_INTERVAL_TICKS: u64 = 600;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub bind_addr: SocketAddr,
    pub tick_rate: u32,
    pub sensing_period: Duration,
    pub mode: GameMode,
    pub segment: TrackSegment,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], CONTROL_PORT)),
            tick_rate: 60,
            sensing_period: Duration::from_secs_f32(SENSING_PERIOD),
            mode: GameMode::Race,
            segment: TrackSegment::Forest,
        }
    }
}

pub struct GameSession<W: RaycastWorld> {
    pub config: SessionConfig,
    pub world: W,
    pub vehicle: Vehicle,
    pub input: InputState,
    pub timer: LapTimer,
    pub sensor: MultiRaySensor,
    pub connection: ConnectionManager,
    pub track: TrackConfig,
    recorder: Option<RaceRecorder>,
    last_sensing: Option<Instant>,
    tick_count: u64,
    was_on_finish_line: bool,
    was_drifting: bool,
}

impl<W: RaycastWorld> GameSession<W> {
    pub fn new(
        config: SessionConfig,
        world: W,
        track: TrackConfig,
        vehicle_config: VehicleConfig,
    ) -> GameSession<W> {
        let mut vehicle = Vehicle::new(vehicle_config, DEFAULT_RESET_POSITION, DEFAULT_RESET_HEADING);
        {
            let probe = CollisionProbe::new(&world);
            vehicle.respawn(&probe);
        }

        let timer = LapTimer::new(config.mode, config.segment);
        let connection = ConnectionManager::new(config.bind_addr);

        GameSession {
            config,
            world,
            vehicle,
            input: InputState::default(),
            timer,
            sensor: MultiRaySensor::new(),
            connection,
            track,
            recorder: None,
            last_sensing: None,
            tick_count: 0,
            was_on_finish_line: false,
            was_drifting: false,
        }
    }

    /// Attaches a local trace recorder sampling at the sensing cadence.
    pub fn with_recorder(mut self, recorder: RaceRecorder) -> GameSession<W> {
        self.recorder = Some(recorder);
        self
    }

    /// Runs the tick loop forever; cancel the future to stop.
    pub async fn run(&mut self) {
        let tick_duration = Duration::from_secs_f32(1.0 / self.config.tick_rate as f32);
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately; skip it so dt starts sane.
        interval.tick().await;
        let mut last_tick = Instant::now();

        info!(
            "Simulation running at {} Hz in {} mode",
            self.config.tick_rate, self.timer.mode
        );

        loop {
            interval.tick().await;

            let now = Instant::now();
            let mut dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            if dt <= 0.0 {
                continue;
            }
            if dt > MAX_DELTA_TIME {
                warn!(
                    "Large delta time ({:.3}s), capping to {:.3}s",
                    dt, MAX_DELTA_TIME
                );
                dt = MAX_DELTA_TIME;
            }

            self.tick_once(dt).await;
        }
    }

    /// One full frame: network in, commands, physics, timers, telemetry.
    pub async fn tick_once(&mut self, dt: f32) {
        self.connection.poll().await;
        self.process_remote_commands();

        {
            let probe = CollisionProbe::new(&self.world);
            self.vehicle.step(dt, &self.input, &probe);
        }

        if self.input.reset || self.vehicle.out_of_bounds() {
            self.input.reset = false;
            self.respawn();
        }

        self.timer.tick(dt);
        self.update_lap_trigger();
        self.update_drift_trigger();
        self.sample_telemetry();

        self.tick_count += 1;
        if self.tick_count % STATS_INTERVAL_TICKS == 0 {
            let state = &self.vehicle.state;
            debug!(
                "Tick {}: speed {:.1}, heading {:.0}, client {}",
                self.tick_count,
                state.speed,
                state.facing_heading,
                self.connection.has_client()
            );
        }
    }

    /// Flushes the trace recorder, if any.
    pub fn finish(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(recorder) = &self.recorder {
            if !recorder.is_empty() {
                recorder.save()?;
            }
        }
        Ok(())
    }

    fn process_remote_commands(&mut self) {
        loop {
            match self.connection.commands.parse_next_command() {
                Ok(Some(command)) => self.apply_command(command),
                Ok(None) => break,
                Err(e) => {
                    // The whole session is discarded; no resync attempt.
                    warn!("Invalid command, disconnecting controller: {}", e);
                    self.connection.drop_client();
                    break;
                }
            }
        }
    }

    fn apply_command(&mut self, command: RemoteCommand) {
        debug!("Processing command {:?}", command);
        match command {
            RemoteCommand::Push(key) => self.set_key(key, true),
            RemoteCommand::PushAll => {} // accepted, no effect
            RemoteCommand::Release(key) => self.set_key(key, false),
            RemoteCommand::ReleaseAll => self.input.clear_directions(),
            RemoteCommand::SetPosition(position) => self.vehicle.reset_position = position,
            RemoteCommand::SetRotation(heading) => self.vehicle.reset_heading = heading,
            RemoteCommand::SetSpeed(_) => {} // reserved
            RemoteCommand::SetRay(visible) => self.sensor.set_visible(visible),
            RemoteCommand::Reset => self.respawn(),
        }
    }

    fn set_key(&mut self, key: ControlKey, held: bool) {
        match key {
            ControlKey::Forward => self.input.forward = held,
            ControlKey::Back => self.input.back = held,
            ControlKey::Left => self.input.left = held,
            ControlKey::Right => self.input.right = held,
        }
    }

    fn respawn(&mut self) {
        let probe = CollisionProbe::new(&self.world);
        self.vehicle.respawn(&probe);
        self.timer.reset(self.config.segment);
        self.was_on_finish_line = false;
        self.was_drifting = false;
        info!("Vehicle reset ({} mode)", self.timer.mode);
    }

    /// Finish-line crossings start the clock on first contact and record
    /// laps afterwards. Edge-triggered so sitting on the line is one event.
    fn update_lap_trigger(&mut self) {
        if self.timer.mode == GameMode::Drift {
            return;
        }

        let on_line = self.track.on_finish_line(self.vehicle.state.position);
        if on_line && !self.was_on_finish_line {
            if self.timer.running {
                self.timer.complete_lap();
            } else {
                info!("Timing started");
                self.timer.start();
            }
        }
        self.was_on_finish_line = on_line;
    }

    fn update_drift_trigger(&mut self) {
        if self.timer.mode != GameMode::Drift {
            return;
        }

        let drifting = self.vehicle.is_drifting();
        if drifting && !self.was_drifting {
            self.timer.start();
        }
        if !drifting && self.was_drifting {
            self.timer.end_drift();
            debug!("Drift chain banked, score {:.1}", self.timer.drift_score);
        }
        self.was_drifting = drifting;
    }

    fn sample_telemetry(&mut self) {
        let due = match self.last_sensing {
            None => true,
            Some(at) => at.elapsed() >= self.config.sensing_period,
        };
        if !due {
            return;
        }
        self.last_sensing = Some(Instant::now());

        if !self.connection.has_client() && self.recorder.is_none() {
            return;
        }

        let snapshot = self.build_snapshot();

        if let Some(recorder) = &mut self.recorder {
            recorder.record(TraceRow {
                up: snapshot.up,
                down: snapshot.down,
                left: snapshot.left,
                right: snapshot.right,
                absolute_time: snapshot.absolute_time,
                last_lap_duration: snapshot.last_lap_duration,
                car_position_x: snapshot.car_position.x,
                car_position_y: snapshot.car_position.y,
                car_position_z: snapshot.car_position.z,
                car_speed: snapshot.car_speed,
                car_angle: snapshot.car_angle,
            });
        }

        if self.connection.has_client() {
            match snapshot.pack() {
                Ok(frame) => self.connection.send_frame(&frame),
                Err(e) => warn!("Failed to pack snapshot: {}", e),
            }
        }
    }

    fn build_snapshot(&self) -> SensingSnapshot {
        let state = &self.vehicle.state;
        SensingSnapshot {
            up: self.input.forward,
            down: self.input.back,
            left: self.input.left,
            right: self.input.right,
            absolute_time: self.timer.elapsed,
            last_lap_duration: self.timer.last_lap_duration,
            car_position: state.position,
            car_speed: state.speed,
            car_angle: state.facing_heading,
            ray_distances: self.sensor.collect_sensor_values(
                &self.world,
                state.position,
                state.facing_heading,
            ),
            frame_image: None, // rendered frames come from the display collaborator
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::FlatWorld;
    use shared::snapshot::FrameDecoder;
    use shared::SENSOR_RAY_COUNT;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_session() -> GameSession<FlatWorld> {
        let config = SessionConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            sensing_period: Duration::ZERO,
            ..SessionConfig::default()
        };
        GameSession::new(
            config,
            FlatWorld::new(-36.4),
            TrackConfig::default(),
            VehicleConfig::default(),
        )
    }

    async fn connect_controller(session: &mut GameSession<FlatWorld>) -> TcpStream {
        // First tick binds the listener, second accepts the peer.
        session.tick_once(0.016).await;
        let addr = session.connection.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        session.tick_once(0.016).await;
        assert!(session.connection.has_client());
        peer
    }

    #[tokio::test]
    async fn test_remote_commands_drive_input_state() {
        let mut session = test_session();
        let mut peer = connect_controller(&mut session).await;

        peer.write_all(b"push forward\npush left\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;

        assert!(session.input.forward);
        assert!(session.input.left);

        peer.write_all(b"release all\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;

        assert!(!session.input.any_direction());
    }

    #[tokio::test]
    async fn test_malformed_command_drops_controller() {
        let mut session = test_session();
        let mut peer = connect_controller(&mut session).await;

        peer.write_all(b"fly up\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;

        assert!(!session.connection.has_client());
    }

    #[tokio::test]
    async fn test_set_commands_rewrite_reset_pose_only() {
        let mut session = test_session();
        let mut peer = connect_controller(&mut session).await;

        let live_position = session.vehicle.state.position;
        peer.write_all(b"set position 1,2,3\nset rotation 45\nset speed 99\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;

        assert_eq!(session.vehicle.reset_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(session.vehicle.reset_heading, 45.0);
        // Live pose untouched (modulo the tick's own physics), speed ignored.
        assert_eq!(session.vehicle.state.position.x, live_position.x);
        assert_eq!(session.vehicle.state.speed, 0.0);
    }

    #[tokio::test]
    async fn test_reset_command_respawns_and_clears_timer() {
        let mut session = test_session();
        let mut peer = connect_controller(&mut session).await;

        session.vehicle.state.speed = 12.0;
        session.timer.start();
        session.timer.tick(9.0);

        peer.write_all(b"reset\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;

        assert_eq!(session.vehicle.state.speed, 0.0);
        assert_eq!(session.timer.elapsed, 0.0);
        assert!(!session.timer.running);
    }

    #[tokio::test]
    async fn test_snapshots_stream_to_controller() {
        let mut session = test_session();
        let mut peer = connect_controller(&mut session).await;

        peer.write_all(b"push forward\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.tick_once(0.016).await;
        session.tick_once(0.016).await;

        // Frames sent before the throttle command landed report up=false;
        // skip until one reflects it.
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];
        let snapshot = 'found: loop {
            let n = peer.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed the stream");
            decoder.push_bytes(&buf[..n]);
            while let Some(snapshot) = decoder.next_frame().unwrap() {
                if snapshot.up {
                    break 'found snapshot;
                }
            }
        };

        assert!(snapshot.up);
        assert_eq!(snapshot.ray_distances.len(), SENSOR_RAY_COUNT);
        assert!(snapshot.car_speed >= 0.0);
    }

    #[tokio::test]
    async fn test_out_of_bounds_triggers_respawn() {
        let mut session = test_session();

        session.vehicle.state.position.y = -150.0;
        session.vehicle.state.vertical_velocity = -80.0;
        session.tick_once(0.016).await;

        let y = session.vehicle.state.position.y;
        assert!(y > -100.0, "vehicle still out of bounds at y={y}");
        assert_eq!(session.vehicle.state.speed, 0.0);
        assert_eq!(session.vehicle.state.vertical_velocity, 0.0);
    }

    #[tokio::test]
    async fn test_lap_trigger_starts_then_records() {
        let mut session = test_session();
        session.track = TrackConfig {
            finish_lines: vec![crate::track::FinishLine {
                position: [
                    session.vehicle.state.position.x,
                    session.vehicle.state.position.y,
                    session.vehicle.state.position.z,
                ],
                rotation: [0.0, 90.0, 0.0],
                scale: [50.0, 5.0, 0.01],
            }],
        };

        // First contact arms the clock.
        session.tick_once(0.016).await;
        assert!(session.timer.running);
        assert_eq!(session.timer.lap_count, 0);

        // Leave the line, come back: that is one lap.
        session.vehicle.state.position.z += 10.0;
        session.tick_once(0.016).await;
        session.vehicle.state.position.z -= 10.0;
        session.tick_once(0.016).await;
        assert_eq!(session.timer.lap_count, 1);
    }
}
