//! Arcade drift physics for the rally car.
//!
//! The model tracks two yaw headings: `facing_heading`, driven directly by
//! steering, and `movement_heading`, the direction the car actually
//! translates along. During a drift the movement heading lags the facing
//! heading and chases it at a rate set by `drift_gain`; the divergence
//! between the two feeds back into speed, steering and the gain itself.
//!
//! Numeric edge cases are never errors here. Every quantity is clamped
//! into its legal range at the end of each step so the simulation cannot
//! halt mid-race.

use crate::collision::CollisionProbe;
use log::debug;
use shared::{InputState, Vec3};

const REVERSE_SPEED_FLOOR: f32 = -15.0;
const MIN_ROLLING_SPEED: f32 = 1.0;

const HEADING_CHASE_DIVISOR: f32 = 40.0;
const GAIN_SWING_DIVISOR: f32 = 5.0;
const GAIN_DIVERGENCE_THRESHOLD: f32 = 50.0;

const DRIVE_CONTACT_DISTANCE: f32 = 5.0;
const ACCEL_SCALE: f32 = 50.0;
const LANDING_PENALTY: f32 = 4.0;
const FRICTION_SCALE: f32 = 5.0;
const BRAKE_GAIN_CUT: f32 = 20.0;

const HANDBRAKE_STEER_PUSH: f32 = 3.0;
const HANDBRAKE_GAIN_CUT: f32 = 40.0;
const HANDBRAKE_SLOWDOWN: f32 = 20.0;
const HANDBRAKE_STEERING_CAP: f32 = 3.0;

const HEADING_RATE_SCALE: f32 = 50.0;
const STEER_COUNTER_DIVISOR: f32 = 6.0;
const STEER_RELAX_RATE: f32 = 5.0;
const GAIN_RECOVERY_RATE: f32 = 15.0;

const GRAVITY: f32 = 50.0;
const VERTICAL_SCALE: f32 = 50.0;
const GROUND_CONTACT_FACTOR: f32 = 1.7;
const FLOOR_NORMAL_MIN_Y: f32 = 0.7;
const FLOOR_SNAP_MAX_DELTA: f32 = 0.5;
const GROUND_SNAP_OFFSET: f32 = 1.4;

const OUT_OF_BOUNDS_LOW: f32 = -100.0;
const OUT_OF_BOUNDS_HIGH: f32 = 300.0;

const DRIFT_ANGLE_THRESHOLD: f32 = 60.0;
const DRIFT_MIN_SPEED: f32 = 10.0;

/// Tuning parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub top_speed: f32,
    pub acceleration: f32,
    pub braking_strength: f32,
    pub friction: f32,
    pub steering_strength: f32,
    pub turning_drag: f32,
    pub max_steering_rate: f32,
    pub min_drift_gain: f32,
    pub max_drift_gain: f32,
    /// Divisor converting heading divergence into speed bleed.
    pub drift_bleed: f32,
    pub initial_drift_gain: f32,
    /// Body half extents are `body_scale / 2` on X/Z; Y scales the ground
    /// contact threshold.
    pub body_scale: Vec3,
}

impl Default for VehicleConfig {
    /// The sports-car tuning.
    fn default() -> VehicleConfig {
        VehicleConfig {
            top_speed: 30.0,
            acceleration: 0.38,
            braking_strength: 30.0,
            friction: 0.6,
            steering_strength: 8.0,
            turning_drag: 5.0,
            max_steering_rate: 3.0,
            min_drift_gain: 18.0,
            max_drift_gain: 38.0,
            drift_bleed: 5.0,
            initial_drift_gain: 35.0,
            body_scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Kinematic state, mutated only inside [`Vehicle::step`].
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub position: Vec3,
    /// Yaw the body points along, degrees.
    pub facing_heading: f32,
    /// Yaw the body translates along, degrees. Lags `facing_heading`
    /// during a drift.
    pub movement_heading: f32,
    /// Signed scalar speed along `movement_heading`.
    pub speed: f32,
    pub vertical_velocity: f32,
    /// Signed angular velocity of `facing_heading`.
    pub steering_rate: f32,
    /// How fast `movement_heading` chases `facing_heading`; higher is
    /// snappier, less drift.
    pub drift_gain: f32,
    pub grounded: bool,
    pub on_wall: bool,
    pub ground_normal: Vec3,
}

pub struct Vehicle {
    pub config: VehicleConfig,
    pub state: VehicleState,
    pub reset_position: Vec3,
    pub reset_heading: f32,
}

impl Vehicle {
    pub fn new(config: VehicleConfig, spawn_position: Vec3, spawn_heading: f32) -> Vehicle {
        let state = VehicleState {
            position: spawn_position,
            facing_heading: spawn_heading,
            movement_heading: spawn_heading,
            speed: 0.0,
            vertical_velocity: 0.0,
            steering_rate: 0.0,
            drift_gain: config.initial_drift_gain,
            grounded: false,
            on_wall: false,
            ground_normal: Vec3::new(0.0, 1.0, 0.0),
        };

        Vehicle {
            config,
            state,
            reset_position: spawn_position,
            reset_heading: spawn_heading,
        }
    }

    /// Signed divergence between facing and movement headings, degrees.
    pub fn heading_divergence(&self) -> f32 {
        self.state.facing_heading - self.state.movement_heading
    }

    /// Whether the car is in a scoring-grade drift this tick.
    pub fn is_drifting(&self) -> bool {
        self.heading_divergence().abs() > DRIFT_ANGLE_THRESHOLD
            && self.state.speed.abs() > DRIFT_MIN_SPEED
    }

    pub fn out_of_bounds(&self) -> bool {
        self.state.position.y <= OUT_OF_BOUNDS_LOW || self.state.position.y >= OUT_OF_BOUNDS_HIGH
    }

    /// Advances the vehicle by `dt` seconds. Inputs are clamped, never
    /// rejected.
    pub fn step(&mut self, dt: f32, input: &InputState, probe: &CollisionProbe) {
        debug_assert!(dt > 0.0);

        let config = self.config.clone();
        let state = &mut self.state;

        // Drift coupling: movement heading chases facing heading, bleeding
        // speed and swinging the gain while they disagree.
        let divergence = state.facing_heading - state.movement_heading;
        if divergence != 0.0 {
            state.movement_heading += state.drift_gain * (divergence / HEADING_CHASE_DIVISOR) * dt;

            if state.speed.abs() > MIN_ROLLING_SPEED {
                state.speed -= divergence.abs() / config.drift_bleed * dt;
            }
            state.steering_rate += divergence.signum() * dt;

            if divergence.abs() >= GAIN_DIVERGENCE_THRESHOLD {
                state.drift_gain -= divergence.abs() / GAIN_SWING_DIVISOR * dt;
            } else {
                state.drift_gain += divergence.abs() / GAIN_SWING_DIVISOR * dt;
            }
        }

        let vertical_movement = state.vertical_velocity / VERTICAL_SCALE;
        let ground = probe.ground(state.position);

        // Drive, brake and handbrake only bite near the ground.
        if ground.distance <= DRIVE_CONTACT_DISTANCE {
            if input.forward {
                state.speed += config.acceleration * ACCEL_SCALE * dt;
                // Landing with downward momentum costs thrust.
                state.speed += -state.vertical_velocity * LANDING_PENALTY * dt;
            } else if state.speed > MIN_ROLLING_SPEED {
                state.speed -= config.friction * FRICTION_SCALE * dt;
            } else if state.speed < -MIN_ROLLING_SPEED {
                state.speed += config.friction * FRICTION_SCALE * dt;
            }

            if input.back {
                state.speed -= config.braking_strength * dt;
                state.drift_gain -= BRAKE_GAIN_CUT * dt;
            }

            if input.handbrake {
                if state.steering_rate < 0.0 {
                    state.steering_rate -= HANDBRAKE_STEER_PUSH * dt;
                } else if state.steering_rate > 0.0 {
                    state.steering_rate += HANDBRAKE_STEER_PUSH * dt;
                }
                state.drift_gain -= HANDBRAKE_GAIN_CUT * dt;
                state.speed -= HANDBRAKE_SLOWDOWN * dt;
            }
        }

        // Steering: integrate the facing heading, then let speed fight the
        // current steering rate before applying fresh input.
        state.facing_heading += state.steering_rate * HEADING_RATE_SCALE * dt;

        if state.steering_rate > 0.0 {
            state.steering_rate -= state.speed / STEER_COUNTER_DIVISOR * dt;
        } else if state.steering_rate < 0.0 {
            state.steering_rate += state.speed / STEER_COUNTER_DIVISOR * dt;
        }

        if state.speed.abs() > MIN_ROLLING_SPEED {
            if input.left {
                state.steering_rate -= config.steering_strength * dt;
                state.drift_gain -= 5.0 * dt;
                if state.speed > MIN_ROLLING_SPEED {
                    state.speed -= config.turning_drag * dt;
                } else if state.speed < 0.0 {
                    state.speed += config.turning_drag / 5.0 * dt;
                }
            } else if input.right {
                state.steering_rate += config.steering_strength * dt;
                state.drift_gain -= 5.0 * dt;
                if state.speed > MIN_ROLLING_SPEED {
                    state.speed -= config.turning_drag * dt;
                } else if state.speed < 0.0 {
                    state.speed += config.turning_drag / 5.0 * dt;
                }
            } else {
                state.drift_gain += GAIN_RECOVERY_RATE * dt;
                if state.steering_rate > 0.0 {
                    state.steering_rate -= STEER_RELAX_RATE * dt;
                } else if state.steering_rate < 0.0 {
                    state.steering_rate += STEER_RELAX_RATE * dt;
                }
            }
        } else {
            state.steering_rate = 0.0;
        }

        // Clamps. Once stopped or reversing the movement heading snaps to
        // the facing heading so no residual drift survives.
        state.speed = state.speed.clamp(REVERSE_SPEED_FLOOR, config.top_speed);
        if state.speed <= 0.0 {
            state.movement_heading = state.facing_heading;
        }
        state.drift_gain = state
            .drift_gain
            .clamp(config.min_drift_gain, config.max_drift_gain);

        let steering_cap = if input.handbrake {
            config.max_steering_rate.max(HANDBRAKE_STEERING_CAP)
        } else {
            config.max_steering_rate
        };
        state.steering_rate = state.steering_rate.clamp(-steering_cap, steering_cap);

        // Ground contact vs free fall. The contact threshold widens with
        // vertical speed so fast falls do not tunnel past the snap.
        let contact_threshold =
            config.body_scale.y * GROUND_CONTACT_FACTOR + vertical_movement.abs();
        if ground.distance <= contact_threshold {
            state.vertical_velocity = 0.0;
            state.grounded = true;
            state.ground_normal = ground.normal;

            let floor_like = ground.normal.y > FLOOR_NORMAL_MIN_Y
                && ground.point.y - state.position.y < FLOOR_SNAP_MAX_DELTA;
            if floor_like {
                state.position.y = ground.point.y + GROUND_SNAP_OFFSET;
                state.on_wall = false;
            } else {
                state.on_wall = true;
            }
        } else {
            state.position.y += vertical_movement * VERTICAL_SCALE * dt;
            state.vertical_velocity -= GRAVITY * dt;
            state.grounded = false;
            state.on_wall = false;
        }

        // Lateral movement along the movement heading, gated per axis by
        // a probe ray that must clear the travel distance.
        let forward = Vec3::from_yaw_deg(state.movement_heading);
        let movement_x = forward.x * state.speed * dt;
        let movement_z = forward.z * state.speed * dt;

        if movement_x != 0.0 {
            let hit = probe.lateral_x(state.position, movement_x);
            if hit.distance > config.body_scale.x / 2.0 + movement_x.abs() {
                state.position.x += movement_x;
            }
        }

        if movement_z != 0.0 {
            let hit = probe.lateral_z(state.position, movement_z);
            if hit.distance > config.body_scale.z / 2.0 + movement_z.abs() {
                state.position.z += movement_z;
            }
        }
    }

    /// Moves the car back to the reset pose and projects it onto the
    /// ground there. Speed and fall momentum are discarded.
    pub fn respawn(&mut self, probe: &CollisionProbe) {
        self.state.position = self.reset_position;
        self.state.facing_heading = self.reset_heading;
        self.state.movement_heading = self.reset_heading;

        let ground = probe.ground(self.reset_position);
        if ground.is_hit() {
            self.state.position.y = ground.point.y + GROUND_SNAP_OFFSET;
        }

        self.state.speed = 0.0;
        self.state.vertical_velocity = 0.0;
        self.state.on_wall = false;

        debug!(
            "Vehicle respawned at ({:.1}, {:.1}, {:.1}) heading {:.0}",
            self.state.position.x, self.state.position.y, self.state.position.z, self.reset_heading
        );
    }
}
