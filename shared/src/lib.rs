//! Wire-level contracts shared between the simulation server and remote
//! control clients: control input state, the text command protocol and
//! the framed binary telemetry snapshots.

pub mod commands;
pub mod snapshot;

use serde::{Deserialize, Serialize};

/// Default port of the remote control/telemetry listener.
pub const CONTROL_PORT: u16 = 7654;
/// Wall-clock period between outbound telemetry frames, in seconds.
pub const SENSING_PERIOD: f32 = 0.1;
/// Number of distance rays in the sensor fan.
pub const SENSOR_RAY_COUNT: usize = 15;
/// Angular span of the sensor fan, centered on the facing heading.
pub const SENSOR_FAN_DEGREES: f32 = 90.0;
/// Reported distance for sensor rays that hit nothing.
pub const SENSOR_MAX_RANGE: f32 = 200.0;

/// A 3-component vector in world space. Y is up; yaw angles are degrees
/// around the Y axis with 0° looking down +Z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }

    /// Unit forward vector for a yaw heading in degrees.
    pub fn from_yaw_deg(deg: f32) -> Vec3 {
        let rad = deg.to_radians();
        Vec3 {
            x: rad.sin(),
            y: 0.0,
            z: rad.cos(),
        }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3 {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

/// The control signals read by the dynamics model each tick.
///
/// Written by whichever input source is active (remote command stream or
/// local bindings) and read fresh every tick; it always reflects the most
/// recently processed command, never a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub handbrake: bool,
    pub reset: bool,
}

impl InputState {
    /// Clears the four direction booleans (`release all`).
    pub fn clear_directions(&mut self) {
        self.forward = false;
        self.back = false;
        self.left = false;
        self.right = false;
    }

    pub fn any_direction(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_forward_vector_cardinal_headings() {
        let north = Vec3::from_yaw_deg(0.0);
        assert_approx_eq!(north.x, 0.0, 1e-6);
        assert_approx_eq!(north.z, 1.0, 1e-6);

        let east = Vec3::from_yaw_deg(90.0);
        assert_approx_eq!(east.x, 1.0, 1e-6);
        assert_approx_eq!(east.z, 0.0, 1e-6);

        let south = Vec3::from_yaw_deg(180.0);
        assert_approx_eq!(south.x, 0.0, 1e-5);
        assert_approx_eq!(south.z, -1.0, 1e-6);
    }

    #[test]
    fn test_forward_vector_is_unit_length() {
        for deg in [-270.0, -45.0, 0.0, 33.3, 90.0, 123.4, 359.0] {
            assert_approx_eq!(Vec3::from_yaw_deg(deg).magnitude(), 1.0, 1e-5);
        }
    }

    #[test]
    fn test_vector_arithmetic() {
        let v = Vec3::new(1.0, 2.0, -2.0);
        assert_approx_eq!(v.magnitude(), 3.0, 1e-6);

        let doubled = v.scale(2.0);
        assert_eq!(doubled, Vec3::new(2.0, 4.0, -4.0));

        let sum = v.add(&Vec3::new(-1.0, -2.0, 2.0));
        assert_eq!(sum, Vec3::default());
    }

    #[test]
    fn test_clear_directions_keeps_other_flags() {
        let mut input = InputState {
            forward: true,
            back: true,
            left: true,
            right: true,
            handbrake: true,
            reset: true,
        };

        input.clear_directions();

        assert!(!input.any_direction());
        assert!(input.handbrake);
        assert!(input.reset);
    }
}
