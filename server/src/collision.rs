//! Raycast probes against the world geometry.
//!
//! Track geometry lives outside the simulation core; everything the
//! dynamics model needs from it flows through the [`RaycastWorld`] trait.
//! [`FlatWorld`] is a minimal implementation (ground plane plus
//! axis-aligned wall blocks) used for standalone runs and tests.

use shared::{Vec3, SENSOR_FAN_DEGREES, SENSOR_MAX_RANGE, SENSOR_RAY_COUNT};

/// Result of a single ray query. A miss reports infinite distance.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl RayHit {
    pub fn miss() -> RayHit {
        RayHit {
            distance: f32::INFINITY,
            point: Vec3::default(),
            normal: Vec3::new(0.0, 1.0, 0.0),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.distance.is_finite()
    }
}

/// World geometry seen through single-ray queries.
///
/// Directions are unit vectors; implementations return the nearest
/// intersection along the ray.
pub trait RaycastWorld {
    fn raycast(&self, origin: Vec3, direction: Vec3) -> RayHit;
}

/// Per-tick collision queries cast from the vehicle's world origin.
///
/// Three independent rays: straight down for ground contact, and one per
/// lateral axis in the direction of pending travel. Discrete per-axis
/// checks only; displacement beyond the probe's reach in a single frame
/// can tunnel, which the speed ceiling keeps out of reach in practice.
pub struct CollisionProbe<'a> {
    world: &'a dyn RaycastWorld,
}

impl<'a> CollisionProbe<'a> {
    pub fn new(world: &'a dyn RaycastWorld) -> CollisionProbe<'a> {
        CollisionProbe { world }
    }

    pub fn ground(&self, origin: Vec3) -> RayHit {
        self.world.raycast(origin, Vec3::new(0.0, -1.0, 0.0))
    }

    /// Ray along the X axis in the direction of `sign`.
    pub fn lateral_x(&self, origin: Vec3, sign: f32) -> RayHit {
        self.world.raycast(origin, Vec3::new(sign.signum(), 0.0, 0.0))
    }

    /// Ray along the Z axis in the direction of `sign`.
    pub fn lateral_z(&self, origin: Vec3, sign: f32) -> RayHit {
        self.world.raycast(origin, Vec3::new(0.0, 0.0, sign.signum()))
    }
}

/// Fan of distance rays swept around the facing heading, read back by
/// remote clients as part of the telemetry snapshot.
#[derive(Debug, Clone)]
pub struct MultiRaySensor {
    ray_count: usize,
    fan_degrees: f32,
    visible: bool,
}

impl Default for MultiRaySensor {
    fn default() -> MultiRaySensor {
        MultiRaySensor {
            ray_count: SENSOR_RAY_COUNT,
            fan_degrees: SENSOR_FAN_DEGREES,
            visible: false,
        }
    }
}

impl MultiRaySensor {
    pub fn new() -> MultiRaySensor {
        MultiRaySensor::default()
    }

    /// Whether ray visualization is requested (`set ray visible`). The
    /// simulation itself ignores this; renderers read it.
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Distances along the sensor fan, misses clamped to the sensor range.
    pub fn collect_sensor_values(
        &self,
        world: &dyn RaycastWorld,
        origin: Vec3,
        facing_deg: f32,
    ) -> Vec<f32> {
        let half = self.fan_degrees / 2.0;
        (0..self.ray_count)
            .map(|i| {
                let t = if self.ray_count > 1 {
                    i as f32 / (self.ray_count - 1) as f32
                } else {
                    0.5
                };
                let yaw = facing_deg - half + t * self.fan_degrees;
                let hit = world.raycast(origin, Vec3::from_yaw_deg(yaw));
                hit.distance.min(SENSOR_MAX_RANGE)
            })
            .collect()
    }
}

/// Axis-aligned wall volume for [`FlatWorld`].
#[derive(Debug, Clone, Copy)]
pub struct WallBlock {
    pub min: Vec3,
    pub max: Vec3,
}

/// Infinite ground plane plus axis-aligned wall blocks.
#[derive(Debug, Clone, Default)]
pub struct FlatWorld {
    pub ground_height: f32,
    pub walls: Vec<WallBlock>,
}

impl FlatWorld {
    pub fn new(ground_height: f32) -> FlatWorld {
        FlatWorld {
            ground_height,
            walls: Vec::new(),
        }
    }

    pub fn with_walls(ground_height: f32, walls: Vec<WallBlock>) -> FlatWorld {
        FlatWorld {
            ground_height,
            walls,
        }
    }
}

impl RaycastWorld for FlatWorld {
    fn raycast(&self, origin: Vec3, direction: Vec3) -> RayHit {
        let mut best = RayHit::miss();

        if direction.y < 0.0 && origin.y >= self.ground_height {
            let t = (origin.y - self.ground_height) / -direction.y;
            best = RayHit {
                distance: t,
                point: origin.add(&direction.scale(t)),
                normal: Vec3::new(0.0, 1.0, 0.0),
            };
        }

        for wall in &self.walls {
            if let Some((t, normal)) = ray_aabb(origin, direction, wall) {
                if t < best.distance {
                    best = RayHit {
                        distance: t,
                        point: origin.add(&direction.scale(t)),
                        normal,
                    };
                }
            }
        }

        best
    }
}

/// Slab intersection against an axis-aligned box. Returns the entry
/// distance and the entry face normal; rays starting inside report
/// distance 0 with an upward normal.
fn ray_aabb(origin: Vec3, direction: Vec3, block: &WallBlock) -> Option<(f32, Vec3)> {
    let o = [origin.x, origin.y, origin.z];
    let d = [direction.x, direction.y, direction.z];
    let lo = [block.min.x, block.min.y, block.min.z];
    let hi = [block.max.x, block.max.y, block.max.z];

    let mut t_enter = 0.0f32;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = None;

    for axis in 0..3 {
        if d[axis].abs() < 1e-8 {
            if o[axis] < lo[axis] || o[axis] > hi[axis] {
                return None;
            }
            continue;
        }

        let mut t1 = (lo[axis] - o[axis]) / d[axis];
        let mut t2 = (hi[axis] - o[axis]) / d[axis];
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        if t1 > t_enter {
            t_enter = t1;
            enter_axis = Some(axis);
        }
        t_exit = t_exit.min(t2);

        if t_enter > t_exit {
            return None;
        }
    }

    let normal = match enter_axis {
        Some(0) => Vec3::new(-d[0].signum(), 0.0, 0.0),
        Some(1) => Vec3::new(0.0, -d[1].signum(), 0.0),
        Some(2) => Vec3::new(0.0, 0.0, -d[2].signum()),
        _ => Vec3::new(0.0, 1.0, 0.0),
    };

    Some((t_enter, normal))
}
