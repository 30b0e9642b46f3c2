//! Finish-line configuration.
//!
//! Track geometry itself is an external collaborator; the simulation only
//! needs the finish-line volumes to fire the lap trigger. The JSON schema
//! matches the authoring tool's output:
//!
//! ```json
//! {"finish_lines": [{"finish_line_position": [x, y, z],
//!                    "finish_line_rotation": [0, angle, 0],
//!                    "finish_line_scale": [50, 5, 0.01]}]}
//! ```

use serde::{Deserialize, Serialize};
use shared::Vec3;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read finish-line file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse finish-line file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One finish-line volume: a thin scaled box at a position.
///
/// The Y rotation is kept for authoring round-trips but the crossing test
/// treats the volume as axis-aligned; lines are authored wide enough that
/// the approximation does not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishLine {
    #[serde(rename = "finish_line_position")]
    pub position: [f32; 3],
    #[serde(rename = "finish_line_rotation")]
    pub rotation: [f32; 3],
    #[serde(rename = "finish_line_scale")]
    pub scale: [f32; 3],
}

impl FinishLine {
    /// Whether a world point lies inside the line's volume.
    pub fn contains(&self, point: Vec3) -> bool {
        let half = [
            self.scale[0] / 2.0,
            self.scale[1] / 2.0,
            self.scale[2] / 2.0,
        ];
        (point.x - self.position[0]).abs() <= half[0]
            && (point.y - self.position[1]).abs() <= half[1]
            && (point.z - self.position[2]).abs() <= half[2]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackConfig {
    pub finish_lines: Vec<FinishLine>,
}

impl TrackConfig {
    pub fn load(path: &Path) -> Result<TrackConfig, TrackError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether any finish line contains the point.
    pub fn on_finish_line(&self, point: Vec3) -> bool {
        self.finish_lines.iter().any(|line| line.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "finish_lines": [
            {"finish_line_position": [12.0, -35.0, 76.0],
             "finish_line_rotation": [0.0, 90.0, 0.0],
             "finish_line_scale": [50.0, 5.0, 0.01]}
        ]
    }"#;

    #[test]
    fn test_parse_authoring_schema() {
        let track: TrackConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(track.finish_lines.len(), 1);

        let line = &track.finish_lines[0];
        assert_eq!(line.position, [12.0, -35.0, 76.0]);
        assert_eq!(line.rotation, [0.0, 90.0, 0.0]);
        assert_eq!(line.scale, [50.0, 5.0, 0.01]);
    }

    #[test]
    fn test_crossing_test() {
        let track: TrackConfig = serde_json::from_str(SAMPLE).unwrap();

        assert!(track.on_finish_line(Vec3::new(12.0, -35.0, 76.0)));
        assert!(track.on_finish_line(Vec3::new(30.0, -34.0, 76.0)));
        assert!(!track.on_finish_line(Vec3::new(12.0, -35.0, 80.0)));
        assert!(!track.on_finish_line(Vec3::new(12.0, -30.0, 76.0)));
    }

    #[test]
    fn test_empty_track_never_triggers() {
        let track = TrackConfig::default();
        assert!(!track.on_finish_line(Vec3::default()));
    }
}
