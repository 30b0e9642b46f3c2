//! Local race-trace recording for offline tooling.
//!
//! Samples the same fields the telemetry stream carries, at the same
//! sensing cadence, and saves them as a JSON array of rows. Column names
//! match the tabular export consumed downstream.

use log::info;
use serde::Serialize;
use shared::Vec3;
use std::path::PathBuf;

/// One recorded telemetry row.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRow {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub absolute_time: f32,
    pub last_lap_duration: f32,
    #[serde(rename = "car_position x")]
    pub car_position_x: f32,
    #[serde(rename = "car_position y")]
    pub car_position_y: f32,
    #[serde(rename = "car_position z")]
    pub car_position_z: f32,
    pub car_speed: f32,
    pub car_angle: f32,
}

impl TraceRow {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.car_position_x, self.car_position_y, self.car_position_z)
    }
}

pub struct RaceRecorder {
    output_path: PathBuf,
    rows: Vec<TraceRow>,
}

impl RaceRecorder {
    pub fn new(output_path: PathBuf) -> RaceRecorder {
        RaceRecorder {
            output_path,
            rows: Vec::new(),
        }
    }

    pub fn record(&mut self, row: TraceRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(&self.rows)?;
        std::fs::write(&self.output_path, json)?;
        info!(
            "Saved {} trace rows to {}",
            self.rows.len(),
            self.output_path.display()
        );
        Ok(())
    }
}
