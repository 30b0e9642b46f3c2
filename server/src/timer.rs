//! Lap and drift timing.
//!
//! Race and time-trial share the same `idle -> running -> idle` shape,
//! driven externally by the finish-line trigger. Drift mode instead burns
//! down a per-segment time budget while banking chained drift time into a
//! score.

use log::info;
use std::fmt;
use std::str::FromStr;

/// Countdown baseline for time-trial resets, seconds.
pub const TIME_TRIAL_BASELINE: f32 = 100.0;
/// Multiplier drift scoring resets to between chains.
pub const DRIFT_MULTIPLIER_BASELINE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Race,
    TimeTrial,
    Drift,
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<GameMode, String> {
        match s {
            "race" => Ok(GameMode::Race),
            "time-trial" => Ok(GameMode::TimeTrial),
            "drift" => Ok(GameMode::Drift),
            other => Err(format!("unknown game mode {other:?}")),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Race => "race",
            GameMode::TimeTrial => "time-trial",
            GameMode::Drift => "drift",
        };
        f.write_str(name)
    }
}

/// Which stretch of track is active; keys the drift time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSegment {
    Sand,
    Grass,
    Snow,
    Forest,
    Savannah,
    Lake,
}

impl TrackSegment {
    /// Drift-mode time budget for the segment, seconds.
    pub fn drift_budget(self) -> f32 {
        match self {
            TrackSegment::Sand => 25.0,
            TrackSegment::Grass => 30.0,
            TrackSegment::Snow => 50.0,
            TrackSegment::Forest => 40.0,
            TrackSegment::Savannah => 25.0,
            TrackSegment::Lake => 75.0,
        }
    }
}

impl FromStr for TrackSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<TrackSegment, String> {
        match s {
            "sand" => Ok(TrackSegment::Sand),
            "grass" => Ok(TrackSegment::Grass),
            "snow" => Ok(TrackSegment::Snow),
            "forest" => Ok(TrackSegment::Forest),
            "savannah" => Ok(TrackSegment::Savannah),
            "lake" => Ok(TrackSegment::Lake),
            other => Err(format!("unknown track segment {other:?}")),
        }
    }
}

/// Elapsed-time bookkeeping for the active game mode.
///
/// All transitions are total: there are no failure states, only counters
/// moving between mode-specific baselines.
#[derive(Debug, Clone)]
pub struct LapTimer {
    pub mode: GameMode,
    pub running: bool,
    /// Accumulates while `running`; reset to `reset_baseline` on respawn
    /// and on lap crossings.
    pub elapsed: f32,
    pub reset_baseline: f32,
    pub last_lap_duration: f32,
    pub lap_count: u32,
    // Drift mode only.
    pub drift_score: f32,
    pub drift_multiplier: f32,
    pub drift_budget: f32,
}

impl LapTimer {
    pub fn new(mode: GameMode, segment: TrackSegment) -> LapTimer {
        let mut timer = LapTimer {
            mode,
            running: false,
            elapsed: 0.0,
            reset_baseline: 0.0,
            last_lap_duration: 0.0,
            lap_count: 0,
            drift_score: 0.0,
            drift_multiplier: DRIFT_MULTIPLIER_BASELINE,
            drift_budget: 0.0,
        };
        timer.reset(segment);
        timer
    }

    /// Advances the counters by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if self.running {
            self.elapsed += dt;
        }
        if self.mode == GameMode::Drift {
            self.drift_budget = (self.drift_budget - dt).max(0.0);
        }
    }

    /// External start-timing trigger (first finish-line crossing, or the
    /// start of a drift chain).
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Lap-crossing trigger: records the lap and rewinds to the baseline.
    pub fn complete_lap(&mut self) {
        self.last_lap_duration = self.elapsed;
        self.elapsed = self.reset_baseline;
        self.lap_count += 1;
        info!(
            "Lap {} completed in {:.2}s",
            self.lap_count, self.last_lap_duration
        );
    }

    /// Drift-chain end: banks the chained time into the score.
    pub fn end_drift(&mut self) {
        self.drift_score += self.elapsed;
        self.drift_multiplier = DRIFT_MULTIPLIER_BASELINE;
        self.elapsed = 0.0;
        self.running = false;
    }

    /// Respawn: rewinds all counters to the mode baseline.
    pub fn reset(&mut self, segment: TrackSegment) {
        self.running = false;
        match self.mode {
            GameMode::Race => {
                self.elapsed = 0.0;
                self.reset_baseline = 0.0;
            }
            GameMode::TimeTrial => {
                self.elapsed = TIME_TRIAL_BASELINE;
                self.reset_baseline = TIME_TRIAL_BASELINE;
                self.lap_count = 0;
            }
            GameMode::Drift => {
                self.elapsed = 0.0;
                self.reset_baseline = 0.0;
                self.drift_score = 0.0;
                self.drift_multiplier = DRIFT_MULTIPLIER_BASELINE;
                self.drift_budget = segment.drift_budget();
            }
        }
    }
}
