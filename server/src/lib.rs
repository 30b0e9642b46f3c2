//! # Rally Simulation Server
//!
//! Authoritative host for the arcade drift simulation and its remote
//! control/telemetry interface. An external process — a human tool or an
//! autonomous driving agent — connects over TCP, sends text commands and
//! reads back framed binary sensing snapshots.
//!
//! ## Architecture
//!
//! Everything advances in one cooperative tick loop:
//!
//! 1. **Network poll** — accept a controller while none is connected
//!    (bounded 10 ms wait), otherwise drain its pending bytes into the
//!    command queue without blocking.
//! 2. **Command processing** — decode queued commands and fold them into
//!    the input state. A malformed command terminates the connection.
//! 3. **Physics step** — advance the drift model against the collision
//!    probes.
//! 4. **Timers** — lap/drift accounting plus respawn triggers.
//! 5. **Telemetry** — at the sensing cadence, pack one snapshot and send
//!    it; a slow consumer simply misses frames.
//!
//! No locks guard the vehicle state: only the tick task touches it.
//!
//! ## Module Organization
//!
//! - [`vehicle`] — the coupled heading/movement-heading drift model.
//! - [`collision`] — raycast probes, the sensor fan, and the world seam.
//! - [`timer`] — lap/drift state machine and segment budgets.
//! - [`track`] — finish-line configuration and crossing tests.
//! - [`network`] — the single-client TCP connection manager.
//! - [`game`] — the session tying all of the above together.
//! - [`recorder`] — local trace capture for offline tooling.

pub mod collision;
pub mod game;
pub mod network;
pub mod recorder;
pub mod timer;
pub mod track;
pub mod vehicle;
