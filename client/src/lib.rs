//! Headless remote-control client for the rally simulation server.
//!
//! Wraps the control socket in typed command helpers and decodes the
//! telemetry stream back into [`shared::snapshot::SensingSnapshot`]
//! values. Intended for driving tools and autonomous agents; it renders
//! nothing.

pub mod remote;
