//! Command-line front end of the pillbox medicine box.
//!
//! The `pillbox` binary inspects daily logs, validates configuration files,
//! replays scripted scenarios against mock devices and runs the polling loop
//! on the wall clock.

pub mod commands;
pub mod scenario;

pub use scenario::{FaultyStore, Scenario, Simulation, Step, TimedEvent};
