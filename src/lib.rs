//! Reflow oven controller firmware core.
//!
//! Drives a PWM heating element through a closed PID loop against a
//! thermocouple reading, sequencing the oven through the fixed reflow
//! profile while staying responsive to operator commands on the serial
//! console.
//!
//! The concurrency substrate is a pair of active objects — the reflow
//! controller and the console — each a thread plus a bounded event queue
//! with run-to-completion dispatch ([`active`]), fed by the time-event
//! facility ([`active::timer`]). Hardware sits behind narrow port traits
//! with simulated implementations for the host target.

#![deny(unused_must_use)]

pub mod active;
pub mod config;
pub mod console;
pub mod control;
pub mod drivers;
pub mod error;
pub mod reflow;
pub mod sensors;
pub mod sim;
