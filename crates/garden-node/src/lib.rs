//! The `garden-node` library crate is the control core of a garden node
//! driving a lamp and monitoring the climate around it.
//!
//! Four times per second the node:
//!
//! - computes the brightness consigne from the hour of the day
//! - reads the ambient luminosity from a `BH1750` sensor
//! - runs one step of a PI regulation with anti-windup and writes the
//!   resulting drive to the lamp `PWM` when it changes
//!
//! Every two seconds it also acquires humidity and temperature from an
//! `AM2302` sensor, and every five seconds it posts a telemetry record to a
//! remote endpoint.
//!
//! No single failure stops the node. Faults are logged through `tracing` and
//! the previous values are kept until the next successful read.
//!
//! Hardware access goes through the `embedded-hal` traits and the drivers of
//! the `garden-drivers` crate, while timing is provided by `tokio`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Humidity and temperature acquisition bookkeeping.
pub mod climate;
/// Wall-clock time sources.
pub mod clock;
/// Node configuration.
pub mod config;
/// The lamp brightness controller.
pub mod controller;
/// Error management.
pub mod error;
/// The node wiring every component together.
pub mod node;
/// PI regulation with anti-windup.
pub mod regulator;
/// Tick scheduling.
pub mod scheduler;
/// The daily brightness schedule.
pub mod setpoint;
/// Telemetry records and sinks.
pub mod telemetry;
