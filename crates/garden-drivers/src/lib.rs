//! `garden-drivers` is a library crate that provides architecture-agnostic
//! drivers for the sensors of a garden lamp and climate node.
//!
//! All drivers are implemented using only the [`embedded-hal`] and
//! [`embedded-hal-async`] traits, ensuring compatibility with any platform
//! that supports these abstractions.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
//! [`embedded-hal-async`]: https://crates.io/crates/embedded-hal-async

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

/// The `AM2302` driver.
#[cfg(feature = "am2302")]
pub mod am2302;

/// The `BH1750` driver.
#[cfg(feature = "bh1750")]
pub mod bh1750;
