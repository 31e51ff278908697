use std::time::Duration;

use garden_drivers::bh1750::Address;

use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};
use crate::regulator::RegulatorGains;
use crate::setpoint::SetpointCurve;

const DEFAULT_ENDPOINT: &str = "http://garden.dispositifs.fr/api/log";
const DEFAULT_TIMEOUT_MS: u64 = 2000;

// The lamp PWM is written as a fraction of this full scale.
const MAX_DRIVE: f32 = 255.0;

fn configuration_error(info: &'static str) -> Error {
    Error::new(ErrorKind::Configuration, info)
}

/// Telemetry endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// URL records are posted to.
    pub endpoint: String,
    /// Request timeout, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TelemetryConfig {
    /// Request timeout.
    #[must_use]
    #[inline]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Node configuration.
///
/// Every field is optional in the JSON form and falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier reported in every telemetry record.
    pub device_id: String,
    /// Daily brightness schedule.
    pub setpoint: SetpointCurve,
    /// Regulation gains.
    pub gains: RegulatorGains,
    /// Level of the light sensor address pin.
    pub light_addr_pin_high: bool,
    /// Telemetry settings.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "garden-node".into(),
            setpoint: SetpointCurve::default(),
            gains: RegulatorGains::default(),
            light_addr_pin_high: false,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or when [`Self::validate`] fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Fails on a non-positive ramp duration or integral divisor, a
    /// non-finite proportional factor, a drive bound outside `(0, 255]`, or
    /// an empty telemetry endpoint.
    pub fn validate(&self) -> Result<()> {
        // Negated comparisons so that NaN is rejected too.
        if !(self.setpoint.duration_hours > 0.0) {
            return Err(configuration_error("Ramp duration must be positive"));
        }
        if !(self.gains.integral_divisor > 0.0) {
            return Err(configuration_error("Integral divisor must be positive"));
        }
        if !self.gains.proportional.is_finite() {
            return Err(configuration_error("Proportional factor must be finite"));
        }
        if !(self.gains.output_max > 0.0 && self.gains.output_max <= MAX_DRIVE) {
            return Err(configuration_error("Drive bound must be within (0, 255]"));
        }
        if self.telemetry.endpoint.is_empty() {
            return Err(configuration_error("Telemetry endpoint is empty"));
        }
        Ok(())
    }

    /// Light sensor address.
    #[must_use]
    #[inline]
    pub const fn light_address(&self) -> Address {
        Address::from_addr_pin(self.light_addr_pin_high)
    }
}
