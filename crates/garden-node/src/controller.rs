use embedded_hal::pwm::SetDutyCycle;

use embedded_hal_async::i2c::I2c;

use garden_drivers::bh1750::{Bh1750, Bh1750Error};

use tracing::{debug, error, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::regulator::{Regulator, RegulatorGains};
use crate::setpoint::SetpointCurve;

// Full-scale lamp drive written to the PWM sink.
const PWM_FULL_SCALE: u16 = 255;

fn bus_error(info: String) -> Error {
    Error::new(ErrorKind::BusReadShortfall, info)
}

/// A source of ambient luminosity.
pub trait LightSensor {
    /// Prepares the sensor for periodic reads.
    ///
    /// # Errors
    ///
    /// Bus failures are reported as [`ErrorKind::BusReadShortfall`].
    fn start(&mut self) -> impl Future<Output = Result<()>>;

    /// Reads the current luminosity.
    ///
    /// # Errors
    ///
    /// A read that does not return a whole sample is reported as
    /// [`ErrorKind::BusReadShortfall`].
    fn luminosity(&mut self) -> impl Future<Output = Result<f32>>;

    /// Puts the sensor to sleep.
    ///
    /// # Errors
    ///
    /// Bus failures are reported as [`ErrorKind::BusReadShortfall`].
    fn stop(&mut self) -> impl Future<Output = Result<()>>;
}

impl<I2C, E> LightSensor for Bh1750<I2C>
where
    I2C: I2c<u8, Error = E>,
    E: core::fmt::Debug,
{
    async fn start(&mut self) -> Result<()> {
        let address = self.address() as u8;
        self.power_on().await.map_err(|e| {
            bus_error(format!("Unable to power on the light sensor at {address:#04x}: {e:?}"))
        })?;
        self.start_continuous_measurement().await.map_err(|e| {
            bus_error(format!("Unable to start the light sensor at {address:#04x}: {e:?}"))
        })
    }

    async fn luminosity(&mut self) -> Result<f32> {
        self.latest_measurement().await.map_err(|e| match e {
            Bh1750Error::I2c(e) => bus_error(format!("Fewer than 2 bytes read: {e:?}")),
            Bh1750Error::ContinuousMeasurementNotStarted => {
                bus_error("Continuous measurement not started".into())
            }
        })
    }

    async fn stop(&mut self) -> Result<()> {
        let address = self.address() as u8;
        self.power_down().await.map_err(|e| {
            bus_error(format!("Unable to power down the light sensor at {address:#04x}: {e:?}"))
        })
    }
}

/// A snapshot of the regulation state after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    /// Current consigne.
    pub consigne: f32,
    /// Last luminosity read from the sensor.
    pub luminosity: f32,
    /// Integrator accumulator.
    pub integrator: f32,
    /// Lamp drive in the `0..=255` domain.
    pub drive: f32,
}

impl ControlState {
    /// Lamp drive as a percentage of the full drive.
    #[must_use]
    #[inline]
    pub fn lamp_percent(&self) -> f32 {
        self.drive / 2.55
    }
}

/// The lamp brightness controller.
///
/// Each step recomputes the consigne for the hour of the day, reads the
/// ambient luminosity and runs one regulation step. A failed light read
/// keeps the previous luminosity for that step.
pub struct Controller<L, P>
where
    L: LightSensor,
    P: SetDutyCycle,
{
    light: L,
    pwm: P,
    curve: SetpointCurve,
    regulator: Regulator,
    consigne: f32,
    luminosity: f32,
}

impl<L, P> Controller<L, P>
where
    L: LightSensor,
    P: SetDutyCycle,
{
    /// Creates a [`Controller`].
    #[must_use]
    #[inline]
    pub const fn new(light: L, pwm: P, curve: SetpointCurve, gains: RegulatorGains) -> Self {
        Self {
            light,
            pwm,
            curve,
            regulator: Regulator::new(gains),
            consigne: 0.0,
            luminosity: 0.0,
        }
    }

    /// Starts the light sensor.
    ///
    /// # Errors
    ///
    /// See [`LightSensor::start`].
    pub async fn start(&mut self) -> Result<()> {
        self.light.start().await
    }

    /// Puts the light sensor to sleep.
    ///
    /// # Errors
    ///
    /// See [`LightSensor::stop`].
    pub async fn stop(&mut self) -> Result<()> {
        self.light.stop().await
    }

    /// Runs one regulation step for the given hour of the day.
    pub async fn step(&mut self, hour: f32) -> ControlState {
        self.consigne = self.curve.consigne(hour);

        match self.light.luminosity().await {
            Ok(luminosity) => self.luminosity = luminosity,
            Err(e) => warn!("Keeping luminosity {}: {e}", self.luminosity),
        }

        let regulation = self.regulator.update(self.consigne, self.luminosity);
        if let Some(value) = regulation.write {
            match self
                .pwm
                .set_duty_cycle_fraction(u16::from(value), PWM_FULL_SCALE)
            {
                Ok(()) => {
                    self.regulator.mark_written(value);
                    debug!(value, "Lamp drive written");
                }
                Err(e) => error!(
                    "{}",
                    Error::new(ErrorKind::Actuator, format!("Unable to write {value}: {e:?}"))
                ),
            }
        }

        self.state()
    }

    /// The current regulation state.
    #[must_use]
    pub fn state(&self) -> ControlState {
        ControlState {
            consigne: self.consigne,
            luminosity: self.luminosity,
            integrator: self.regulator.integrator(),
            drive: self.regulator.drive(),
        }
    }
}
