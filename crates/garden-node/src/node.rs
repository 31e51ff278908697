use embedded_hal::pwm::SetDutyCycle;

use tracing::{debug, error, info};

use crate::climate::{Climate, ClimateSensor, SensorReading};
use crate::clock::{WallClock, hour_of_day, timestamp};
use crate::config::NodeConfig;
use crate::controller::{ControlState, Controller, LightSensor};
use crate::scheduler::{Slot, Tick};
use crate::telemetry::{TelemetryRecord, TelemetrySink};

/// A garden node.
///
/// Owns the lamp controller, the climate sensor, the telemetry sink and the
/// wall clock. Driven by a [`Scheduler`](crate::scheduler::Scheduler)
/// through its [`Tick`] implementation.
pub struct Node<L, P, A, S, K>
where
    L: LightSensor,
    P: SetDutyCycle,
    A: ClimateSensor,
    S: TelemetrySink,
    K: WallClock,
{
    device_id: String,
    controller: Controller<L, P>,
    climate: Climate<A>,
    sink: S,
    clock: K,
}

impl<L, P, A, S, K> Node<L, P, A, S, K>
where
    L: LightSensor,
    P: SetDutyCycle,
    A: ClimateSensor,
    S: TelemetrySink,
    K: WallClock,
{
    /// Creates a [`Node`].
    #[must_use]
    pub fn new(config: &NodeConfig, light: L, pwm: P, climate: A, sink: S, clock: K) -> Self {
        Self {
            device_id: config.device_id.clone(),
            controller: Controller::new(light, pwm, config.setpoint, config.gains),
            climate: Climate::new(climate),
            sink,
            clock,
        }
    }

    /// Starts the light sensor.
    ///
    /// A failure is logged and the node keeps running.
    pub async fn setup(&mut self) {
        match self.controller.start().await {
            Ok(()) => info!("Light sensor started"),
            Err(e) => error!("Light sensor setup failed: {e}"),
        }
    }

    /// Puts the light sensor to sleep, once the scheduler has stopped.
    ///
    /// A failure is logged.
    pub async fn shutdown(&mut self) {
        match self.controller.stop().await {
            Ok(()) => info!("Light sensor powered down"),
            Err(e) => error!("Light sensor shutdown failed: {e}"),
        }
    }

    /// The device identifier.
    #[must_use]
    #[inline]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The current regulation state.
    #[must_use]
    pub fn control_state(&self) -> ControlState {
        self.controller.state()
    }

    /// The climate bookkeeping.
    #[must_use]
    #[inline]
    pub const fn climate(&self) -> &Climate<A> {
        &self.climate
    }

    /// The telemetry sink.
    #[must_use]
    #[inline]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    fn record(&self, timestamp: String, state: &ControlState) -> TelemetryRecord {
        let latest = self.climate.latest();
        TelemetryRecord {
            timestamp,
            device_id: self.device_id.clone(),
            luminosity: state.luminosity,
            lamp: state.lamp_percent(),
            consigne: state.consigne,
            humidity: latest.map(|m| m.humidity),
            temperature: latest.map(|m| m.temperature),
        }
    }

    fn log_status(&self, state: &ControlState, reading: Option<SensorReading>) {
        let latest = self.climate.latest();
        info!(
            consigne = state.consigne,
            luminosity = state.luminosity,
            drive = state.drive,
            humidity = latest.map(|m| m.humidity),
            temperature = latest.map(|m| m.temperature),
            last_acquisition = ?reading.map(|r| r.status),
            "Status"
        );
    }
}

impl<L, P, A, S, K> Tick for Node<L, P, A, S, K>
where
    L: LightSensor,
    P: SetDutyCycle,
    A: ClimateSensor,
    S: TelemetrySink,
    K: WallClock,
{
    async fn tick(&mut self, slot: Slot) {
        let now = self.clock.now();
        let state = self.controller.step(hour_of_day(&now)).await;
        debug!(
            tick = slot.tick,
            consigne = state.consigne,
            luminosity = state.luminosity,
            drive = state.drive,
            "Regulation step"
        );

        if slot.acquire {
            let _ = self.climate.measure();
        }

        if slot.report {
            let record = self.record(timestamp(&now), &state);
            if let Err(e) = self.sink.send(&record).await {
                error!("Telemetry record dropped: {e}");
            }
        }

        if slot.status {
            self.log_status(&state, self.climate.last_reading());
        }
    }
}
