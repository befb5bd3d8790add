use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;

use crate::config::MonitorConfig;
use crate::detector::{GoalDetector, GoalEvent};
use crate::fmt::Debug2Format;
use crate::hmc5883l::{self, Hmc5883l};
use crate::tca9548a::{Channel, SelectError, Tca9548a};

/// One reading reduced to what the detector needs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Field magnitude in raw counts, 0 when the read failed.
    pub magnitude: f32,
    pub distance_cm: f32,
    pub read_failed: bool,
}

/// Outcome of one poll iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollReport {
    pub channel: Channel,
    /// `None` when the channel could not be selected.
    pub measurement: Option<Measurement>,
    /// Set only on the iteration where the latch went from clear to detected.
    pub goal: Option<GoalEvent>,
    /// Latch state after this iteration, `None` for channels without a latch.
    pub goal_latched: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupError<E> {
    NoChannels,
    ChannelUnreachable {
        channel: Channel,
        error: SelectError<E>,
    },
    UnknownDevice {
        channel: Channel,
        error: hmc5883l::Error<E>,
    },
}

/// Polls the magnetometers behind the multiplexer and keeps the goal latches.
///
/// The bus stays owned by the caller's `RefCell`; dropping the monitor
/// disconnects every multiplexer channel so the bus is handed back idle.
pub struct Monitor<'a, I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    mux: Tca9548a<'a, I2C>,
    sensor: Hmc5883l<'a, I2C>,
    delay: D,
    config: MonitorConfig,
    detector: GoalDetector,
    cursor: usize,
}

impl<'a, I2C, D> Monitor<'a, I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: &'a RefCell<I2C>, delay: D, config: MonitorConfig) -> Self {
        let mux = Tca9548a::new(i2c, config.mux_address).with_settle_ms(config.select_settle_ms);
        let sensor = Hmc5883l::new(i2c, config.sensor_address)
            .with_gain(config.gain)
            .with_settle_ms(config.init_settle_ms);
        let detector = GoalDetector::new(&config.goal_channels, config.threshold_cm);
        Monitor {
            mux,
            sensor,
            delay,
            config,
            detector,
            cursor: 0,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn detector(&self) -> &GoalDetector {
        &self.detector
    }

    /// Probes every required channel, then configures the sensor once.
    ///
    /// Any channel that cannot be selected aborts startup before the sensor is touched.
    /// A failed sensor configuration is only logged.
    pub async fn start(&mut self) -> Result<(), StartupError<I2C::Error>> {
        info!("Checking I2C devices...");
        if self.config.channels.is_empty() {
            return Err(StartupError::NoChannels);
        }

        for &channel in self.config.required_channels.iter() {
            self.mux
                .select(channel, &mut self.delay)
                .await
                .map_err(|error| StartupError::ChannelUnreachable { channel, error })?;

            if self.config.verify_identity {
                self.sensor
                    .identify()
                    .map_err(|error| StartupError::UnknownDevice { channel, error })?;
                debug!("HMC5883L identified on channel {}", channel.id());
            }
        }

        if let Err(e) = self.sensor.init(&mut self.delay).await {
            error!("Error initializing HMC5883L. Check wiring. {:?}", Debug2Format(&e));
        }
        self.delay.delay_ms(self.config.startup_settle_ms).await;

        info!("Monitoring Magnetic Field Changes...");
        Ok(())
    }

    /// Polls the next channel in round-robin order.
    ///
    /// Returns `None` only when no channels are configured.
    pub async fn poll_once(&mut self) -> Option<PollReport> {
        let channel = *self.config.channels.get(self.cursor)?;
        self.cursor = (self.cursor + 1) % self.config.channels.len();

        if self.mux.select(channel, &mut self.delay).await.is_err() {
            warn!(
                "Error selecting channel {}. Check I2C connections!",
                channel.id()
            );
            return Some(PollReport {
                channel,
                measurement: None,
                goal: None,
                goal_latched: self.detector.is_detected(channel),
            });
        }

        if self.config.reinit_on_select {
            if let Err(e) = self.sensor.init(&mut self.delay).await {
                error!(
                    "Error initializing HMC5883L on channel {}: {:?}",
                    channel.id(),
                    Debug2Format(&e)
                );
            }
        }

        let measurement = self.measure(channel);
        let goal = self.detector.observe(channel, measurement.distance_cm);
        if goal.is_some() {
            info!("Goal Detected!");
        }

        info!(
            "[Channel {}] Magnetic Field: {} uT, Estimated Distance: {} cm",
            channel.id(),
            measurement.magnitude,
            measurement.distance_cm
        );

        Some(PollReport {
            channel,
            measurement: Some(measurement),
            goal,
            goal_latched: self.detector.is_detected(channel),
        })
    }

    /// Polls until `stop` is signalled, waiting the poll interval between iterations.
    ///
    /// `observe` sees every report. Returns the number of polls made.
    pub async fn run<M, F>(&mut self, stop: &Signal<M, ()>, mut observe: F) -> u32
    where
        M: RawMutex,
        F: FnMut(&PollReport),
    {
        let mut polls: u32 = 0;
        loop {
            if let Some(report) = self.poll_once().await {
                polls = polls.wrapping_add(1);
                observe(&report);
            }

            let interval = self.config.poll_interval_ms;
            match select(stop.wait(), self.delay.delay_ms(interval)).await {
                Either::First(()) => break,
                Either::Second(()) => {}
            }
        }
        info!("Monitoring stopped.");
        polls
    }

    fn measure(&mut self, channel: Channel) -> Measurement {
        let magnitude = match self.sensor.read_sample() {
            Ok(sample) => {
                let (gx, gy, gz) = sample.to_gauss(self.config.gain);
                trace!("[Channel {}] X={} G, Y={} G, Z={} G", channel.id(), gx, gy, gz);
                Some(sample.magnitude())
            }
            Err(_) => {
                error!("I2C Read Error on channel {}! Returning 0", channel.id());
                None
            }
        };

        let value = magnitude.unwrap_or(0.0);
        Measurement {
            magnitude: value,
            distance_cm: self.config.calibration.estimate(value),
            read_failed: magnitude.is_none(),
        }
    }
}

impl<I2C, D> Drop for Monitor<'_, I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn drop(&mut self) {
        if let Err(e) = self.mux.disable_all() {
            warn!("TCA9548A: failed to release channels: {:?}", Debug2Format(&e));
        }
    }
}
