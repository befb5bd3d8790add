//! Goal-line detection with HMC5883L magnetometers behind a TCA9548A multiplexer.
//!
//! The [`Monitor`] polls each configured multiplexer channel in turn, turns the
//! measured field magnitude into a distance with an inverse-square model and
//! latches a goal event when the object comes closer than the threshold.
//!
//! The bus is any `embedded_hal::i2c::I2c`, shared between the drivers through a
//! `RefCell` owned by the caller. Delays are `embedded_hal_async::delay::DelayNs`.
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod detector;
pub mod distance;
pub mod hmc5883l;
pub mod monitor;
pub mod tca9548a;

pub use config::MonitorConfig;
pub use detector::{GoalDetector, GoalEvent, GoalLatch};
pub use distance::Calibration;
pub use hmc5883l::{Gain, Hmc5883l, MagneticSample};
pub use monitor::{Measurement, Monitor, PollReport, StartupError};
pub use tca9548a::{Channel, SelectError, Tca9548a};
