use heapless::Vec;

use crate::detector::DEFAULT_THRESHOLD_CM;
use crate::distance::Calibration;
use crate::hmc5883l::{Gain, DEFAULT_INIT_SETTLE_MS, HMC5883L_ADDRESS};
use crate::tca9548a::{Channel, CHANNEL_COUNT, DEFAULT_SETTLE_MS, TCA9548A_ADDRESS};

pub type ChannelList = Vec<Channel, CHANNEL_COUNT>;

/// Sensors are wired to these multiplexer outputs, polled in this order.
pub const SENSOR_CHANNELS: [u8; 3] = [1, 4, 5];
/// The sensor on the goal line.
pub const GOAL_CHANNELS: [u8; 1] = [5];

pub const POLL_INTERVAL_MS: u32 = 1500;
pub const STARTUP_SETTLE_MS: u32 = 50;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub mux_address: u8,
    pub sensor_address: u8,
    /// Round-robin polling order.
    pub channels: ChannelList,
    /// Every one of these must be selectable before monitoring starts.
    pub required_channels: ChannelList,
    /// Channels whose distance drives a goal latch.
    pub goal_channels: ChannelList,
    pub calibration: Calibration,
    pub threshold_cm: f32,
    pub gain: Gain,
    pub poll_interval_ms: u32,
    pub select_settle_ms: u32,
    pub init_settle_ms: u32,
    /// Extra wait between sensor init and the first poll.
    pub startup_settle_ms: u32,
    /// Configure the sensor again every time its channel is selected.
    pub reinit_on_select: bool,
    /// Check the identification registers of every required channel at startup.
    pub verify_identity: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            mux_address: TCA9548A_ADDRESS,
            sensor_address: HMC5883L_ADDRESS,
            channels: channel_list(&SENSOR_CHANNELS),
            required_channels: channel_list(&SENSOR_CHANNELS),
            goal_channels: channel_list(&GOAL_CHANNELS),
            calibration: Calibration::default(),
            threshold_cm: DEFAULT_THRESHOLD_CM,
            gain: Gain::default(),
            poll_interval_ms: POLL_INTERVAL_MS,
            select_settle_ms: DEFAULT_SETTLE_MS,
            init_settle_ms: DEFAULT_INIT_SETTLE_MS,
            startup_settle_ms: STARTUP_SETTLE_MS,
            reinit_on_select: false,
            verify_identity: false,
        }
    }
}

/// Builds a channel list, dropping ids outside 0..=7.
pub fn channel_list(ids: &[u8]) -> ChannelList {
    ids.iter()
        .filter_map(|&id| Channel::new(id))
        .take(CHANNEL_COUNT)
        .collect()
}
