use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;

use crate::fmt::Debug2Format;

// TCA9548A default I2C address (A0..A2 tied low)
pub const TCA9548A_ADDRESS: u8 = 0x70;

/// Number of downstream channels on the switch.
pub const CHANNEL_COUNT: usize = 8;

/// Time the downstream segment needs before the selected device answers.
pub const DEFAULT_SETTLE_MS: u32 = 100;

/// One downstream output line of the multiplexer, 0..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHANNEL_COUNT {
            Some(Channel(id))
        } else {
            None
        }
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    /// One-hot control byte selecting this channel (bit i = channel i).
    pub const fn mask(self) -> u8 {
        1 << self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Channel::new(id).ok_or(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectError<E> {
    I2c(E),
    InvalidChannel(u8),
}

pub struct Tca9548a<'a, I2C> {
    i2c: &'a RefCell<I2C>,
    address: u8,
    settle_ms: u32,
}

impl<'a, I2C> Tca9548a<'a, I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: &'a RefCell<I2C>, address: u8) -> Self {
        Tca9548a {
            i2c,
            address,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }

    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Routes subsequent bus traffic to `channel`, then waits for the segment to settle.
    pub async fn select<D: DelayNs>(
        &mut self,
        channel: Channel,
        delay: &mut D,
    ) -> Result<(), SelectError<I2C::Error>> {
        self.write_control(channel.mask()).map_err(|e| {
            warn!(
                "TCA9548A: failed to select channel {}: {:?}",
                channel.id(),
                Debug2Format(&e)
            );
            e
        })?;
        delay.delay_ms(self.settle_ms).await;
        trace!("TCA9548A: channel {} selected", channel.id());
        Ok(())
    }

    /// Same as [`select`](Self::select) for a raw channel id.
    pub async fn select_id<D: DelayNs>(
        &mut self,
        id: u8,
        delay: &mut D,
    ) -> Result<(), SelectError<I2C::Error>> {
        let channel = Channel::new(id).ok_or(SelectError::InvalidChannel(id))?;
        self.select(channel, delay).await
    }

    /// Disconnects every downstream channel.
    pub fn disable_all(&mut self) -> Result<(), SelectError<I2C::Error>> {
        self.write_control(0x00)
    }

    fn write_control(&mut self, value: u8) -> Result<(), SelectError<I2C::Error>> {
        self.i2c
            .borrow_mut()
            .write(self.address, &[value])
            .map_err(SelectError::I2c)
    }
}
