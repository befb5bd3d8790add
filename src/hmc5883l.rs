use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_async::delay::DelayNs;

use crate::fmt::Debug2Format;

// HMC5883L Default I2C Address
pub const HMC5883L_ADDRESS: u8 = 0x1E;

// HMC5883L Registers
const REG_CONFIG_A: u8 = 0x00;
const REG_CONFIG_B: u8 = 0x01;
const REG_MODE: u8 = 0x02;
const REG_DATA_OUT_X_MSB: u8 = 0x03; // Data registers are X_MSB, X_LSB, Z_MSB, Z_LSB, Y_MSB, Y_LSB
const REG_STATUS: u8 = 0x09;
const REG_ID_A: u8 = 0x0A; // 'H', followed by '4' and '3'

pub const IDENTIFICATION: [u8; 3] = *b"H43";

// Configuration values
const DEFAULT_CONFIG_A: u8 = 0b0111_0000; // 8 samples averaged, 15 Hz output rate, normal measurement
const MODE_CONTINUOUS: u8 = 0x00;

pub const STATUS_RDY: u8 = 0b01;
pub const STATUS_LOCK: u8 = 0b10;

/// Time the device needs after configuration before the first conversion is ready.
pub const DEFAULT_INIT_SETTLE_MS: u32 = 50;

/// Gain settings of configuration register B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    Ga0_88,
    #[default]
    Ga1_3,
    Ga1_9,
    Ga2_5,
    Ga4_0,
    Ga4_7,
    Ga5_6,
    Ga8_1,
}

impl Gain {
    /// Value of configuration register B (gain in bits 7..5).
    pub const fn register_value(self) -> u8 {
        (self as u8) << 5
    }

    pub const fn lsb_per_gauss(self) -> f32 {
        match self {
            Gain::Ga0_88 => 1370.0,
            Gain::Ga1_3 => 1090.0,
            Gain::Ga1_9 => 820.0,
            Gain::Ga2_5 => 660.0,
            Gain::Ga4_0 => 440.0,
            Gain::Ga4_7 => 390.0,
            Gain::Ga5_6 => 330.0,
            Gain::Ga8_1 => 230.0,
        }
    }
}

/// Raw field sample in device counts, already reordered to x, y, z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MagneticSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl MagneticSample {
    /// Decodes the data block starting at register 0x03. The device sends X, Z, Y.
    pub fn from_be_bytes(data: [u8; 6]) -> Self {
        let x = i16::from_be_bytes([data[0], data[1]]);
        let z = i16::from_be_bytes([data[2], data[3]]); // Note Z is before Y
        let y = i16::from_be_bytes([data[4], data[5]]);
        MagneticSample { x, y, z }
    }

    /// Euclidean norm of the sample, in raw counts.
    pub fn magnitude(&self) -> f32 {
        let (x, y, z) = (self.x as f32, self.y as f32, self.z as f32);
        libm::sqrtf(x * x + y * y + z * z)
    }

    /// Converts the raw counts to Gauss for the given gain.
    pub fn to_gauss(&self, gain: Gain) -> (f32, f32, f32) {
        let sensitivity = gain.lsb_per_gauss();
        (
            self.x as f32 / sensitivity,
            self.y as f32 / sensitivity,
            self.z as f32 / sensitivity,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    IdentificationError([u8; 3]),
}

pub struct Hmc5883l<'a, I2C> {
    i2c: &'a RefCell<I2C>,
    address: u8,
    gain: Gain,
    settle_ms: u32,
}

impl<'a, I2C> Hmc5883l<'a, I2C>
where
    I2C: I2c,
{
    /// Creates a new HMC5883L driver. Call `init()` before reading.
    pub fn new(i2c: &'a RefCell<I2C>, address: u8) -> Self {
        Hmc5883l {
            i2c,
            address,
            gain: Gain::default(),
            settle_ms: DEFAULT_INIT_SETTLE_MS,
        }
    }

    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Configures averaging/rate, gain and continuous mode, then waits for the first conversion.
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I2C::Error>> {
        self.write_register(REG_CONFIG_A, DEFAULT_CONFIG_A)
            .map_err(|e| {
                error!("HMC5883L: I2C Write Config A Error: {:?}", Debug2Format(&e));
                e
            })?;
        self.write_register(REG_CONFIG_B, self.gain.register_value())
            .map_err(|e| {
                error!("HMC5883L: I2C Write Config B Error: {:?}", Debug2Format(&e));
                e
            })?;
        self.write_register(REG_MODE, MODE_CONTINUOUS)
            .map_err(|e| {
                error!("HMC5883L: I2C Write Mode Register Error: {:?}", Debug2Format(&e));
                e
            })?;

        delay.delay_ms(self.settle_ms).await;
        debug!("HMC5883L: Initialized for continuous measurement.");
        Ok(())
    }

    /// Reads the six data registers in one transfer.
    pub fn read_sample(&mut self) -> Result<MagneticSample, Error<I2C::Error>> {
        let mut data = [0u8; 6];
        self.read_registers(REG_DATA_OUT_X_MSB, &mut data)
            .map_err(|e| {
                error!("HMC5883L: I2C Read Data Error: {:?}", Debug2Format(&e));
                e
            })?;
        Ok(MagneticSample::from_be_bytes(data))
    }

    /// Checks identification registers A..C against "H43".
    pub fn identify(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut id_bytes = [0u8; 3];
        self.read_registers(REG_ID_A, &mut id_bytes)?;
        if id_bytes != IDENTIFICATION {
            return Err(Error::IdentificationError(id_bytes));
        }
        Ok(())
    }

    /// Bit 0: RDY (Data Ready), Bit 1: LOCK (Data Output Register Lock)
    pub fn read_status(&mut self) -> Result<u8, Error<I2C::Error>> {
        let mut status = [0u8; 1];
        self.read_registers(REG_STATUS, &mut status)?;
        Ok(status[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .borrow_mut()
            .write(self.address, &[reg, value])
            .map_err(Error::I2c)
    }

    fn read_registers(&mut self, start: u8, buffer: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .borrow_mut()
            .write_read(self.address, &[start], buffer)
            .map_err(Error::I2c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_x_z_y_wire_order() {
        // x = 3, z = 4, y = 0
        let sample = MagneticSample::from_be_bytes([0x00, 0x03, 0x00, 0x04, 0x00, 0x00]);
        assert_eq!(sample, MagneticSample { x: 3, y: 0, z: 4 });
        assert_eq!(sample.magnitude(), 5.0);
    }

    #[test]
    fn decodes_negative_counts() {
        // x = -1, z = -300, y = 256
        let sample = MagneticSample::from_be_bytes([0xFF, 0xFF, 0xFE, 0xD4, 0x01, 0x00]);
        assert_eq!(sample.x, -1);
        assert_eq!(sample.z, -300);
        assert_eq!(sample.y, 256);
    }

    #[test]
    fn magnitude_does_not_overflow_at_full_scale() {
        let sample = MagneticSample {
            x: i16::MIN,
            y: i16::MIN,
            z: i16::MIN,
        };
        let expected = 32768.0 * libm::sqrtf(3.0);
        assert!((sample.magnitude() - expected).abs() < 1.0);
    }

    #[test]
    fn default_gain_matches_config_b() {
        assert_eq!(Gain::default().register_value(), 0x20);
        assert_eq!(Gain::Ga8_1.register_value(), 0xE0);
    }

    #[test]
    fn scales_to_gauss() {
        let sample = MagneticSample { x: 1090, y: -545, z: 0 };
        assert_eq!(sample.to_gauss(Gain::Ga1_3), (1.0, -0.5, 0.0));
    }
}
