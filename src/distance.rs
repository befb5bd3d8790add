/// Reference pair for the inverse-square model: a field of `reference_magnitude`
/// was measured with the object `reference_distance_cm` away from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub reference_magnitude: f32,
    pub reference_distance_cm: f32,
}

pub const DEFAULT_REFERENCE_MAGNITUDE: f32 = 500.0; // uT
pub const DEFAULT_REFERENCE_DISTANCE_CM: f32 = 5.0;

impl Default for Calibration {
    fn default() -> Self {
        Calibration::new(DEFAULT_REFERENCE_MAGNITUDE, DEFAULT_REFERENCE_DISTANCE_CM)
    }
}

impl Calibration {
    pub const fn new(reference_magnitude: f32, reference_distance_cm: f32) -> Self {
        Calibration {
            reference_magnitude,
            reference_distance_cm,
        }
    }

    /// Estimated distance in cm for a measured field magnitude.
    ///
    /// `d = d_ref * sqrt(B_ref / B)`. A zero magnitude means nothing usable was
    /// measured and maps to `f32::INFINITY`.
    pub fn estimate(&self, measured: f32) -> f32 {
        if measured <= 0.0 {
            return f32::INFINITY;
        }
        self.reference_distance_cm * libm::sqrtf(self.reference_magnitude / measured)
    }
}
