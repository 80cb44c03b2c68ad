// StrainLog - Strain / Voltage Conversion

use crate::drivers::nau7802::Gain;

/// Positive full scale of a 24-bit bipolar conversion (2^23).
pub const FULL_SCALE_CODES: f32 = 8_388_608.0;

/// Differential input voltage for a raw code: `raw / 2^23 * vref / 2^gain`.
pub fn raw_to_voltage(raw: i32, reference_voltage: f32, gain: Gain) -> f32 {
    (raw as f32 / FULL_SCALE_CODES) * (reference_voltage / gain.multiplier() as f32)
}

/// Quarter-bridge relation: `strain = 4 * Vout / (Vex * GF)`.
///
/// Returned as a plain ratio; 0.001 is 1000 microstrain.
pub fn voltage_to_strain(vout: f32, excitation: f32, gauge_factor: f32) -> f32 {
    4.0 * vout / (excitation * gauge_factor)
}

pub fn microstrain(strain: f32) -> f32 {
    strain * 1.0e6
}

/// Magnitude of a raw code as a percentage of full scale.
pub fn full_scale_percent(raw: i32) -> f32 {
    (raw.unsigned_abs() as f32 / FULL_SCALE_CODES) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_scale_at_unity_gain() {
        let v = raw_to_voltage(4_194_304, 3.3, Gain::X1);
        assert!((v - 1.65).abs() < 1e-5);
    }

    #[test]
    fn gain_divides_the_span() {
        let v = raw_to_voltage(4_194_304, 3.3, Gain::X128);
        assert!((v - 1.65 / 128.0).abs() < 1e-7);
        assert!(raw_to_voltage(-4_194_304, 3.3, Gain::X1) < 0.0);
    }

    #[test]
    fn quarter_bridge_strain() {
        // 1.65 mV out of a 3.3 V bridge with GF 2.0 is 1000 microstrain.
        let strain = voltage_to_strain(0.001_65, 3.3, 2.0);
        assert!((microstrain(strain) - 1000.0).abs() < 0.01);
    }

    #[test]
    fn full_scale_percentage() {
        assert!((full_scale_percent(4_194_304) - 50.0).abs() < 1e-4);
        assert!((full_scale_percent(-8_388_608) - 100.0).abs() < 1e-4);
    }
}
