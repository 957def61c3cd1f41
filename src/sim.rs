//! First-order oven thermal model for the host target.
//!
//! Closes the loop around the simulated heater and thermocouple: heating
//! power proportional to PWM duty, Newtonian cooling toward ambient. Good
//! enough to exercise every phase of the profile; not a calibrated oven.

/// Full-power heating slope near ambient (°C/s).
const HEAT_RATE_C_PER_S: f32 = 4.0;

/// Cooling time constant toward ambient (s).
const COOL_TAU_S: f32 = 120.0;

#[derive(Debug, Clone, Copy)]
pub struct OvenModel {
    temperature_c: f32,
    ambient_c: f32,
}

impl OvenModel {
    /// Oven at thermal equilibrium with the room.
    pub fn new(ambient_c: f32) -> Self {
        Self {
            temperature_c: ambient_c,
            ambient_c,
        }
    }

    /// Advance the model by `dt_s` seconds with the heater at `duty`
    /// (fraction of full power, `[0, 1]`).
    pub fn step(&mut self, duty: f32, dt_s: f32) {
        let duty = duty.clamp(0.0, 1.0);
        let heating = duty * HEAT_RATE_C_PER_S;
        let cooling = (self.temperature_c - self.ambient_c) / COOL_TAU_S;
        self.temperature_c += (heating - cooling) * dt_s;
    }

    pub fn temperature(&self) -> f32 {
        self.temperature_c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_oven_stays_at_ambient() {
        let mut oven = OvenModel::new(25.0);
        for _ in 0..1000 {
            oven.step(0.0, 0.5);
        }
        assert!((oven.temperature() - 25.0).abs() < 0.01);
    }

    #[test]
    fn full_power_heats_monotonically_past_peak_target() {
        let mut oven = OvenModel::new(25.0);
        let mut last = oven.temperature();
        for _ in 0..600 {
            oven.step(1.0, 0.5);
            assert!(oven.temperature() > last, "heating must be monotonic");
            last = oven.temperature();
        }
        assert!(
            oven.temperature() > 215.0,
            "full power must be able to reach the peak target, got {:.1}",
            oven.temperature()
        );
    }

    #[test]
    fn hot_oven_cools_toward_ambient() {
        let mut oven = OvenModel::new(25.0);
        for _ in 0..600 {
            oven.step(1.0, 0.5);
        }
        let hot = oven.temperature();
        for _ in 0..600 {
            oven.step(0.0, 0.5);
        }
        assert!(oven.temperature() < hot);
        assert!(oven.temperature() > 25.0, "cooling is asymptotic, not instant");
    }
}
