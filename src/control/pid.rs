//! Discrete PID controller for the heater loop.
//!
//! Runs at a fixed sample period `Ts`. The integral term accumulates
//! trapezoidally and is clamped while the actuator is saturated in the
//! error's direction (anti-windup); the derivative acts on the measurement
//! only, through a first-order low-pass filter with time constant `tau`,
//! so setpoint steps do not spike the output.

use crate::config::PidConfig;

/// Runtime-tunable controller gain selected by the `reflow set` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidParam {
    Kp,
    Ki,
    Kd,
    Tau,
}

impl PidParam {
    /// Case-insensitive parse of an operator-typed parameter name.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("kp") {
            Some(Self::Kp)
        } else if s.eq_ignore_ascii_case("ki") {
            Some(Self::Ki)
        } else if s.eq_ignore_ascii_case("kd") {
            Some(Self::Kd)
        } else if s.eq_ignore_ascii_case("tau") {
            Some(Self::Tau)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Kp => "Kp",
            Self::Ki => "Ki",
            Self::Kd => "Kd",
            Self::Tau => "Tau",
        }
    }
}

/// PID controller state: gains plus iteration memory.
#[derive(Debug, Clone, Copy)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,

    /// Derivative low-pass filter time constant.
    tau: f32,
    /// Sample period (s).
    ts: f32,

    out_min: f32,
    out_max: f32,

    // Controller memory
    integral: f32,
    derivative: f32,
    prev_error: f32,
    prev_measurement: f32,

    // Kept for the data log.
    proportional: f32,

    out: f32,
}

/// True when both values sit on the same side of zero.
fn same_sign(x: f32, y: f32) -> bool {
    (x <= 0.0) == (y <= 0.0)
}

impl Pid {
    /// Controller with cleared memory and the given parameters.
    pub fn new(cfg: PidConfig) -> Self {
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            tau: cfg.tau,
            ts: cfg.ts,
            out_min: cfg.out_min,
            out_max: cfg.out_max,
            integral: 0.0,
            derivative: 0.0,
            prev_error: 0.0,
            prev_measurement: 0.0,
            proportional: 0.0,
            out: 0.0,
        }
    }

    /// One controller iteration. Setpoint and measurement must share units.
    pub fn update(&mut self, setpoint: f32, measurement: f32) -> f32 {
        let error = setpoint - measurement;

        self.proportional = self.kp * error;

        // Hold the integral while the previous output sits at a limit and
        // the error still pushes in that direction (anti-windup clamp).
        let saturated = self.out == self.out_max || self.out == self.out_min;
        if !(saturated && same_sign(self.out, error)) {
            self.integral += 0.5 * self.ki * self.ts * (error + self.prev_error);
        }

        // Filtered derivative, on measurement only.
        self.derivative = -(2.0 * self.kd * (measurement - self.prev_measurement)
            + (2.0 * self.tau - self.ts) * self.derivative)
            / (2.0 * self.tau + self.ts);

        self.out = (self.proportional + self.integral + self.derivative)
            .clamp(self.out_min, self.out_max);

        self.prev_error = error;
        self.prev_measurement = measurement;

        self.out
    }

    /// Clear controller memory but retain gains and limits.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.derivative = 0.0;
        self.prev_error = 0.0;
        self.prev_measurement = 0.0;
        self.proportional = 0.0;
        self.out = 0.0;
    }

    /// Update one gain on the live controller.
    pub fn set_param(&mut self, param: PidParam, value: f32) {
        match param {
            PidParam::Kp => self.kp = value,
            PidParam::Ki => self.ki = value,
            PidParam::Kd => self.kd = value,
            PidParam::Tau => self.tau = value,
        }
    }

    pub fn param(&self, param: PidParam) -> f32 {
        match param {
            PidParam::Kp => self.kp,
            PidParam::Ki => self.ki,
            PidParam::Kd => self.kd,
            PidParam::Tau => self.tau,
        }
    }

    /// Current parameter set, for the status dump.
    pub fn config(&self) -> PidConfig {
        PidConfig {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            tau: self.tau,
            ts: self.ts,
            out_min: self.out_min,
            out_max: self.out_max,
        }
    }

    pub fn sample_period(&self) -> f32 {
        self.ts
    }

    pub fn output_max(&self) -> f32 {
        self.out_max
    }

    // Iteration terms, kept visible for the data log.
    pub fn terms(&self) -> (f32, f32, f32) {
        (self.proportional, self.integral, self.derivative)
    }

    /// Most recent (clamped) controller output.
    pub fn output(&self) -> f32 {
        self.out
    }

    #[cfg(test)]
    fn integral_term(&self) -> f32 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> PidConfig {
        PidConfig {
            kp: 2.0,
            ki: 1.0,
            kd: 0.5,
            tau: 1.0,
            ts: 0.5,
            out_min: 0.0,
            out_max: 100.0,
        }
    }

    #[test]
    fn output_tracks_error_direction() {
        let mut pid = Pid::new(cfg());
        let above = pid.update(50.0, 20.0);
        assert!(above > 0.0, "positive error must drive positive output");

        pid.reset();
        let below = pid.update(20.0, 50.0);
        assert_eq!(below, 0.0, "negative error clamps to out_min");
    }

    #[test]
    fn output_clamped_to_limits() {
        let mut pid = Pid::new(cfg());
        let out = pid.update(10_000.0, 0.0);
        assert_eq!(out, 100.0);
        let out = pid.update(-10_000.0, 0.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn antiwindup_holds_integral_while_saturated() {
        let mut pid = Pid::new(cfg());

        // Saturate high with a huge positive error.
        let out = pid.update(10_000.0, 0.0);
        assert_eq!(out, 100.0);
        let frozen = pid.integral_term();

        // Same-sign error while pinned at out_max: integral must not move.
        let out = pid.update(10_000.0, 0.0);
        assert_eq!(out, 100.0);
        assert_eq!(pid.integral_term(), frozen, "integral accumulated during saturation");
    }

    #[test]
    fn antiwindup_releases_when_error_changes_sign() {
        let mut pid = Pid::new(PidConfig { kd: 0.0, ..cfg() });
        let _ = pid.update(200.0, 0.0); // Pin at out_max.
        let _ = pid.update(200.0, 0.0); // Held while saturated.
        let frozen = pid.integral_term();

        // Error flips negative: accumulation resumes on this iteration.
        let out = pid.update(0.0, 10.0);
        assert_ne!(pid.integral_term(), frozen, "integral must move again after the sign flip");
        assert!(out < 100.0, "output must leave the saturation rail");

        // And with the output interior, a persistent negative error now
        // unwinds the integral.
        let before = pid.integral_term();
        let _ = pid.update(0.0, 10.0);
        assert!(pid.integral_term() < before);
    }

    #[test]
    fn derivative_acts_on_measurement_not_setpoint() {
        let mut pid = Pid::new(PidConfig { kp: 0.0, ki: 0.0, ..cfg() });
        let _ = pid.update(0.0, 0.0);

        // Setpoint step with a flat measurement: no derivative kick.
        let _ = pid.update(100.0, 0.0);
        let (_, _, d) = pid.terms();
        assert_eq!(d, 0.0, "setpoint steps must not excite the derivative");

        // Rising measurement: derivative opposes it.
        let _ = pid.update(100.0, 10.0);
        let (_, _, d) = pid.terms();
        assert!(d < 0.0, "rising measurement must produce a negative derivative");
    }

    #[test]
    fn reset_clears_memory_retains_gains() {
        let mut pid = Pid::new(cfg());
        let _ = pid.update(50.0, 10.0);
        let _ = pid.update(50.0, 20.0);

        pid.reset();

        let (p, i, d) = pid.terms();
        assert_eq!((p, i, d), (0.0, 0.0, 0.0));
        assert_eq!(pid.output(), 0.0);
        let c = pid.config();
        assert_eq!(c.kp, 2.0);
        assert_eq!(c.ki, 1.0);
        assert_eq!(c.kd, 0.5);
        assert_eq!(c.tau, 1.0);
        assert_eq!(c.ts, 0.5);
        assert_eq!(c.out_max, 100.0);
    }

    #[test]
    fn set_param_updates_single_gain() {
        let mut pid = Pid::new(cfg());
        pid.set_param(PidParam::Kp, 7.5);
        assert_eq!(pid.param(PidParam::Kp), 7.5);
        assert_eq!(pid.param(PidParam::Ki), 1.0, "other gains untouched");
    }

    #[test]
    fn param_parse_is_case_insensitive() {
        assert_eq!(PidParam::parse("kp"), Some(PidParam::Kp));
        assert_eq!(PidParam::parse("KI"), Some(PidParam::Ki));
        assert_eq!(PidParam::parse("Kd"), Some(PidParam::Kd));
        assert_eq!(PidParam::parse("TAU"), Some(PidParam::Tau));
        assert_eq!(PidParam::parse("Kx"), None);
    }

    proptest! {
        #[test]
        fn output_always_within_limits(
            steps in proptest::collection::vec((0.0f32..300.0, -50.0f32..400.0), 1..200)
        ) {
            let mut pid = Pid::new(cfg());
            for (setpoint, measurement) in steps {
                let out = pid.update(setpoint, measurement);
                prop_assert!((0.0..=100.0).contains(&out), "output {out} escaped the limits");
            }
        }
    }
}
