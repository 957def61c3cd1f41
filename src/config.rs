//! System configuration parameters
//!
//! All tunable parameters for the reflow oven controller. The profile
//! itself (phase order and targets) is fixed at compile time in
//! [`crate::reflow::profile`]; everything here may be adjusted per build
//! or, for the PID gains, at runtime through the `reflow set` command.

use serde::{Deserialize, Serialize};

/// PID controller configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidConfig {
    /// Proportional gain.
    pub kp: f32,
    /// Integral gain.
    pub ki: f32,
    /// Derivative gain.
    pub kd: f32,
    /// Derivative low-pass filter time constant (s).
    pub tau: f32,
    /// Sample period (s).
    pub ts: f32,
    /// Output saturation limits. `out_max` matches the PWM timer period
    /// (12-bit resolution, so 4095).
    pub out_min: f32,
    pub out_max: f32,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Control loop ---
    /// PID gains, filter constant, sample period and output limits.
    pub pid: PidConfig,

    // --- Timing ---
    /// Time-event tick period (milliseconds). One tick decrements every
    /// armed countdown by one, so phase durations are expressed in ticks.
    pub tick_period_ms: u32,

    // --- Queues ---
    /// Reflow active object event queue depth.
    pub reflow_queue_depth: usize,
    /// Console active object event queue depth.
    pub console_queue_depth: usize,

    // --- Threads ---
    /// Stack size for the reflow controller thread (bytes).
    pub reflow_stack_size: usize,
    /// Stack size for the console thread (bytes).
    pub console_stack_size: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig {
                kp: 10.0,
                ki: 0.0,
                kd: 0.0,
                tau: 1.0,
                ts: 0.5,
                out_min: 0.0,
                out_max: 4095.0,
            },

            // 1 s tick: phase durations are specified in seconds.
            tick_period_ms: 1000,

            reflow_queue_depth: 5,
            console_queue_depth: 5,

            reflow_stack_size: 2 * 1024 * 1024,
            console_stack_size: 1024 * 1024,
        }
    }
}

impl SystemConfig {
    /// Control-timer period derived from the PID sample period.
    pub fn control_period_ms(&self) -> u64 {
        (self.pid.ts * 1000.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.pid.ts > 0.0);
        assert!(c.pid.tau > 0.0);
        assert!(c.pid.out_max > c.pid.out_min);
        assert!(c.tick_period_ms > 0);
        assert!(c.reflow_queue_depth > 0);
        assert!(c.console_queue_depth > 0);
    }

    #[test]
    fn control_period_derived_from_ts() {
        let c = SystemConfig::default();
        assert_eq!(c.control_period_ms(), 500);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert!((c.pid.kp - c2.pid.kp).abs() < 0.001);
        assert!((c.pid.ts - c2.pid.ts).abs() < 0.001);
        assert_eq!(c.tick_period_ms, c2.tick_period_ms);
        assert_eq!(c.reflow_queue_depth, c2.reflow_queue_depth);
    }

    #[test]
    fn pwm_resolution_is_12_bit() {
        let c = SystemConfig::default();
        assert_eq!(c.pid.out_max as u32, 4095, "PWM compare range must match the 12-bit timer period");
    }
}
