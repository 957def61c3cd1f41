//! Reflow profile definition.
//!
//! The profile is a fixed ordered sequence of phases, one per non-reset
//! state, baked in at compile time. Each phase is either driven to a target
//! temperature with maximum gradient (`ReachTemp`) or run for a fixed
//! duration with the setpoint ramped linearly (`ReachTime`).

/// How a phase decides it is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// Attain a specific temperature; duration open-ended.
    ReachTemp,
    /// Run for a specified time; temperature ramped toward the target.
    ReachTime,
}

/// Immutable descriptor for one profile phase.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    pub kind: PhaseKind,
    /// Target temperature (°C).
    pub target_c: f32,
    /// Phase duration in time-event ticks (seconds at the 1 s tick);
    /// meaningful for `ReachTime` phases only.
    pub duration_s: u32,
}

/// Number of profile phases (every state except reset).
pub const NUM_PHASES: usize = 5;

/// The leaded-solder reflow profile:
/// preheat → soak → ramp-up → peak → cool-down.
pub const PROFILE: [Phase; NUM_PHASES] = [
    // Pre-heat
    Phase { kind: PhaseKind::ReachTemp, target_c: 100.0, duration_s: 0 },
    // Soak
    Phase { kind: PhaseKind::ReachTime, target_c: 150.0, duration_s: 120 },
    // Ramp-up
    Phase { kind: PhaseKind::ReachTemp, target_c: 215.0, duration_s: 0 },
    // Peak
    Phase { kind: PhaseKind::ReachTime, target_c: 215.0, duration_s: 5 },
    // Cool-down
    Phase { kind: PhaseKind::ReachTemp, target_c: 35.0, duration_s: 0 },
];

/// Profile phase indices, for readable profile lookups.
pub const PREHEAT: usize = 0;
pub const SOAK: usize = 1;
pub const RAMPUP: usize = 2;
pub const PEAK: usize = 3;
pub const COOLDOWN: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_ordered_and_complete() {
        assert_eq!(PROFILE.len(), NUM_PHASES);
        assert!(PROFILE[PREHEAT].target_c < PROFILE[SOAK].target_c);
        assert!(PROFILE[SOAK].target_c <= PROFILE[RAMPUP].target_c);
        assert_eq!(PROFILE[RAMPUP].target_c, PROFILE[PEAK].target_c);
        assert!(
            PROFILE[COOLDOWN].target_c < PROFILE[PREHEAT].target_c,
            "cool-down target must be below every heating target"
        );
    }

    #[test]
    fn reach_time_phases_have_durations() {
        for phase in &PROFILE {
            if phase.kind == PhaseKind::ReachTime {
                assert!(phase.duration_s > 0);
            }
        }
    }
}
