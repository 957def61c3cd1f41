//! Reflow oven controller active object.
//!
//! A table-driven state machine sequencing the oven through the fixed
//! reflow profile, with a PID iteration on every control-timer tick.
//!
//! ```text
//!  RESET ──[start, oven cold]──▶ PREHEAT ──[reach 100°C]──▶ SOAK
//!    ▲                                                        │
//!    │                                                  [120 s elapsed]
//!    │                                                        ▼
//!  COOLDOWN ◀──[5 s elapsed]── PEAK ◀──[reach 215°C]── RAMPUP
//!    │
//!    └──[reach 35°C]──▶ RESET        any running state ──[stop]──▶ RESET
//! ```
//!
//! Dispatch is `TABLE[state][signal] → action`; an action that returns
//! [`Status::Tran`] has already updated `state`, and the dispatcher then
//! runs the destination state's entry action exactly once. Entry actions
//! do one-time setup (start PWM, arm a time event, compute the ramp step)
//! and must never run twice per transition.
//!
//! The per-tick control action lives outside the table: it reads the
//! thermocouple, detects phase completion, ramps the setpoint through
//! reach-time phases and writes one PID iteration to the heater PWM.

pub mod profile;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};

use crate::active::timer::{Periodic, TimeEvent, TimerService};
use crate::active::{EventHandler, Mailbox};
use crate::config::{PidConfig, SystemConfig};
use crate::console::{Client, Command};
use crate::control::pid::{Pid, PidParam};
use crate::drivers::heater::HeaterPort;
use crate::error::CmdError;
use crate::sensors::thermocouple::ThermocouplePort;
use profile::{COOLDOWN, PEAK, PREHEAT, PROFILE, PhaseKind, RAMPUP, SOAK};

/// Reach-temperature detection window (°C). Signed comparison, so a
/// reading far above target can never alias into the window.
pub const REACH_TEMP_TOLERANCE_C: f32 = 2.0;

// ---------------------------------------------------------------------------
// States, signals, events
// ---------------------------------------------------------------------------

/// Reflow controller states. `Reset` is initial and terminal-per-cycle;
/// every other state corresponds to one profile phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum State {
    Reset = 0,
    Preheat = 1,
    Soak = 2,
    Rampup = 3,
    Peak = 4,
    Cooldown = 5,
}

impl State {
    pub const COUNT: usize = 6;

    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::Preheat => "PREHEAT",
            Self::Soak => "SOAK",
            Self::Rampup => "RAMPUP",
            Self::Peak => "PEAK",
            Self::Cooldown => "COOLDOWN",
        }
    }

    /// Index of the active profile phase; `None` in `Reset`.
    pub fn phase_index(self) -> Option<usize> {
        match self {
            Self::Reset => None,
            _ => Some(self as usize - 1),
        }
    }
}

/// Columns of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
enum Sig {
    Init = 0,
    Entry = 1,
    Start = 2,
    ReachTime = 3,
    ReachTemp = 4,
    Stop = 5,
}

impl Sig {
    const COUNT: usize = 6;
}

/// Outcome of one table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Initial pseudo-transition; run the initial state's entry action.
    Init,
    /// Transition taken (`state` already updated); run the new entry action.
    Tran,
    /// Event processed, no transition.
    Handled,
    /// Event irrelevant to the current state.
    Ignored,
}

/// Events delivered to the reflow active object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReflowEvent {
    /// Synthetic init, delivered once before the event loop.
    Init,
    /// Operator requested a run.
    Start,
    /// The phase time event expired.
    ReachTime,
    /// The control tick detected the phase target temperature.
    ReachTemp,
    /// Operator requested an abort, or the fail-safe fired.
    Stop,
    /// Periodic control-timer tick: run one PID iteration.
    ControlTick,
    /// Update one PID gain on the live controller.
    SetGain { param: PidParam, value: f32 },
}

// ---------------------------------------------------------------------------
// Telemetry cell
// ---------------------------------------------------------------------------

/// Point-in-time controller snapshot for the console.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    pub state: State,
    pub setpoint: f32,
    pub last_output: f32,
    pub pid: PidConfig,
}

/// Shared snapshot cell: written by the controller thread after every
/// event, read by the console thread. The controller's own state is never
/// touched from outside; only this copy crosses threads.
#[derive(Clone)]
pub struct TelemetryCell {
    inner: Arc<Mutex<Telemetry>>,
}

impl TelemetryCell {
    pub fn new(pid: PidConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Telemetry {
                state: State::Reset,
                setpoint: 0.0,
                last_output: 0.0,
                pid,
            })),
        }
    }

    pub fn snapshot(&self) -> Telemetry {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self, t: Telemetry) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = t;
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

type Action = fn(&mut ReflowController) -> Status;

/// The reflow controller: private state plus handles to the runtime.
pub struct ReflowController {
    state: State,
    pid: Pid,
    /// Target temperature handed to the PID each tick.
    setpoint: f32,
    /// Setpoint increment per control tick in reach-time phases
    /// (°C / sample); a linear ramp instead of a step avoids control
    /// transients.
    step_size: f32,

    /// Own mailbox, for the post-to-self pattern.
    mailbox: Mailbox<ReflowEvent>,
    /// One-shot phase timer for reach-time phases.
    time_evt: TimeEvent,
    /// Control-rate timer driving the PID iterations.
    control_timer: Periodic,

    thermocouple: Arc<dyn ThermocouplePort>,
    heater: Arc<dyn HeaterPort>,
    telemetry: TelemetryCell,
}

impl ReflowController {
    /// Construct the controller and register its time event.
    ///
    /// Call during start-up, before the timer tick source runs; then hand
    /// the controller to [`crate::active::start`]. The control-rate timer
    /// is injected so the host target and tests choose its period; see
    /// [`spawn_control_timer`].
    pub fn new(
        cfg: &SystemConfig,
        mailbox: Mailbox<ReflowEvent>,
        timers: &TimerService,
        control_timer: Periodic,
        thermocouple: Arc<dyn ThermocouplePort>,
        heater: Arc<dyn HeaterPort>,
        telemetry: TelemetryCell,
    ) -> Self {
        let time_evt = timers.register(ReflowEvent::ReachTime, mailbox.clone());
        Self {
            state: State::Reset,
            pid: Pid::new(cfg.pid),
            setpoint: 0.0,
            step_size: 0.0,
            mailbox,
            time_evt,
            control_timer,
            thermocouple,
            heater,
            telemetry,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The periodic timer that drives PID iterations, at the sample rate
    /// from `cfg`. Created stopped; `PREHEAT` entry starts it.
    pub fn spawn_control_timer(cfg: &SystemConfig, mailbox: Mailbox<ReflowEvent>) -> Periodic {
        Periodic::spawn(
            "pid-timer",
            Duration::from_millis(cfg.control_period_ms()),
            mailbox,
            ReflowEvent::ControlTick,
        )
    }

    /// Whether the control-rate timer is currently running.
    pub fn control_timer_running(&self) -> bool {
        self.control_timer.is_running()
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// State × signal transition table. Rows follow [`State`], columns
    /// follow [`Sig`]; every cell is defined, so dispatch can never index
    /// a missing transition.
    const TABLE: [[Action; Sig::COUNT]; State::COUNT] = [
        // INIT, ENTRY, START, REACH_TIME, REACH_TEMP, STOP
        /* RESET    */
        [
            Self::reset_init,
            Self::reset_entry,
            Self::reset_start,
            Self::ignore,
            Self::ignore,
            Self::ignore,
        ],
        /* PREHEAT  */
        [
            Self::ignore,
            Self::preheat_entry,
            Self::ignore,
            Self::ignore,
            Self::preheat_reach,
            Self::stop_run,
        ],
        /* SOAK     */
        [
            Self::ignore,
            Self::soak_entry,
            Self::ignore,
            Self::soak_reach,
            Self::ignore,
            Self::stop_run,
        ],
        /* RAMPUP   */
        [
            Self::ignore,
            Self::rampup_entry,
            Self::ignore,
            Self::ignore,
            Self::rampup_reach,
            Self::stop_run,
        ],
        /* PEAK     */
        [
            Self::ignore,
            Self::peak_entry,
            Self::ignore,
            Self::peak_reach,
            Self::ignore,
            Self::stop_run,
        ],
        /* COOLDOWN */
        [
            Self::ignore,
            Self::cooldown_entry,
            Self::ignore,
            Self::ignore,
            Self::cooldown_reach,
            Self::stop_run,
        ],
    ];

    fn dispatch(&mut self, sig: Sig) {
        let action = Self::TABLE[self.state as usize][sig as usize];
        match action(self) {
            // A taken transition (or the initial pseudo-transition) is
            // always followed by exactly one entry-action invocation for
            // the destination state.
            Status::Tran | Status::Init => {
                let entry = Self::TABLE[self.state as usize][Sig::Entry as usize];
                let _ = entry(self);
            }
            Status::Handled | Status::Ignored => {}
        }
    }

    // -----------------------------------------------------------------------
    // Entry actions
    // -----------------------------------------------------------------------

    fn reset_init(&mut self) -> Status {
        info!("REFLOW: initializing reflow oven controller");
        self.state = State::Reset;
        Status::Init
    }

    fn reset_entry(&mut self) -> Status {
        info!("REFLOW: turning PWM off");
        self.heater.set_compare(0);
        self.heater.stop();

        self.pid.reset();
        self.setpoint = 0.0;
        self.step_size = 0.0;

        self.control_timer.stop();
        self.time_evt.disarm();

        info!("REFLOW: controller ready, enter \"reflow start\" to begin");
        Status::Handled
    }

    fn preheat_entry(&mut self) -> Status {
        self.heater.start();
        self.setpoint = PROFILE[PREHEAT].target_c;
        self.control_timer.start();
        Status::Handled
    }

    fn soak_entry(&mut self) -> Status {
        // Linear setpoint ramp across the soak duration, one step per
        // PID sample.
        let samples = PROFILE[SOAK].duration_s as f32 / self.pid.sample_period();
        self.step_size = (PROFILE[SOAK].target_c - PROFILE[PREHEAT].target_c) / samples;
        self.time_evt.arm(PROFILE[SOAK].duration_s, 0);
        Status::Handled
    }

    fn rampup_entry(&mut self) -> Status {
        self.setpoint = PROFILE[RAMPUP].target_c;
        Status::Handled
    }

    fn peak_entry(&mut self) -> Status {
        self.step_size = 0.0;
        self.time_evt.arm(PROFILE[PEAK].duration_s, 0);
        Status::Handled
    }

    fn cooldown_entry(&mut self) -> Status {
        self.setpoint = PROFILE[COOLDOWN].target_c;
        Status::Handled
    }

    // -----------------------------------------------------------------------
    // Transition actions
    // -----------------------------------------------------------------------

    /// `START` is accepted only from `RESET`, and only when the oven is
    /// verifiably cold: a fresh reading must succeed and sit at or below
    /// the cool-down target before a new run may begin.
    fn reset_start(&mut self) -> Status {
        let current = match self.thermocouple.read() {
            Ok(t) => t,
            Err(fault) => {
                warn!("REFLOW: thermocouple read error ({fault}), unable to start reflow process");
                return Status::Handled;
            }
        };
        let cold_limit = PROFILE[COOLDOWN].target_c;
        if current > cold_limit {
            warn!(
                "REFLOW: oven at {current:.2} °C, must cool to {cold_limit:.0} °C or below before another run"
            );
            return Status::Handled;
        }

        info!("REFLOW: starting reflow process");
        info!("REFLOW: entering pre-heat phase");
        self.state = State::Preheat;
        Status::Tran
    }

    fn preheat_reach(&mut self) -> Status {
        info!("REFLOW: entering soak phase");
        self.state = State::Soak;
        Status::Tran
    }

    fn soak_reach(&mut self) -> Status {
        info!("REFLOW: entering ramp-up phase");
        self.state = State::Rampup;
        Status::Tran
    }

    fn rampup_reach(&mut self) -> Status {
        info!("REFLOW: entering peak phase");
        self.state = State::Peak;
        Status::Tran
    }

    fn peak_reach(&mut self) -> Status {
        info!("REFLOW: entering cool-down phase");
        self.state = State::Cooldown;
        Status::Tran
    }

    fn cooldown_reach(&mut self) -> Status {
        info!("REFLOW: reflow process completed");
        self.state = State::Reset;
        Status::Tran
    }

    /// `STOP` from any running state: back to `RESET`.
    fn stop_run(&mut self) -> Status {
        info!("REFLOW: reflow process stopped");
        self.control_timer.stop();
        self.state = State::Reset;
        Status::Tran
    }

    fn ignore(&mut self) -> Status {
        Status::Ignored
    }

    // -----------------------------------------------------------------------
    // Control tick
    // -----------------------------------------------------------------------

    /// One control cycle: read the thermocouple, detect phase completion,
    /// ramp the setpoint, run the PID and write the heater PWM compare.
    fn control_tick(&mut self) {
        // A tick queued before the run stopped lands here; nothing to do.
        let Some(phase_idx) = self.state.phase_index() else {
            return;
        };

        let temperature = match self.thermocouple.read() {
            Ok(t) => t,
            Err(fault) => {
                error!("REFLOW: could not read temperature ({fault}), aborting reflow process");
                // Post-to-self: queued behind nothing executing, handled
                // next. Fail-safe shutdown instead of propagation.
                if let Err(e) = self.mailbox.post(ReflowEvent::Stop) {
                    warn!("REFLOW: failed to post stop ({e})");
                }
                return;
            }
        };

        let phase = &PROFILE[phase_idx];
        match phase.kind {
            PhaseKind::ReachTemp => {
                if (temperature - phase.target_c).abs() <= REACH_TEMP_TOLERANCE_C {
                    // Queue-full is tolerable: the window re-triggers on
                    // the next tick.
                    if let Err(e) = self.mailbox.post(ReflowEvent::ReachTemp) {
                        warn!("REFLOW: failed to post reach-temp ({e})");
                    }
                }
            }
            PhaseKind::ReachTime => {
                self.setpoint += self.step_size;
            }
        }

        let output = self.pid.update(self.setpoint, temperature);
        self.heater.set_compare(output as u16);

        // Data-log line: state, setpoint, measurement, P, I, D, output.
        let (p, i, d) = self.pid.terms();
        info!(
            "REFLOW: {} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
            self.state.name(),
            self.setpoint,
            temperature,
            p,
            i,
            d,
            output
        );
    }

    fn publish_telemetry(&self) {
        self.telemetry.store(Telemetry {
            state: self.state,
            setpoint: self.setpoint,
            last_output: self.pid.output(),
            pid: self.pid.config(),
        });
    }
}

impl EventHandler for ReflowController {
    type Event = ReflowEvent;
    const INIT: ReflowEvent = ReflowEvent::Init;

    fn on_event(&mut self, event: ReflowEvent) {
        match event {
            ReflowEvent::ControlTick => self.control_tick(),
            ReflowEvent::SetGain { param, value } => {
                self.pid.set_param(param, value);
                info!("REFLOW: updated {} to {value:.2}", param.name());
            }
            ReflowEvent::Init => self.dispatch(Sig::Init),
            ReflowEvent::Start => self.dispatch(Sig::Start),
            ReflowEvent::ReachTime => self.dispatch(Sig::ReachTime),
            ReflowEvent::ReachTemp => self.dispatch(Sig::ReachTemp),
            ReflowEvent::Stop => self.dispatch(Sig::Stop),
        }
        self.publish_telemetry();
    }
}

// ---------------------------------------------------------------------------
// Console client
// ---------------------------------------------------------------------------

/// Build the `reflow` console client: `status`, `start`, `stop`, `set`.
///
/// Handlers run on the console thread; they only post events and read the
/// shared telemetry snapshot, never the controller's own state.
pub fn console_client(
    mailbox: Mailbox<ReflowEvent>,
    telemetry: TelemetryCell,
    thermocouple: Arc<dyn ThermocouplePort>,
) -> Client {
    let start_mailbox = mailbox.clone();
    let stop_mailbox = mailbox.clone();
    let set_mailbox = mailbox;

    Client::new("reflow")
        .command(Command::new(
            "status",
            "Dump information about the reflow oven controller.",
            move |_args| {
                let t = telemetry.snapshot();
                println!(
                    "Kp: {:.2}\tKi: {:.2}\tKd: {:.2}\tTau: {:.2}",
                    t.pid.kp, t.pid.ki, t.pid.kd, t.pid.tau
                );
                println!(
                    "Sampling Period: {:.2} s\tMax Limit: {:.2}\tMin Limit: {:.2}",
                    t.pid.ts, t.pid.out_max, t.pid.out_min
                );
                for (idx, phase) in PROFILE.iter().enumerate() {
                    println!(
                        "Phase: {}\tType: {}\tReach Temp: {:.0} deg C\tReach Time: {} s",
                        phase_name(idx),
                        match phase.kind {
                            PhaseKind::ReachTemp => "REACHTEMP",
                            PhaseKind::ReachTime => "REACHTIME",
                        },
                        phase.target_c,
                        phase.duration_s
                    );
                }
                println!("Current state: {}", t.state.name());
                println!("Setpoint: {:.2}\tPWM output: {:.0}", t.setpoint, t.last_output);
                match thermocouple.read() {
                    Ok(temp) => println!("Oven temperature: {temp:.2}"),
                    Err(fault) => println!("Oven temperature read error: {fault}"),
                }
                Ok(())
            },
        ))
        .command(Command::new("start", "Start reflow process.", move |_args| {
            start_mailbox.post(ReflowEvent::Start)?;
            println!("Posted START signal to reflow controller.");
            Ok(())
        }))
        .command(Command::new("stop", "Stop reflow process.", move |_args| {
            stop_mailbox.post(ReflowEvent::Stop)?;
            println!("Posted STOP signal to reflow controller.");
            Ok(())
        }))
        .command(Command::new(
            "set",
            "Set PID parameters (Kp, Ki, Kd, Tau).\nUsage: reflow set <param> <value> [<param2> <value2> ...]",
            move |args| {
                if args.is_empty() || args.len() % 2 != 0 {
                    return Err(CmdError::BadArgs.into());
                }
                for pair in args.chunks_exact(2) {
                    let param = PidParam::parse(pair[0]).ok_or(CmdError::BadArgs)?;
                    let value: f32 = pair[1].parse().map_err(|_| CmdError::BadArgs)?;
                    set_mailbox.post(ReflowEvent::SetGain { param, value })?;
                    println!("Posted {} update to {value:.2}", param.name());
                }
                Ok(())
            },
        ))
}

fn phase_name(idx: usize) -> &'static str {
    match idx {
        PREHEAT => "PREHEAT",
        SOAK => "SOAK",
        RAMPUP => "RAMPUP",
        PEAK => "PEAK",
        COOLDOWN => "COOLDOWN",
        _ => "?",
    }
}
