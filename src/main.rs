//! Reflow oven controller — host entry point.
//!
//! Wires the control core to the simulated oven and runs the operator
//! console on stdin:
//!
//! ```text
//! stdin ──▶ Console AO ──commands──▶ Reflow AO ──PWM──▶ SimHeater
//!                                        ▲                  │
//!                                        │              OvenModel
//!                                  SimThermocouple ◀────────┘
//! ```
//!
//! On hardware the two simulated ports are replaced by the MAX31855K SPI
//! driver and the PWM timer channel; everything else is target-agnostic.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use reflowctl::active::timer::TimerService;
use reflowctl::active::{self, ThreadConfig};
use reflowctl::config::SystemConfig;
use reflowctl::console::{Console, ConsoleEvent, LINE_MAX, Line};
use reflowctl::drivers::heater::SimHeater;
use reflowctl::reflow::{self, ReflowController, TelemetryCell};
use reflowctl::sensors::thermocouple::SimThermocouple;
use reflowctl::sim::OvenModel;

/// Oven-sim update period.
const SIM_STEP_MS: u64 = 100;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("reflowctl v{}", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 1. Simulated hardware ─────────────────────────────────
    let thermocouple = Arc::new(SimThermocouple::new(25.0));
    let heater = Arc::new(SimHeater::new());

    // Thermal model thread: closes the physical loop between the heater
    // output and the thermocouple input.
    let _oven_sim = {
        let thermo = Arc::clone(&thermocouple);
        let heat = Arc::clone(&heater);
        thread::Builder::new().name("oven-sim".into()).spawn(move || {
            let mut oven = OvenModel::new(25.0);
            loop {
                thread::sleep(Duration::from_millis(SIM_STEP_MS));
                oven.step(heat.duty_fraction(), SIM_STEP_MS as f32 / 1000.0);
                thermo.set_temperature(oven.temperature());
            }
        })?
    };

    // ── 2. Time-event tick source ─────────────────────────────
    let timers = TimerService::new(Duration::from_millis(u64::from(config.tick_period_ms)));

    // ── 3. Reflow controller active object ────────────────────
    let (reflow_mailbox, reflow_inbox) = active::queue(config.reflow_queue_depth);
    let telemetry = TelemetryCell::new(config.pid);
    let control_timer = ReflowController::spawn_control_timer(&config, reflow_mailbox.clone());
    let controller = ReflowController::new(
        &config,
        reflow_mailbox.clone(),
        &timers,
        control_timer,
        thermocouple.clone(),
        heater.clone(),
        telemetry.clone(),
    );
    let _reflow_thread = active::start(
        ThreadConfig { name: "reflow", stack_size: config.reflow_stack_size },
        reflow_inbox,
        controller,
    );

    // ── 4. Console active object ──────────────────────────────
    let mut console = Console::new();
    console.register(reflow::console_client(
        reflow_mailbox,
        telemetry,
        thermocouple.clone(),
    ));
    let (console_mailbox, console_inbox) = active::queue(config.console_queue_depth);
    let _console_thread = active::start(
        ThreadConfig { name: "console", stack_size: config.console_stack_size },
        console_inbox,
        console,
    );

    info!("System ready. Type 'help' for commands.");

    // ── 5. Serial transport: stdin lines → console events ─────
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let Ok(copy) = Line::try_from(line.trim_end()) else {
            warn!("CONSOLE: line longer than {LINE_MAX} bytes dropped");
            continue;
        };
        if let Err(e) = console_mailbox.post(ConsoleEvent::Line(copy)) {
            warn!("CONSOLE: input dropped ({e})");
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
