//! K-type thermocouple temperature source (MAX31855K behind SPI).
//!
//! The control core consumes the narrow [`ThermocouplePort`] contract:
//! one blocking read returning either a hot-junction temperature or a
//! fault. Any fault aborts a running profile; the core never interprets
//! faulted readings further.
//!
//! ## Dual-target design
//!
//! On hardware the port wraps the SPI driver's blocking receive. On the
//! host target [`SimThermocouple`] reads from atomics so tests and the
//! oven simulator can inject temperatures and faults.

use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use crate::error::ThermoFault;

/// Read-side port: the reflow controller calls this once per control tick
/// (and once per start attempt).
pub trait ThermocouplePort: Send + Sync {
    /// Blocking read of the hot-junction temperature (°C).
    fn read(&self) -> Result<f32, ThermoFault>;
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

/// Atomic-backed thermocouple for the host target.
///
/// Temperature is stored in milli-degrees so a plain integer atomic
/// carries it across threads; writers are the simulator or a test, the
/// reader is the controller thread.
pub struct SimThermocouple {
    temp_mdeg: AtomicI32,
    fault: AtomicU8,
}

const FAULT_NONE: u8 = 0;

fn fault_code(fault: ThermoFault) -> u8 {
    match fault {
        ThermoFault::ShortVcc => 1,
        ThermoFault::ShortGnd => 2,
        ThermoFault::Open => 3,
        ThermoFault::ZeroRead => 4,
        ThermoFault::TransferFail => 5,
    }
}

fn fault_from_code(code: u8) -> Option<ThermoFault> {
    match code {
        1 => Some(ThermoFault::ShortVcc),
        2 => Some(ThermoFault::ShortGnd),
        3 => Some(ThermoFault::Open),
        4 => Some(ThermoFault::ZeroRead),
        5 => Some(ThermoFault::TransferFail),
        _ => None,
    }
}

impl SimThermocouple {
    pub fn new(initial_c: f32) -> Self {
        Self {
            temp_mdeg: AtomicI32::new((initial_c * 1000.0) as i32),
            fault: AtomicU8::new(FAULT_NONE),
        }
    }

    /// Inject a temperature (°C).
    pub fn set_temperature(&self, celsius: f32) {
        self.temp_mdeg
            .store((celsius * 1000.0) as i32, Ordering::Relaxed);
    }

    pub fn temperature(&self) -> f32 {
        self.temp_mdeg.load(Ordering::Relaxed) as f32 / 1000.0
    }

    /// Inject (or clear) a fault; subsequent reads return it.
    pub fn set_fault(&self, fault: Option<ThermoFault>) {
        let code = fault.map_or(FAULT_NONE, fault_code);
        self.fault.store(code, Ordering::Relaxed);
    }
}

impl ThermocouplePort for SimThermocouple {
    fn read(&self) -> Result<f32, ThermoFault> {
        match fault_from_code(self.fault.load(Ordering::Relaxed)) {
            Some(fault) => Err(fault),
            None => Ok(self.temperature()),
        }
    }
}
