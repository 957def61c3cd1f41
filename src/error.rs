//! Unified error types for the reflow controller firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level control loop's error handling
//! uniform. All variants are `Copy` so they can be cheaply passed between
//! the active-object threads without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The thermocouple could not be read.
    Thermo(ThermoFault),
    /// An event could not be posted to an active object.
    Post(PostError),
    /// A console command was malformed or unknown.
    Command(CmdError),
    /// Configuration is invalid.
    Config(&'static str),
    /// Peripheral or runtime initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thermo(e) => write!(f, "thermocouple: {e}"),
            Self::Post(e) => write!(f, "post: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Thermocouple faults
// ---------------------------------------------------------------------------

/// Fault conditions reported by the MAX31855K thermocouple interface.
///
/// The control core treats every variant identically — abort the running
/// profile — and does not interpret faulted readings further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermoFault {
    /// Thermocouple shorted to VCC.
    ShortVcc,
    /// Thermocouple shorted to GND.
    ShortGnd,
    /// Thermocouple connection is open.
    Open,
    /// SPI transfer returned all zeros.
    ZeroRead,
    /// SPI transfer itself failed.
    TransferFail,
}

impl fmt::Display for ThermoFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortVcc => write!(f, "shorted to VCC"),
            Self::ShortGnd => write!(f, "shorted to GND"),
            Self::Open => write!(f, "open connection"),
            Self::ZeroRead => write!(f, "read all zeros"),
            Self::TransferFail => write!(f, "SPI transfer failed"),
        }
    }
}

impl From<ThermoFault> for Error {
    fn from(e: ThermoFault) -> Self {
        Self::Thermo(e)
    }
}

// ---------------------------------------------------------------------------
// Event posting errors
// ---------------------------------------------------------------------------

/// Result of a non-blocking post into an active object's queue.
///
/// `QueueFull` is a timeout-class condition: the caller decides whether to
/// drop, retry or propagate. There is no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    /// The bounded event queue is at capacity.
    QueueFull,
    /// The receiving active object no longer exists.
    Closed,
}

impl fmt::Display for PostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "event queue full"),
            Self::Closed => write!(f, "event queue closed"),
        }
    }
}

impl From<PostError> for Error {
    fn from(e: PostError) -> Self {
        Self::Post(e)
    }
}

// ---------------------------------------------------------------------------
// Console command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdError {
    /// First token did not match any registered client.
    UnknownClient,
    /// Second token did not match any of the client's commands.
    UnknownCommand,
    /// Wrong number of arguments or unparseable value.
    BadArgs,
    /// Line exceeded the token or length limits.
    Overrun,
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClient => write!(f, "unknown client"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::BadArgs => write!(f, "bad arguments"),
            Self::Overrun => write!(f, "line overrun"),
        }
    }
}

impl From<CmdError> for Error {
    fn from(e: CmdError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
