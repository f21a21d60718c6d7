//! Verbosity-gated logging for the schedule engine.
//!
//! Everything goes to stderr and costs a single comparison when disabled.
//! Levels:
//! - `Silent`: nothing
//! - `Changes`: date corrections, container roll-ups
//! - `Checks`: skipped edges, detected cycles, compliant edges
//! - `Debug`: iteration boundaries, topological order

/// How much the engine reports while it runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Silent = 0,
    Changes = 1,
    Checks = 2,
    Debug = 3,
}

impl Verbosity {
    /// Map a numeric level onto a verbosity, saturating above `Debug`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Changes,
            2 => Verbosity::Checks,
            _ => Verbosity::Debug,
        }
    }
}

/// Log a date correction or container update (verbosity >= Changes).
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Changes {
            eprintln!("[cronograma] {}", format_args!($($arg)*));
        }
    };
}

/// Log an edge-level decision (verbosity >= Checks).
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Checks {
            eprintln!("[cronograma]   {}", format_args!($($arg)*));
        }
    };
}

/// Log engine internals (verbosity >= Debug).
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Debug {
            eprintln!("[cronograma]     {}", format_args!($($arg)*));
        }
    };
}
