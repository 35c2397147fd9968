//! Per-module log switches for the `log` facade.
//!
//! The detection loop, the engine and the skin-colour extractor run once per
//! camera frame. Each module declares `const ENABLE_LOGS: bool` and logs
//! through these macros, so a noisy module can be silenced at compile time
//! while `RUST_LOG` keeps governing the rest.
//!
//! ```ignore
//! // sensing/skin.rs
//! const ENABLE_LOGS: bool = false;
//! use crate::log_debug;
//!
//! log_debug!("hand blob of {pixels} px at ({x:.0}, {y:.0})");
//! ```

/// `log::debug!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::info!` when the calling module's `ENABLE_LOGS` is set. Used for
/// sip events, goal changes and pipeline start/stop.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is set. Skipped frames
/// and unavailable engines land here.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` when the calling module's `ENABLE_LOGS` is set. Persistence
/// and scheduler task failures land here.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
