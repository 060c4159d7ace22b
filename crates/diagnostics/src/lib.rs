//! Logging for the zkchroot workspace.
//!
//! Thin layer over `emit` so every crate logs the same way and the level is
//! chosen in one place.
//!
//! Usage:
//! - Set ZKCHROOT_LOG=off (default) - no logs
//! - Set ZKCHROOT_LOG=info - chroot changes and other connection-level events
//! - Set ZKCHROOT_LOG=debug - every step of recursive create/delete walks

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "ZKCHROOT_LOG";

static INIT: Once = Once::new();

/// Parse a level name as accepted in `ZKCHROOT_LOG`.
///
/// Returns `Ok(None)` for `off`, and the rejected name for names we don't know.
pub fn parse_level(name: &str) -> Result<Option<emit::Level>, String> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "off" => Ok(None),
        "debug" => Ok(Some(emit::Level::Debug)),
        "info" => Ok(Some(emit::Level::Info)),
        "warn" => Ok(Some(emit::Level::Warn)),
        "error" => Ok(Some(emit::Level::Error)),
        other => Err(other.to_string()),
    }
}

/// Initialize diagnostics based on the ZKCHROOT_LOG environment variable.
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_diagnostics() {
    let configured = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
    match parse_level(&configured) {
        Ok(level) => init_with_level(level),
        Err(_) => {
            init_with_level(Some(emit::Level::Info));
            // Logger is up by now, so the complaint goes through it
            emit::warn!(
                "Unknown {var} value '{value}', using 'info'",
                var: LOG_ENV,
                value: configured.as_str()
            );
        }
    }
}

/// Initialize diagnostics with an explicit minimum level (`None` disables).
pub fn init_with_level(level: Option<emit::Level>) {
    INIT.call_once(|| {
        let Some(level) = level else {
            return;
        };
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the whole process
        std::mem::forget(rt);
    });
}

/// Log connection-level operations (chroot changes, sessions opened/closed).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed steps (each node visited by a recursive walk, tolerated races).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log conditions the caller should know about but that are not failures of
/// the current call, e.g. a subtree left ACL-locked by an aborted delete.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
