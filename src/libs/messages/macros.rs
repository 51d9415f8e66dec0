//! Output macros for user-facing messages.
//!
//! In debug mode (`TIMEKEEPER_DEBUG` or `RUST_LOG` set) every macro goes to
//! `tracing` so that messages interleave with the service diagnostics.
//! Otherwise they print to stdout, or stderr for errors, and `msg_debug!`
//! prints nothing.
//!
//! ```rust
//! use timekeeper::{msg_info, msg_debug};
//! use timekeeper::libs::messages::Message;
//!
//! msg_info!(Message::TasksNotFound);
//! msg_debug!("Resolved database path");
//! ```

use std::sync::OnceLock;

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Whether messages are routed to `tracing`. Checked once per process.
#[doc(hidden)]
pub fn is_debug_mode() -> bool {
    *DEBUG_MODE.get_or_init(|| std::env::var("TIMEKEEPER_DEBUG").is_ok() || std::env::var("RUST_LOG").is_ok())
}

/// Sends one formatted line to `tracing` at `$level` in debug mode, or to
/// the `$print` macro otherwise.
#[doc(hidden)]
#[macro_export]
macro_rules! __msg_emit {
    ($level:ident, $print:ident, $($arg:tt)+) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::$level!($($arg)+);
        } else {
            $print!($($arg)+);
        }
    };
}

/// Plain line; with `true` it is padded by blank lines, for headers.
#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        $crate::__msg_emit!(info, println, "{}", $msg)
    };
    ($msg:expr, true) => {
        $crate::__msg_emit!(info, println, "\n{}\n", $msg)
    };
}

#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        $crate::__msg_emit!(info, println, "✅ {}", $msg)
    };
}

#[macro_export]
macro_rules! msg_error {
    ($msg:expr) => {
        $crate::__msg_emit!(error, eprintln, "❌ {}", $msg)
    };
}

#[macro_export]
macro_rules! msg_warning {
    ($msg:expr) => {
        $crate::__msg_emit!(warn, println, "⚠️ {}", $msg)
    };
}

#[macro_export]
macro_rules! msg_info {
    ($msg:expr) => {
        $crate::__msg_emit!(info, println, "ℹ️ {}", $msg)
    };
    ($msg:expr, true) => {
        $crate::__msg_emit!(info, println, "\nℹ️ {}\n", $msg)
    };
}

#[macro_export]
macro_rules! msg_debug {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::debug!("🔍 {}", $msg);
        }
    };
}

/// Builds an `anyhow::Error` from a message, for returning from commands.
#[macro_export]
macro_rules! msg_error_anyhow {
    ($msg:expr) => {
        anyhow::anyhow!("❌ {}", $msg)
    };
}
