//! # Severity Classification
//!
//! This module maps raw runtime fault codes to human-readable labels
//! and to the log severity tier the report is delivered at.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Fatal runtime error.
pub const E_ERROR: i32 = 1;
/// Non-fatal runtime warning.
pub const E_WARNING: i32 = 2;
/// Parse error raised while reading source.
pub const E_PARSE: i32 = 4;
/// Runtime notice, usually a questionable but legal construct.
pub const E_NOTICE: i32 = 8;
/// Fatal error during runtime startup.
pub const E_CORE_ERROR: i32 = 16;
/// Warning during runtime startup.
pub const E_CORE_WARNING: i32 = 32;
/// Fatal error raised while compiling a unit.
pub const E_COMPILE_ERROR: i32 = 64;
/// Warning raised while compiling a unit.
pub const E_COMPILE_WARNING: i32 = 128;
/// Fatal error triggered by user code.
pub const E_USER_ERROR: i32 = 256;
/// Warning triggered by user code.
pub const E_USER_WARNING: i32 = 512;
/// Notice triggered by user code.
pub const E_USER_NOTICE: i32 = 1024;
/// Strict-standards diagnostic.
pub const E_STRICT: i32 = 2048;
/// Recoverable fatal error, catchable by a handler.
pub const E_RECOVERABLE_ERROR: i32 = 4096;
/// Deprecation diagnostic raised by the runtime.
pub const E_DEPRECATED: i32 = 8192;
/// Deprecation diagnostic triggered by user code.
pub const E_USER_DEPRECATED: i32 = 16384;

// Codes that abort execution; only these are reported from the
// end-of-process path.
static FATAL_CODES: Lazy<HashSet<i32>> = Lazy::new(|| {
    HashSet::from([E_ERROR, E_PARSE, E_CORE_ERROR, E_COMPILE_ERROR, E_USER_ERROR])
});

/// The severity tier a fault is logged at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityClass {
    /// Errors that abort the current operation
    Error,
    /// Recoverable warnings
    Warning,
    /// Advisory notices
    Notice,
    /// Strict-standards and deprecation diagnostics
    Debug,
    /// Unrecognized codes; reported at the highest tier, never dropped
    Critical,
}

impl fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityClass::Error => write!(f, "ERROR"),
            SeverityClass::Warning => write!(f, "WARNING"),
            SeverityClass::Notice => write!(f, "NOTICE"),
            SeverityClass::Debug => write!(f, "DEBUG"),
            SeverityClass::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Maps a raw fault code to its label and severity tier.
///
/// Total over all integer inputs: a code outside the documented table
/// yields `("E_UNKNOWN", SeverityClass::Critical)` so that nothing is
/// ever silently dropped.
pub fn classify(code: i32) -> (&'static str, SeverityClass) {
    match code {
        E_ERROR => ("E_ERROR", SeverityClass::Error),
        E_WARNING => ("E_WARNING", SeverityClass::Warning),
        E_PARSE => ("E_PARSE", SeverityClass::Error),
        E_NOTICE => ("E_NOTICE", SeverityClass::Notice),
        E_CORE_ERROR => ("E_CORE_ERROR", SeverityClass::Error),
        E_CORE_WARNING => ("E_CORE_WARNING", SeverityClass::Warning),
        E_COMPILE_ERROR => ("E_COMPILE_ERROR", SeverityClass::Error),
        E_COMPILE_WARNING => ("E_COMPILE_WARNING", SeverityClass::Warning),
        E_USER_ERROR => ("E_USER_ERROR", SeverityClass::Error),
        E_USER_WARNING => ("E_USER_WARNING", SeverityClass::Warning),
        E_USER_NOTICE => ("E_USER_NOTICE", SeverityClass::Notice),
        E_STRICT => ("E_STRICT", SeverityClass::Debug),
        E_RECOVERABLE_ERROR => ("E_RECOVERABLE_ERROR", SeverityClass::Error),
        E_DEPRECATED => ("E_DEPRECATED", SeverityClass::Debug),
        E_USER_DEPRECATED => ("E_USER_DEPRECATED", SeverityClass::Debug),
        _ => ("E_UNKNOWN", SeverityClass::Critical),
    }
}

/// Returns true if the code belongs to the fatal set observed by the
/// end-of-process path.
pub fn is_fatal(code: i32) -> bool {
    FATAL_CODES.contains(&code)
}
