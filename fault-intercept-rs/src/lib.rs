//! # Fault Interception Layer
//!
//! A process-wide handler for recoverable faults, uncaught failures,
//! and fatal memory-exhaustion-class conditions. Every fault is
//! normalized into a single structured report, classified into a log
//! severity tier, fanned out to the configured sinks, and rendered to
//! the caller through a pluggable presentation strategy, after which
//! the process terminates deterministically.
//!
//! ## Features
//!
//! - Total severity classification with a fail-safe tier for unknown codes
//! - Execution-context resolution (interactive process vs. request handler)
//! - One-record-per-line log formatting with collapsed traces
//! - Resilient sink fan-out: a failing sink never blocks the rest
//! - File sinks with permission and group ownership policy
//! - Presentation strategies for diagnostics, production, and terminals
//! - Reserved memory headroom so fatal handling survives exhaustion
//!
//! The pipeline is single-threaded and synchronous by design: a fault
//! handler must not depend on machinery the fault may have broken.

pub mod context;
pub mod display;
pub mod handler;
pub mod report;
pub mod severity;
pub mod sink;

// Re-export commonly used types
pub use context::{ExecutionContext, RequestDescriptor};
pub use display::{CliDisplay, DisplayStrategy, ProductionDisplay, RenderRequest, VerboseDisplay};
pub use handler::{
    is_silenced, silence, terminate, HandlerConfig, HandlerCore, Outcome, SilenceGuard,
};
pub use report::{fault_label, FaultEvent, FormattedReport, TRACE_DELIMITER};
pub use severity::{classify, is_fatal, SeverityClass};
pub use sink::{FileSink, LeveledSink, Sink, SinkError, TracingSink};
