//! # Handler Core
//!
//! Orchestrates the interception pipeline: suppression gate,
//! classification, context resolution, formatting, sink fan-out, and
//! presentation, followed by deterministic process termination. Runs
//! synchronously inside the reporting callback, with no machinery that
//! could itself be broken by the fault being handled.

use std::cell::Cell;
use std::io::{self, Write};
use std::panic;
use std::process;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::display::{DisplayStrategy, ProductionDisplay, RenderRequest};
use crate::report::{fault_label, FaultEvent, FormattedReport};
use crate::severity::{classify, is_fatal};
use crate::sink::{route, Sink};

// Headroom released at the start of fatal handling so the pipeline can
// allocate even when the fault is a memory-exhaustion condition.
const RESERVED_BYTES: usize = 50 * 1024;

thread_local! {
    static SILENCE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// RAII guard silencing fault reporting on the current thread
///
/// While at least one guard is alive, the recoverable-fault path
/// returns without reporting or terminating.
pub struct SilenceGuard {
    _priv: (),
}

impl Drop for SilenceGuard {
    fn drop(&mut self) {
        SILENCE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Silences fault reporting until the returned guard is dropped.
pub fn silence() -> SilenceGuard {
    SILENCE_DEPTH.with(|depth| depth.set(depth.get() + 1));
    SilenceGuard { _priv: () }
}

/// Returns true while a [`SilenceGuard`] is alive on this thread.
pub fn is_silenced() -> bool {
    SILENCE_DEPTH.with(|depth| depth.get() > 0)
}

/// Process-wide handler configuration, fixed before the first fault
pub struct HandlerConfig {
    /// Fault codes that are never reported
    pub ignore_codes: Vec<i32>,
    /// Whether traces are included in log lines and display text
    pub log_trace: bool,
    /// The presentation strategy rendering the final error
    pub display: Box<dyn DisplayStrategy>,
    /// Delivery targets, in registration order
    pub sinks: Vec<Sink>,
}

impl Default for HandlerConfig {
    /// Defaults to the non-diagnostic production strategy; leaking
    /// diagnostics requires an explicit opt-in.
    fn default() -> Self {
        Self {
            ignore_codes: Vec::new(),
            log_trace: true,
            display: Box::new(ProductionDisplay::new()),
            sinks: Vec::new(),
        }
    }
}

impl HandlerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ignore-list of suppressed codes.
    pub fn ignore_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.ignore_codes = codes.into_iter().collect();
        self
    }

    /// Adds one code to the ignore-list.
    pub fn ignore_code(mut self, code: i32) -> Self {
        self.ignore_codes.push(code);
        self
    }

    /// Sets whether traces are included in reports.
    pub fn log_trace(mut self, log_trace: bool) -> Self {
        self.log_trace = log_trace;
        self
    }

    /// Sets the presentation strategy.
    pub fn display<D: DisplayStrategy + 'static>(mut self, display: D) -> Self {
        self.display = Box::new(display);
        self
    }

    /// Appends a delivery target.
    pub fn add_sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }
}

/// The decision reached for one fault episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fault was silenced or ignore-listed; control returns to the caller
    Suppressed,
    /// Shutdown observed no fatal fault; nothing was reported
    NothingToReport,
    /// Fault was fully reported; the process should now terminate
    Handled {
        /// Exit status for interactive contexts (1), or 0 when the
        /// response status line already signals the failure
        exit_code: i32,
    },
}

/// Process-wide fault handler
///
/// Constructed once at startup and either driven directly through the
/// `on_*` entry points or installed as the process panic hook via
/// [`HandlerCore::install`]. Construction has no global side effects,
/// so tests can exercise the pipeline without touching process hooks.
pub struct HandlerCore {
    config: HandlerConfig,
    reserved: Option<Vec<u8>>,
    last_fault: Option<FaultEvent>,
    sink_failures: Vec<String>,
}

impl HandlerCore {
    /// Creates an armed handler, allocating the reserved memory block.
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            reserved: Some(vec![0u8; RESERVED_BYTES]),
            last_fault: None,
            sink_failures: Vec::new(),
        }
    }

    /// Records a fault as the most recent one the runtime observed,
    /// without handling it. The shutdown path consults this record.
    pub fn record_fault(&mut self, fault: FaultEvent) {
        self.last_fault = Some(fault);
    }

    /// The most recently recorded fault, if any.
    pub fn last_fault(&self) -> Option<&FaultEvent> {
        self.last_fault.as_ref()
    }

    /// True until the first fatal-handling attempt releases the block.
    pub fn has_reserved_memory(&self) -> bool {
        self.reserved.is_some()
    }

    /// Recoverable-fault entry point.
    ///
    /// Returns [`Outcome::Suppressed`] without side effects when a
    /// [`SilenceGuard`] is alive or the code is ignore-listed; the
    /// caller must terminate for any [`Outcome::Handled`].
    pub fn on_fault(&mut self, code: i32, message: &str, file: &str, line: u32) -> Outcome {
        if is_silenced() {
            debug!(code, "fault reporting silenced at call site");
            return Outcome::Suppressed;
        }

        let mut fault = FaultEvent::new(code, message, file, line);
        if self.config.log_trace {
            fault = fault.with_trace(std::backtrace::Backtrace::force_capture().to_string());
        }
        self.record_fault(fault.clone());
        self.dispatch_ambient(&fault)
    }

    /// Uncaught-failure entry point.
    pub fn on_uncaught(&mut self, fault: FaultEvent) -> Outcome {
        let fault = fault.uncaught();
        self.record_fault(fault.clone());
        self.dispatch_ambient(&fault)
    }

    /// End-of-process entry point.
    ///
    /// Reports only when the last recorded fault belongs to the fatal
    /// set; a normal shutdown produces nothing.
    pub fn on_shutdown(&mut self) -> Outcome {
        let context = ExecutionContext::resolve();
        if context.is_interactive() {
            let mut err = io::stderr();
            self.on_shutdown_with(&context, &mut err)
        } else {
            let mut out = io::stdout();
            self.on_shutdown_with(&context, &mut out)
        }
    }

    /// Shutdown path with an explicit context and writer.
    pub fn on_shutdown_with(
        &mut self,
        context: &ExecutionContext,
        out: &mut dyn Write,
    ) -> Outcome {
        // Release the headroom before anything that may allocate.
        self.reserved = None;

        let fatal = match &self.last_fault {
            Some(fault) if is_fatal(fault.code) => fault.clone(),
            _ => return Outcome::NothingToReport,
        };

        let fault = if fatal.trace.is_none() && self.config.log_trace {
            fatal.with_trace(std::backtrace::Backtrace::force_capture().to_string())
        } else {
            fatal
        };
        self.dispatch(&fault, context, out)
    }

    fn dispatch_ambient(&mut self, fault: &FaultEvent) -> Outcome {
        let context = ExecutionContext::resolve();
        if context.is_interactive() {
            let mut err = io::stderr();
            self.dispatch(fault, &context, &mut err)
        } else {
            let mut out = io::stdout();
            self.dispatch(fault, &context, &mut out)
        }
    }

    /// Runs the full pipeline for one fault with an explicit context
    /// and writer: ignore gate, classification, formatting, sink
    /// fan-out, presentation.
    ///
    /// Sink failures and render failures never abort later stages.
    pub fn dispatch(
        &mut self,
        fault: &FaultEvent,
        context: &ExecutionContext,
        out: &mut dyn Write,
    ) -> Outcome {
        if self.config.ignore_codes.contains(&fault.code) {
            debug!(code = fault.code, "fault code suppressed by ignore list");
            return Outcome::Suppressed;
        }

        let (_, class) = classify(fault.code);
        let label = fault_label(fault);
        let report = FormattedReport::build(fault, context, &label, self.config.log_trace);

        let mut failures = route(class, &report.log_line, &mut self.config.sinks);
        self.sink_failures.append(&mut failures);

        let request = RenderRequest {
            fault,
            context,
            class,
            label: &label,
            report: &report,
            sink_failures: &self.sink_failures,
        };
        if let Err(err) = self.config.display.render(&request, out) {
            warn!(error = %err, "presentation render failed");
        }

        let exit_code = if context.is_interactive() { 1 } else { 0 };
        Outcome::Handled { exit_code }
    }

    /// Installs the handler as the process panic hook.
    ///
    /// The previous hook still runs first, then the panic is reported
    /// as an uncaught failure and the process terminates. The returned
    /// handle drives the explicit `on_fault`/`on_shutdown` entry points
    /// for host runtimes that deliver those callbacks.
    pub fn install(self) -> Arc<Mutex<HandlerCore>> {
        let handler = Arc::new(Mutex::new(self));

        let hook_handler = Arc::clone(&handler);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            previous(info);
            let fault = FaultEvent::from_panic(info);
            let outcome = {
                let mut guard = hook_handler
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.on_uncaught(fault)
            };
            terminate(outcome);
        }));

        debug!("fault handler installed as process panic hook");
        handler
    }
}

/// Terminates the process for a handled outcome; suppressed and
/// nothing-to-report outcomes return control to the caller.
pub fn terminate(outcome: Outcome) {
    if let Outcome::Handled { exit_code } = outcome {
        process::exit(exit_code);
    }
}
