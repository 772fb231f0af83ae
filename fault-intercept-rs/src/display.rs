//! # Presentation Strategies
//!
//! Renders the final error to the caller. The strategy is chosen once
//! at configuration time; the handler hands it a writer appropriate to
//! the execution context (stderr for interactive processes, the
//! response transport for request-driven ones).

use std::io::{self, Write};

use crate::context::ExecutionContext;
use crate::report::{FaultEvent, FormattedReport};
use crate::severity::SeverityClass;

/// Everything a strategy may draw on while rendering
pub struct RenderRequest<'a> {
    /// The fault being reported
    pub fault: &'a FaultEvent,
    /// The execution context it occurred in
    pub context: &'a ExecutionContext,
    /// Severity tier the fault was classified into
    pub class: SeverityClass,
    /// Label the fault is reported under
    pub label: &'a str,
    /// Formatted renderings of the report
    pub report: &'a FormattedReport,
    /// Sink-failure descriptions accumulated during delivery
    pub sink_failures: &'a [String],
}

/// A pluggable rendering surface
///
/// Swapping strategies must not change any other component's behavior;
/// the handler treats the strategy as a pure sink for the final report.
pub trait DisplayStrategy: Send {
    /// Renders the fault to the given writer.
    fn render(&self, request: &RenderRequest<'_>, out: &mut dyn Write) -> io::Result<()>;
}

/// Plain-text response carrying the full diagnostic block
///
/// Accumulated sink failures are appended with an operator-visible
/// prefix. Never expose this strategy to untrusted callers.
pub struct VerboseDisplay;

impl DisplayStrategy for VerboseDisplay {
    fn render(&self, request: &RenderRequest<'_>, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "HTTP/1.1 500 Internal Server Error")?;
        writeln!(out, "Content-Type: text/plain; charset=UTF-8")?;
        writeln!(out)?;
        out.write_all(request.report.display_text.as_bytes())?;
        for failure in request.sink_failures {
            writeln!(out, "sink failure: {}", failure)?;
        }
        Ok(())
    }
}

/// Fixed, non-diagnostic response for production exposure
///
/// Emits the same status and body for every fault, leaking nothing
/// about the fault itself.
pub struct ProductionDisplay {
    content_type: String,
    body: String,
}

impl ProductionDisplay {
    /// Creates the strategy with its default content type and body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the content-type header value.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Overrides the fixed response body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

impl Default for ProductionDisplay {
    fn default() -> Self {
        Self {
            content_type: "text/html; charset=UTF-8".to_string(),
            body: "Internal server error".to_string(),
        }
    }
}

impl DisplayStrategy for ProductionDisplay {
    fn render(&self, _request: &RenderRequest<'_>, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "HTTP/1.1 500 Internal Server Error")?;
        writeln!(out, "Content-Type: {}", self.content_type)?;
        writeln!(out)?;
        out.write_all(self.body.as_bytes())?;
        Ok(())
    }
}

/// Compact single-line output for terminal processes
pub struct CliDisplay;

impl DisplayStrategy for CliDisplay {
    fn render(&self, request: &RenderRequest<'_>, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", request.report.log_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{fault_label, FaultEvent, FormattedReport};
    use crate::severity::{classify, E_ERROR};

    fn render_to_string(
        strategy: &dyn DisplayStrategy,
        fault: &FaultEvent,
        sink_failures: &[String],
    ) -> String {
        let context = ExecutionContext::Interactive;
        let label = fault_label(fault);
        let (_, class) = classify(fault.code);
        let report = FormattedReport::build(fault, &context, &label, true);
        let request = RenderRequest {
            fault,
            context: &context,
            class,
            label: &label,
            report: &report,
            sink_failures,
        };

        let mut out = Vec::new();
        strategy.render(&request, &mut out).expect("render");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn test_production_body_is_fixed_and_non_diagnostic() {
        let fault = FaultEvent::new(E_ERROR, "secret internal state", "service.rs", 42);
        let rendered = render_to_string(&ProductionDisplay::new(), &fault, &[]);

        assert!(rendered.starts_with("HTTP/1.1 500 Internal Server Error\n"));
        assert!(rendered.ends_with("Internal server error"));
        assert!(!rendered.contains("secret internal state"));
        assert!(!rendered.contains("service.rs"));
        assert!(!rendered.contains("42"));
    }

    #[test]
    fn test_production_body_is_configurable() {
        let strategy = ProductionDisplay::new()
            .content_type("application/json")
            .body(r#"{"error":"internal"}"#);
        let fault = FaultEvent::new(E_ERROR, "boom", "a.rs", 1);
        let rendered = render_to_string(&strategy, &fault, &[]);

        assert!(rendered.contains("Content-Type: application/json\n"));
        assert!(rendered.ends_with(r#"{"error":"internal"}"#));
    }

    #[test]
    fn test_verbose_includes_diagnostics_and_sink_failures() {
        let fault = FaultEvent::new(E_ERROR, "division by zero", "a.php", 10);
        let failures = vec!["sink #0: I/O error on /var/log/app.log: denied".to_string()];
        let rendered = render_to_string(&VerboseDisplay, &fault, &failures);

        assert!(rendered.contains("E_ERROR\n"));
        assert!(rendered.contains("File: a.php:10\n"));
        assert!(rendered.contains("division by zero\n"));
        assert!(rendered.contains("sink failure: sink #0: I/O error on /var/log/app.log: denied\n"));
    }

    #[test]
    fn test_cli_renders_one_compact_line() {
        let fault = FaultEvent::new(E_ERROR, "boom", "a.rs", 7);
        let rendered = render_to_string(&CliDisplay, &fault, &[]);
        assert_eq!(rendered.lines().count(), 1);
        assert!(rendered.starts_with("E_ERROR: boom in a.rs:7 via CLI"));
    }
}
