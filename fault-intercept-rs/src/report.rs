//! # Fault Capture and Report Formatting
//!
//! This module defines the immutable [`FaultEvent`] captured when the
//! runtime reports a fault, and builds the single-line log record and
//! the multi-line display block derived from it.

use std::borrow::Cow;
use std::panic::PanicHookInfo;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::severity::classify;

/// Delimiter that replaces newlines inside a trace so the log stays
/// one record per line.
pub const TRACE_DELIMITER: &str = " ||| ";

/// A fault as reported by the runtime, immutable once captured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Raw severity code reported by the runtime
    pub code: i32,
    /// Fault message
    pub message: String,
    /// Source file the fault was raised in
    pub file: String,
    /// Source line the fault was raised at
    pub line: u32,
    /// Captured stack trace, when one was available
    pub trace: Option<String>,
    /// True when the fault came from the uncaught-failure path
    pub is_uncaught: bool,
}

impl FaultEvent {
    /// Captures a recoverable fault reported by the runtime.
    pub fn new(code: i32, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            code,
            message: message.into(),
            file: file.into(),
            line,
            trace: None,
            is_uncaught: false,
        }
    }

    /// Attaches a stack trace to the event.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Marks the event as originating from the uncaught-failure path.
    pub fn uncaught(mut self) -> Self {
        self.is_uncaught = true;
        self
    }

    /// Captures an uncaught failure from a panic hook invocation.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unrecognized panic payload".to_string()
        };

        let (file, line) = info
            .location()
            .map(|loc| (loc.file().to_string(), loc.line()))
            .unwrap_or_else(|| (String::new(), 0));

        Self {
            code: 0,
            message,
            file,
            line,
            trace: Some(std::backtrace::Backtrace::force_capture().to_string()),
            is_uncaught: true,
        }
    }
}

/// Returns the label the fault is reported under.
///
/// Uncaught failures are labelled `EXCEPTION` (with the code appended
/// when it is non-zero); everything else uses the classification table.
pub fn fault_label(fault: &FaultEvent) -> Cow<'static, str> {
    if fault.is_uncaught {
        if fault.code != 0 {
            Cow::Owned(format!("EXCEPTION(code {})", fault.code))
        } else {
            Cow::Borrowed("EXCEPTION")
        }
    } else {
        Cow::Borrowed(classify(fault.code).0)
    }
}

/// The two renderings of one fault report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReport {
    /// Single-line machine-loggable record
    pub log_line: String,
    /// Multi-line human-readable block
    pub display_text: String,
}

impl FormattedReport {
    /// Builds both renderings. Never fails: absent fields render as
    /// empty segments so the line shape stays fixed for log parsing.
    pub fn build(
        fault: &FaultEvent,
        context: &ExecutionContext,
        label: &str,
        include_trace: bool,
    ) -> Self {
        let mut log_line = format!(
            "{}: {} in {}:{} via {}",
            label, fault.message, fault.file, fault.line, context
        );
        if include_trace {
            let collapsed = collapse_trace(fault.trace.as_deref().unwrap_or(""));
            log_line.push_str(TRACE_DELIMITER);
            log_line.push_str("TRACE: ");
            log_line.push_str(&collapsed);
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut display_text = format!(
            "{}\nTime: {}\nUrl: {}\nFile: {}:{}\n{}\n",
            label, timestamp, context, fault.file, fault.line, fault.message
        );
        if include_trace {
            if let Some(trace) = fault.trace.as_deref() {
                display_text.push_str(trace);
                if !trace.ends_with('\n') {
                    display_text.push('\n');
                }
            }
        }

        Self {
            log_line,
            display_text,
        }
    }
}

fn collapse_trace(trace: &str) -> String {
    trace
        .replace("\r\n", TRACE_DELIMITER)
        .replace('\r', TRACE_DELIMITER)
        .replace('\n', TRACE_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionContext, RequestDescriptor};
    use crate::severity::E_WARNING;

    #[test]
    fn test_log_line_shape() {
        let fault = FaultEvent::new(E_WARNING, "division by zero", "a.php", 10);
        let report = FormattedReport::build(&fault, &ExecutionContext::Interactive, "E_WARNING", false);
        assert_eq!(report.log_line, "E_WARNING: division by zero in a.php:10 via CLI");
    }

    #[test]
    fn test_log_line_includes_request_descriptor() {
        let fault = FaultEvent::new(E_WARNING, "oops", "b.php", 3);
        let ctx = ExecutionContext::RequestDriven(RequestDescriptor {
            method: "GET".to_string(),
            secure: false,
            host: "example.com".to_string(),
            port: 80,
            path: "/x".to_string(),
        });
        let report = FormattedReport::build(&fault, &ctx, "E_WARNING", false);
        assert_eq!(
            report.log_line,
            "E_WARNING: oops in b.php:3 via GET http://example.com/x"
        );
    }

    #[test]
    fn test_trace_round_trip() {
        let lines = ["#0 main()", "#1 run()", "#2 {main}"];
        let fault = FaultEvent::new(E_WARNING, "oops", "a.php", 1).with_trace(lines.join("\n"));
        let report = FormattedReport::build(&fault, &ExecutionContext::Interactive, "E_WARNING", true);

        let (_, trace_part) = report
            .log_line
            .split_once("TRACE: ")
            .expect("trace segment present");
        let recovered: Vec<&str> = trace_part.split(TRACE_DELIMITER).collect();
        assert_eq!(recovered, lines);
    }

    #[test]
    fn test_absent_trace_renders_empty_segment() {
        let fault = FaultEvent::new(E_WARNING, "oops", "a.php", 1);
        let report = FormattedReport::build(&fault, &ExecutionContext::Interactive, "E_WARNING", true);
        assert!(report.log_line.ends_with("TRACE: "));
    }

    #[test]
    fn test_crlf_traces_collapse_to_one_line() {
        let fault =
            FaultEvent::new(E_WARNING, "oops", "a.php", 1).with_trace("first\r\nsecond\rthird");
        let report = FormattedReport::build(&fault, &ExecutionContext::Interactive, "E_WARNING", true);
        assert!(!report.log_line.contains('\n'));
        assert!(!report.log_line.contains('\r'));
        assert!(report.log_line.contains("first ||| second ||| third"));
    }

    #[test]
    fn test_uncaught_label() {
        let anonymous = FaultEvent::new(0, "boom", "x.rs", 1).uncaught();
        assert_eq!(fault_label(&anonymous), "EXCEPTION");

        let coded = FaultEvent::new(42, "boom", "x.rs", 1).uncaught();
        assert_eq!(fault_label(&coded), "EXCEPTION(code 42)");
    }

    #[test]
    fn test_recoverable_label_uses_classification() {
        let fault = FaultEvent::new(E_WARNING, "boom", "x.rs", 1);
        assert_eq!(fault_label(&fault), "E_WARNING");
    }

    #[test]
    fn test_display_text_contains_all_fields() {
        let fault = FaultEvent::new(E_WARNING, "division by zero", "a.php", 10);
        let report = FormattedReport::build(&fault, &ExecutionContext::Interactive, "E_WARNING", false);
        assert!(report.display_text.starts_with("E_WARNING\n"));
        assert!(report.display_text.contains("Time: "));
        assert!(report.display_text.contains("Url: CLI\n"));
        assert!(report.display_text.contains("File: a.php:10\n"));
        assert!(report.display_text.contains("division by zero\n"));
    }

    #[test]
    fn test_fault_event_serializes() {
        let fault = FaultEvent::new(E_WARNING, "oops", "a.php", 1);
        let value = serde_json::to_value(&fault).expect("serializable");
        assert_eq!(value["code"], E_WARNING);
        assert_eq!(value["message"], "oops");
    }
}
