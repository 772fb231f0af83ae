//! # Execution Context Resolution
//!
//! Determines whether the process is running interactively (a terminal
//! or batch process) or is serving a network request, and in the latter
//! case reconstructs the originating request line from CGI-style
//! environment variables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The request that was being served when the fault occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// True when the request arrived over a secure transport
    pub secure: bool,
    /// Host name the request was addressed to
    pub host: String,
    /// TCP port the request arrived on
    pub port: u16,
    /// Request path including query string
    pub path: String,
}

impl RequestDescriptor {
    fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    fn default_port(&self) -> u16 {
        if self.secure {
            443
        } else {
            80
        }
    }
}

impl fmt::Display for RequestDescriptor {
    /// Renders `<METHOD> <scheme>://<host>[:<port>]<path>`, eliding the
    /// port when it is the canonical default for the scheme.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}://{}", self.method, self.scheme(), self.host)?;
        if self.port != self.default_port() {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "{}", self.path)
    }
}

/// How the process was executing when a fault was captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionContext {
    /// Headless or terminal-attached process, no request transport
    Interactive,
    /// Serving an inbound request
    RequestDriven(RequestDescriptor),
}

impl ExecutionContext {
    /// Resolves the context from the process environment.
    pub fn resolve() -> Self {
        Self::resolve_from(|key| std::env::var(key).ok())
    }

    /// Resolves the context from an arbitrary variable lookup.
    ///
    /// Absence of `REQUEST_METHOD` means there is no request transport
    /// and the process is interactive. All other signals have defaults,
    /// so resolution cannot fail.
    pub fn resolve_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let method = match lookup("REQUEST_METHOD") {
            Some(method) if !method.is_empty() => method,
            _ => return ExecutionContext::Interactive,
        };

        let secure = lookup("HTTPS")
            .map(|v| !v.is_empty() && !v.eq_ignore_ascii_case("off"))
            .unwrap_or(false);
        let host = lookup("SERVER_NAME").unwrap_or_else(|| "localhost".to_string());
        let port = lookup("SERVER_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(if secure { 443 } else { 80 });
        let path = lookup("REQUEST_URI").unwrap_or_else(|| "/".to_string());

        ExecutionContext::RequestDriven(RequestDescriptor {
            method,
            secure,
            host,
            port,
            path,
        })
    }

    /// Returns true for headless/terminal execution.
    pub fn is_interactive(&self) -> bool {
        matches!(self, ExecutionContext::Interactive)
    }

    /// The request descriptor, when one exists.
    pub fn descriptor(&self) -> Option<&RequestDescriptor> {
        match self {
            ExecutionContext::Interactive => None,
            ExecutionContext::RequestDriven(descriptor) => Some(descriptor),
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Interactive => write!(f, "CLI"),
            ExecutionContext::RequestDriven(descriptor) => fmt::Display::fmt(descriptor, f),
        }
    }
}
