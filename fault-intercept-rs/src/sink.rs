//! # Log Sink Routing
//!
//! Delivers a formatted report to every configured sink in registration
//! order. Sinks fail independently: a failure is captured as a
//! description and delivery continues, because the handler is the last
//! line of defense and must not die on a full disk or a bad permission
//! bit.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::severity::SeverityClass;

/// Failure raised by a structured sink while recording one report
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Sink location
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
    /// A configured file mode could not be applied
    #[error("cannot set mode {mode:o} on {path}: {source}")]
    Permissions {
        /// Sink location
        path: String,
        /// Desired permission bits
        mode: u32,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
    /// A configured group could not be applied
    #[error("cannot set group '{group}' on {path}: {reason}")]
    Ownership {
        /// Sink location
        path: String,
        /// Desired group name
        group: String,
        /// Description of the failure
        reason: String,
    },
}

/// A structured sink exposing one method per severity tier
pub trait LeveledSink: Send {
    /// Records a message at the error tier.
    fn error(&mut self, msg: &str) -> Result<(), SinkError>;
    /// Records a message at the warning tier.
    fn warning(&mut self, msg: &str) -> Result<(), SinkError>;
    /// Records a message at the notice tier.
    fn notice(&mut self, msg: &str) -> Result<(), SinkError>;
    /// Records a message at the debug tier.
    fn debug(&mut self, msg: &str) -> Result<(), SinkError>;
    /// Records a message at the critical tier.
    fn critical(&mut self, msg: &str) -> Result<(), SinkError>;

    /// Drains failure descriptions the sink accumulated on the side,
    /// such as a file-policy correction that did not stick.
    fn drain_failures(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// A registered delivery target
pub enum Sink {
    /// Structured sink dispatched by severity tier
    Leveled(Box<dyn LeveledSink>),
    /// Plain callback receiving the fully formatted line
    Callback(Box<dyn FnMut(&str) + Send>),
}

impl Sink {
    /// Wraps a structured sink.
    pub fn leveled<S: LeveledSink + 'static>(sink: S) -> Self {
        Sink::Leveled(Box::new(sink))
    }

    /// Wraps a plain callback.
    pub fn callback<F: FnMut(&str) + Send + 'static>(callback: F) -> Self {
        Sink::Callback(Box::new(callback))
    }
}

/// Delivers one formatted line to every sink in registration order and
/// returns the failure descriptions collected along the way.
pub fn route(class: SeverityClass, line: &str, sinks: &mut [Sink]) -> Vec<String> {
    let mut failures = Vec::new();
    for (idx, sink) in sinks.iter_mut().enumerate() {
        match sink {
            Sink::Callback(callback) => callback(line),
            Sink::Leveled(sink) => {
                if let Err(err) = deliver(sink.as_mut(), class, line) {
                    failures.push(format!("sink #{}: {}", idx, err));
                }
                for description in sink.drain_failures() {
                    failures.push(format!("sink #{}: {}", idx, description));
                }
            }
        }
    }
    failures
}

// Severity class resolves the tier method directly; raw codes were
// already folded into the class by the classifier.
fn deliver(sink: &mut dyn LeveledSink, class: SeverityClass, line: &str) -> Result<(), SinkError> {
    match class {
        SeverityClass::Error => sink.error(line),
        SeverityClass::Warning => sink.warning(line),
        SeverityClass::Notice => sink.notice(line),
        SeverityClass::Debug => sink.debug(line),
        SeverityClass::Critical => sink.critical(line),
    }
}

/// Append-only timestamped file sink with optional ownership policy
///
/// The sink owns its permission and group policy plus the list of
/// policy corrections that failed; a failed correction never blocks
/// delivery and surfaces later through [`LeveledSink::drain_failures`].
pub struct FileSink {
    path: PathBuf,
    mode: Option<u32>,
    group: Option<String>,
    failures: Vec<String>,
}

impl FileSink {
    /// Creates a sink appending to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: None,
            group: None,
            failures: Vec::new(),
        }
    }

    /// Desired permission bits, corrected after each write.
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Desired owning group, corrected after each write.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// The file this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Policy corrections that failed so far.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    fn append(&mut self, msg: &str) -> Result<(), SinkError> {
        let path = self.path.display().to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{}] {}", timestamp, msg).map_err(|source| SinkError::Io { path, source })?;

        self.enforce_policy();
        Ok(())
    }

    #[cfg(unix)]
    fn enforce_policy(&mut self) {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        if self.mode.is_none() && self.group.is_none() {
            return;
        }

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) => {
                self.failures
                    .push(format!("cannot stat {}: {}", self.path.display(), err));
                return;
            }
        };

        if let Some(mode) = self.mode {
            if metadata.permissions().mode() & 0o7777 != mode {
                let permissions = std::fs::Permissions::from_mode(mode);
                if let Err(source) = std::fs::set_permissions(&self.path, permissions) {
                    self.failures.push(
                        SinkError::Permissions {
                            path: self.path.display().to_string(),
                            mode,
                            source,
                        }
                        .to_string(),
                    );
                }
            }
        }

        if let Some(group) = self.group.clone() {
            self.enforce_group(&group, metadata.gid());
        }
    }

    #[cfg(unix)]
    fn enforce_group(&mut self, group: &str, current_gid: u32) {
        let ownership_failure = |reason: String| {
            SinkError::Ownership {
                path: self.path.display().to_string(),
                group: group.to_string(),
                reason,
            }
            .to_string()
        };

        match nix::unistd::Group::from_name(group) {
            Ok(Some(resolved)) => {
                if resolved.gid.as_raw() != current_gid {
                    if let Err(err) = nix::unistd::chown(&self.path, None, Some(resolved.gid)) {
                        self.failures.push(ownership_failure(err.to_string()));
                    }
                }
            }
            Ok(None) => {
                self.failures
                    .push(ownership_failure("unknown group".to_string()));
            }
            Err(err) => {
                self.failures.push(ownership_failure(err.to_string()));
            }
        }
    }

    #[cfg(not(unix))]
    fn enforce_policy(&mut self) {}
}

impl LeveledSink for FileSink {
    fn error(&mut self, msg: &str) -> Result<(), SinkError> {
        self.append(msg)
    }

    fn warning(&mut self, msg: &str) -> Result<(), SinkError> {
        self.append(msg)
    }

    fn notice(&mut self, msg: &str) -> Result<(), SinkError> {
        self.append(msg)
    }

    fn debug(&mut self, msg: &str) -> Result<(), SinkError> {
        self.append(msg)
    }

    fn critical(&mut self, msg: &str) -> Result<(), SinkError> {
        self.append(msg)
    }

    fn drain_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.failures)
    }
}

/// Sink forwarding each tier to the matching `tracing` event
///
/// Bridges the report stream into whatever subscriber the host process
/// has installed. The critical tier has no `tracing` level of its own
/// and is emitted as an error event tagged with its severity.
pub struct TracingSink;

impl LeveledSink for TracingSink {
    fn error(&mut self, msg: &str) -> Result<(), SinkError> {
        tracing::error!(target: "fault_intercept", "{msg}");
        Ok(())
    }

    fn warning(&mut self, msg: &str) -> Result<(), SinkError> {
        tracing::warn!(target: "fault_intercept", "{msg}");
        Ok(())
    }

    fn notice(&mut self, msg: &str) -> Result<(), SinkError> {
        tracing::info!(target: "fault_intercept", "{msg}");
        Ok(())
    }

    fn debug(&mut self, msg: &str) -> Result<(), SinkError> {
        tracing::debug!(target: "fault_intercept", "{msg}");
        Ok(())
    }

    fn critical(&mut self, msg: &str) -> Result<(), SinkError> {
        tracing::error!(target: "fault_intercept", severity = "critical", "{msg}");
        Ok(())
    }
}
