//! Engine error type + rate-limited diagnostics.
//!
//! Everything the engine can fail at is expressed as a `RenderError` and recovered
//! at the component boundary; nothing in the render path panics on a bad shader,
//! a missing file, or a GPU allocation failure.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Which shader stage a compile diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug)]
pub enum RenderError {
    /// One shader stage failed to compile; `log` is the driver's diagnostic text.
    ShaderCompile { stage: ShaderStage, log: String },

    /// Both stages compiled but the program failed to link.
    ProgramLink { log: String },

    /// A GPU object could not be created (texture, buffer, vertex array, ...).
    Gpu { what: &'static str, detail: String },

    /// An image file could not be decoded or prepared.
    Image { path: PathBuf, detail: String },

    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    InvalidConfig { path: PathBuf, msg: String },

    /// A transition tag not present in the fixed registry. Config validation
    /// should catch this upstream, but the registry still reports it.
    UnknownTransition { name: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ShaderCompile { stage, log } => {
                write!(f, "{stage} shader failed to compile: {}", log.trim_end())
            }
            RenderError::ProgramLink { log } => {
                write!(f, "shader program failed to link: {}", log.trim_end())
            }
            RenderError::Gpu { what, detail } => {
                write!(f, "failed to create {what}: {detail}")
            }
            RenderError::Image { path, detail } => {
                write!(f, "failed to load image {}: {detail}", path.display())
            }
            RenderError::Io { path, source } => {
                write!(f, "I/O error at {}: {source}", path.display())
            }
            RenderError::Json { path, source } => {
                write!(f, "invalid JSON in {}: {source}", path.display())
            }
            RenderError::InvalidConfig { path, msg } => {
                write!(f, "invalid config {}: {msg}", path.display())
            }
            RenderError::UnknownTransition { name } => {
                write!(f, "unknown transition '{name}'")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io { source, .. } => Some(source),
            RenderError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Throttle for repeated diagnostics: `allow` answers true at most once per interval.
///
/// Used for the persistent-failure block so a broken shader does not flood the log
/// at frame rate.
#[derive(Debug)]
pub struct DiagnosticGate {
    last: Option<Instant>,
    min_interval: Duration,
}

impl DiagnosticGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { last: None, min_interval }
    }

    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_the_stage() {
        let e = RenderError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "0:12: 'foo' : undeclared identifier\n".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("fragment shader failed to compile"), "{msg}");
        assert!(msg.contains("undeclared identifier"));
        assert!(!msg.ends_with('\n'));
    }

    #[test]
    fn io_error_exposes_source() {
        use std::error::Error;
        let e = RenderError::Io {
            path: PathBuf::from("/tmp/x"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.source().is_some());
        let e = RenderError::UnknownTransition { name: "swirl".into() };
        assert!(e.source().is_none());
    }

    #[test]
    fn gate_allows_once_per_interval() {
        let t0 = Instant::now();
        let mut gate = DiagnosticGate::new(Duration::from_secs(10));
        assert!(gate.allow(t0));
        assert!(!gate.allow(t0 + Duration::from_secs(5)));
        assert!(!gate.allow(t0 + Duration::from_millis(9_999)));
        assert!(gate.allow(t0 + Duration::from_secs(10)));
        assert!(!gate.allow(t0 + Duration::from_secs(11)));
    }
}
