//! Error types shared by the topology, retina and audio layers

use std::fmt;
use std::path::PathBuf;

/// Everything that can go wrong while building a retina.
///
/// The per-frame update path never produces one of these: once a
/// [`Retina`](crate::retina::Retina) exists, sampling and output are infallible.
#[derive(Debug)]
pub enum WavyError {
    /// Malformed or unreadable topology source. `line` is 1-based, 0 when the
    /// whole input is at fault; `source` holds the read error for a missing file
    Format {
        line: usize,
        message: String,
        source: Option<std::io::Error>,
    },
    /// A config file could not be read, or an output could not be written
    Io { path: PathBuf, source: std::io::Error },
    /// Invalid audio, retina, mixer or generator parameters
    Configuration(String),
    /// A field or captor lies outside the declared grid
    CaptorOutOfBounds {
        field: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// The audio backend refused a request at setup time
    Audio(String),
}

impl WavyError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        WavyError::Format {
            line,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn unreadable(path: &std::path::Path, source: std::io::Error) -> Self {
        WavyError::Format {
            line: 0,
            message: format!("cannot read {}: {}", path.display(), source),
            source: Some(source),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        WavyError::Configuration(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WavyError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for WavyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WavyError::Format {
                line: 0, message, ..
            } => write!(f, "Format error: {}", message),
            WavyError::Format { line, message, .. } => {
                write!(f, "Format error on line {}: {}", line, message)
            }
            WavyError::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
            WavyError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            WavyError::CaptorOutOfBounds {
                field,
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "Field {} references ({}, {}) outside the {}x{} grid",
                field, x, y, width, height
            ),
            WavyError::Audio(msg) => write!(f, "Audio error: {}", msg),
        }
    }
}

impl std::error::Error for WavyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WavyError::Io { source, .. } => Some(source),
            WavyError::Format {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

impl From<hound::Error> for WavyError {
    fn from(e: hound::Error) -> Self {
        WavyError::Audio(format!("WAV output failed: {}", e))
    }
}

/// Result type for retina operations
pub type WavyResult<T> = Result<T, WavyError>;
