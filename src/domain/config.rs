//! Configuration errors.
//!
//! Everything that can go wrong while setting up dispatchers ends up here.
//! The reporting context turns these into ERROR reports of its own.

use crate::domain::mode::{UnknownMode, UnknownReasonFormat};
use crate::domain::reason::{Reason, ReasonError};
use std::fmt;
use std::path::PathBuf;

/// Error returned when a dispatcher or text domain cannot be configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The accept expression does not parse
    Reasons(ReasonError),
    /// Unknown mode name
    UnknownMode(UnknownMode),
    /// Unknown reason format name
    UnknownReasonFormat(UnknownReasonFormat),
    /// The charset label is not known to the encoder
    UnknownCharset(String),
    /// No plugin constructor was registered under this kind name
    UnknownSinkKind(String),
    /// A reason lookup table lacks an entry
    MissingLevel {
        /// The reason without a mapping
        reason: Reason,
    },
    /// A log file could not be opened
    Open {
        /// The file that was being opened
        path: PathBuf,
        /// OS error text
        error: String,
    },
    /// Only one dispatcher may write to the terminal
    SecondTerminal {
        /// Name of the dispatcher already writing there
        existing: String,
    },
    /// A plugin constructor refused its options
    Plugin {
        /// Kind name of the plugin
        kind: String,
        /// Error text reported by the constructor
        error: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Reasons(e) => write!(f, "{}", e),
            ConfigError::UnknownMode(e) => write!(f, "{}", e),
            ConfigError::UnknownReasonFormat(e) => write!(f, "{}", e),
            ConfigError::UnknownCharset(label) => write!(f, "unknown charset '{}'", label),
            ConfigError::UnknownSinkKind(kind) => {
                write!(f, "no dispatcher kind '{}' registered", kind)
            }
            ConfigError::MissingLevel { reason } => {
                write!(f, "level table does not map reason {}", reason)
            }
            ConfigError::Open { path, error } => {
                write!(f, "cannot write log into {}: {}", path.display(), error)
            }
            ConfigError::SecondTerminal { existing } => {
                write!(f, "dispatcher '{}' already writes to the terminal", existing)
            }
            ConfigError::Plugin { kind, error } => {
                write!(f, "dispatcher kind '{}' failed to start: {}", kind, error)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Reasons(e) => Some(e),
            ConfigError::UnknownMode(e) => Some(e),
            ConfigError::UnknownReasonFormat(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ReasonError> for ConfigError {
    fn from(e: ReasonError) -> Self {
        ConfigError::Reasons(e)
    }
}

impl From<UnknownMode> for ConfigError {
    fn from(e: UnknownMode) -> Self {
        ConfigError::UnknownMode(e)
    }
}

impl From<UnknownReasonFormat> for ConfigError {
    fn from(e: UnknownReasonFormat) -> Self {
        ConfigError::UnknownReasonFormat(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reason::expand_reasons;

    #[test]
    fn test_display_wraps_reason_errors() {
        let err: ConfigError = expand_reasons("LOUD").unwrap_err().into();
        assert_eq!(err.to_string(), "unknown reason LOUD in 'LOUD'");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_display_missing_level() {
        let err = ConfigError::MissingLevel {
            reason: Reason::Alert,
        };
        assert_eq!(err.to_string(), "level table does not map reason ALERT");
    }
}
