//! Dispatcher modes and the rendering matrix.
//!
//! A mode decides two things for a dispatcher: which reasons it accepts when
//! no explicit accept expression was given, and how much context (source
//! location, call stack) is appended to a rendered report.

use crate::domain::reason::{Reason, ReasonSet};
use std::fmt;
use std::str::FromStr;

/// Verbosity mode of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Mode {
    /// NOTICE and above
    #[default]
    Normal = 0,
    /// INFO and above
    Verbose = 1,
    /// ASSERT and above, with locations for warnings
    Assert = 2,
    /// Everything, with locations and stacks for errors
    Debug = 3,
}

impl Mode {
    /// Numeric level, 0 (NORMAL) to 3 (DEBUG).
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Mode for a numeric level.
    pub fn from_level(level: u8) -> Option<Mode> {
        match level {
            0 => Some(Mode::Normal),
            1 => Some(Mode::Verbose),
            2 => Some(Mode::Assert),
            3 => Some(Mode::Debug),
            _ => None,
        }
    }

    /// Upper-case name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Verbose => "VERBOSE",
            Mode::Assert => "ASSERT",
            Mode::Debug => "DEBUG",
        }
    }

    /// Reasons accepted in this mode when no accept expression is given.
    ///
    /// ```
    /// use report_dispatch::{Mode, Reason};
    ///
    /// let accepted = Mode::Normal.default_accept();
    /// assert!(accepted.contains(Reason::Notice));
    /// assert!(!accepted.contains(Reason::Info));
    /// ```
    pub fn default_accept(self) -> ReasonSet {
        match self {
            Mode::Normal => ReasonSet::at_least(Reason::Notice),
            Mode::Verbose => ReasonSet::at_least(Reason::Info),
            Mode::Assert => ReasonSet::at_least(Reason::Assert),
            Mode::Debug => ReasonSet::all(),
        }
    }

    /// Whether a report for `reason` gets its source location appended.
    pub fn shows_location(self, reason: Reason) -> bool {
        match reason {
            Reason::Assert | Reason::Alert | Reason::Failure | Reason::Panic => true,
            _ => match self {
                Mode::Assert => reason >= Reason::Warning,
                Mode::Debug => reason >= Reason::Mistake,
                _ => false,
            },
        }
    }

    /// Whether a report for `reason` gets the call stack appended.
    pub fn shows_stack(self, reason: Reason) -> bool {
        if reason == Reason::Panic {
            return true;
        }
        match self {
            Mode::Assert => reason >= Reason::Alert,
            Mode::Debug => reason >= Reason::Error,
            _ => false,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a mode name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown run mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for Mode {
    type Err = UnknownMode;

    /// Accepts the mode names in any case, or the levels `0` to `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if let Ok(level) = name.parse::<u8>() {
            return Mode::from_level(level).ok_or_else(|| UnknownMode(s.to_string()));
        }
        [Mode::Normal, Mode::Verbose, Mode::Assert, Mode::Debug]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// How the reason label is styled in rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ReasonFormat {
    /// `ERROR`
    Uppercase,
    /// `error`
    #[default]
    Lowercase,
    /// `Error`
    Ucfirst,
    /// No label at all
    Ignore,
}

impl ReasonFormat {
    /// Apply the style to an (already translated) label.
    ///
    /// Returns `None` for [`ReasonFormat::Ignore`].
    pub fn apply(self, label: &str) -> Option<String> {
        match self {
            ReasonFormat::Uppercase => Some(label.to_uppercase()),
            ReasonFormat::Lowercase => Some(label.to_lowercase()),
            ReasonFormat::Ucfirst => {
                let lower = label.to_lowercase();
                let mut chars = lower.chars();
                Some(match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                })
            }
            ReasonFormat::Ignore => None,
        }
    }
}

/// Error returned when a reason format name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownReasonFormat(pub String);

impl fmt::Display for UnknownReasonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reason format '{}'", self.0)
    }
}

impl std::error::Error for UnknownReasonFormat {}

impl FromStr for ReasonFormat {
    type Err = UnknownReasonFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UPPERCASE" => Ok(ReasonFormat::Uppercase),
            "LOWERCASE" => Ok(ReasonFormat::Lowercase),
            "UCFIRST" => Ok(ReasonFormat::Ucfirst),
            "IGNORE" => Ok(ReasonFormat::Ignore),
            _ => Err(UnknownReasonFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accept_per_mode() {
        assert_eq!(Mode::Normal.default_accept().min(), Some(Reason::Notice));
        assert_eq!(Mode::Verbose.default_accept().min(), Some(Reason::Info));
        assert_eq!(Mode::Assert.default_accept().min(), Some(Reason::Assert));
        assert_eq!(Mode::Debug.default_accept(), ReasonSet::all());
    }

    #[test]
    fn test_location_matrix() {
        for mode in [Mode::Normal, Mode::Verbose, Mode::Assert, Mode::Debug] {
            assert!(mode.shows_location(Reason::Assert));
            assert!(mode.shows_location(Reason::Panic));
            assert!(!mode.shows_location(Reason::Info));
        }
        assert!(!Mode::Normal.shows_location(Reason::Warning));
        assert!(Mode::Assert.shows_location(Reason::Warning));
        assert!(!Mode::Debug.shows_location(Reason::Warning));
        assert!(Mode::Debug.shows_location(Reason::Mistake));
        assert!(!Mode::Verbose.shows_location(Reason::Error));
    }

    #[test]
    fn test_stack_matrix() {
        assert!(Mode::Normal.shows_stack(Reason::Panic));
        assert!(!Mode::Normal.shows_stack(Reason::Failure));
        assert!(Mode::Assert.shows_stack(Reason::Alert));
        assert!(!Mode::Assert.shows_stack(Reason::Fault));
        assert!(Mode::Debug.shows_stack(Reason::Error));
        assert!(!Mode::Debug.shows_stack(Reason::Mistake));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("debug".parse::<Mode>(), Ok(Mode::Debug));
        assert_eq!("VERBOSE".parse::<Mode>(), Ok(Mode::Verbose));
        assert_eq!("2".parse::<Mode>(), Ok(Mode::Assert));
        assert!("4".parse::<Mode>().is_err());
        assert!("loud".parse::<Mode>().is_err());
    }

    #[test]
    fn test_reason_format() {
        assert_eq!(ReasonFormat::Uppercase.apply("error").as_deref(), Some("ERROR"));
        assert_eq!(ReasonFormat::Lowercase.apply("ERROR").as_deref(), Some("error"));
        assert_eq!(ReasonFormat::Ucfirst.apply("ERROR").as_deref(), Some("Error"));
        assert_eq!(ReasonFormat::Ignore.apply("ERROR"), None);
        assert_eq!("ucfirst".parse::<ReasonFormat>(), Ok(ReasonFormat::Ucfirst));
        assert!("fancy".parse::<ReasonFormat>().is_err());
    }
}
