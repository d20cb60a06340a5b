//! Domain layer - pure reporting concepts with no I/O.
//!
//! This layer contains the core concepts of the reporting system:
//! - Reasons, reason sets and the reason expression language
//! - Modes and the rendering matrix
//! - Lazily translated messages, their values and placeholder formatting
//! - Report options, locations and exceptions
//!
//! All types in this layer are pure and easily testable.

pub mod config;
pub mod decode;
pub mod exception;
pub mod format;
pub mod interpolate;
pub mod location;
pub mod message;
pub mod mode;
pub mod options;
pub mod reason;
pub mod value;
