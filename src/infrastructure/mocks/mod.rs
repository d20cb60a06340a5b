//! Mock implementations for testing.
//!
//! This module provides test doubles for the ports, enabling controlled
//! testing of the report engine without real output or process exits.

pub mod layer;
pub mod sink;
pub mod terminator;
pub mod translator;

pub use layer::{CapturedEvent, MockCaptureLayer};
pub use sink::{LoggedRecord, MockSink};
pub use terminator::MockTerminator;
pub use translator::MockTranslator;
