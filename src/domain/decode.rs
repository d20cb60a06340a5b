//! Best-effort decoding of raw panics.
//!
//! Panics caught inside a try scope carry an arbitrary payload. When it is
//! an [`Exception`] it is used as is; otherwise the panic text is inspected
//! for an embedded OS error number and for a backtrace listing.

use crate::domain::exception::Exception;
use crate::domain::message::Message;
use crate::domain::reason::Reason;
use regex::Regex;
use std::any::Any;
use std::sync::OnceLock;

/// Result of decoding a panic payload.
#[derive(Debug)]
pub enum DecodedPanic {
    /// The payload was an exception raised with `std::panic::panic_any`
    Exception(Exception),
    /// A report to make for a plain panic
    Report {
        /// Reason picked from the panic text
        reason: Reason,
        /// The panic text, without the decoded parts
        message: Message,
        /// OS error number found in the text
        errno: Option<i32>,
    },
}

fn os_error_pattern() -> &'static Regex {
    static OS_ERROR: OnceLock<Regex> = OnceLock::new();
    OS_ERROR.get_or_init(|| {
        Regex::new(r"\s*\(os error (\d+)\)")
            .unwrap_or_else(|e| panic!("os error pattern does not compile: {}", e))
    })
}

/// Text carried by a panic payload.
pub fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<Exception>() {
        format!("{:?}", e.message())
    } else {
        "panic with a non-text payload".to_string()
    }
}

/// Decode a panic payload into a report.
///
/// - text with `(os error N)` yields errno `N`
/// - text with a `stack backtrace:` listing is a PANIC, or an ALERT when an
///   errno was found
/// - anything else is an ERROR, or a FAULT when an errno was found
pub fn decode_panic(payload: Box<dyn Any + Send>) -> DecodedPanic {
    let payload = match payload.downcast::<Exception>() {
        Ok(exception) => return DecodedPanic::Exception(*exception),
        Err(other) => other,
    };
    decode_text(&panic_text(&*payload))
}

/// Decode panic text, see [`decode_panic`].
pub fn decode_text(text: &str) -> DecodedPanic {
    let (text, has_stack) = match text.find("stack backtrace:") {
        Some(pos) => (&text[..pos], true),
        None => (text, false),
    };

    let errno = os_error_pattern()
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok());
    let cleaned = os_error_pattern().replace_all(text, "");
    let cleaned = cleaned.trim_end();

    let reason = match (has_stack, errno.is_some()) {
        (true, true) => Reason::Alert,
        (true, false) => Reason::Panic,
        (false, true) => Reason::Fault,
        (false, false) => Reason::Error,
    };

    DecodedPanic::Report {
        reason,
        message: Message::literal(cleaned),
        errno,
    }
}
