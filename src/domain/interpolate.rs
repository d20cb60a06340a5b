//! Placeholder expansion.
//!
//! Placeholders look like `{name}` or `{name%fmt}`, where `fmt` is a printf
//! style specifier. Names start with a letter or underscore and may contain
//! dots. A placeholder the resolver does not know is left in place.

use crate::domain::format::{format_value, plain_text};
use crate::domain::message::Message;
use crate::domain::value::Value;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)(%[^{}]*)?\}")
            .unwrap_or_else(|e| panic!("placeholder pattern does not compile: {}", e))
    })
}

/// Replace every placeholder in `template`.
///
/// `resolve` receives the placeholder name and its specifier (including the
/// leading `%`), and returns the replacement text, or `None` to keep the
/// placeholder untouched.
///
/// # Example
/// ```
/// use report_dispatch::domain::interpolate::interpolate;
///
/// let out = interpolate("{a} and {b}", |name, _fmt| (name == "a").then(|| "1".to_string()));
/// assert_eq!(out, "1 and {b}");
/// ```
pub fn interpolate<F>(template: &str, mut resolve: F) -> String
where
    F: FnMut(&str, Option<&str>) -> Option<String>,
{
    if !template.contains('{') {
        return template.to_string();
    }
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let spec = caps.get(2).map(|m| m.as_str());
            resolve(name, spec).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Text for one value.
///
/// Lazy values are run, sequences are joined with `join` before the
/// specifier is applied, and nested messages go through `nested`.
pub fn render_value(
    value: &Value,
    spec: Option<&str>,
    join: &str,
    nested: &mut dyn FnMut(&Message) -> String,
) -> String {
    match value {
        Value::Lazy(_) => render_value(&value.resolve(), spec, join, nested),
        Value::Undef => "undef".to_string(),
        Value::Seq(items) => {
            let joined = items
                .iter()
                .map(|item| render_value(item, None, join, nested))
                .collect::<Vec<_>>()
                .join(join);
            apply_spec(spec, Value::from(joined))
        }
        Value::Message(m) => apply_spec(spec, Value::from(nested(m))),
        scalar => match spec {
            Some(spec) => format_value(spec, scalar),
            None => plain_text(scalar),
        },
    }
}

fn apply_spec(spec: Option<&str>, text: Value) -> String {
    match spec {
        Some(spec) => format_value(spec, &text),
        None => plain_text(&text),
    }
}
