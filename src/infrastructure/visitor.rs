//! Field visitor for extracting event field values.
//!
//! [`ReportLayer`](crate::infrastructure::layer::ReportLayer) uses it to pull
//! the message and the other fields out of a `tracing` event. Values are
//! kept as text: strings as they are, everything else via `Display` or
//! `Debug`.

use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};

/// A visitor that extracts field values into a BTreeMap.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    /// Create a new field visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor and return the collected fields.
    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }

    fn insert(&mut self, field: &Field, value: String) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}
