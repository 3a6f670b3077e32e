//! Explanation trace: one structured record per computed figure.
//!
//! Line items are appended in the order figures are computed; that order
//! is part of the audit contract and is never sorted or grouped.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A named value used to compute a line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TraceValue {
    Amount(Decimal),
    Rate(Decimal),
    Flag(bool),
    Text(String),
}

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceValue::Amount(v) => write!(f, "{:.2} €", v),
            TraceValue::Rate(v) => write!(f, "{}%", (v * Decimal::ONE_HUNDRED).normalize()),
            TraceValue::Flag(v) => write!(f, "{v}"),
            TraceValue::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceInput {
    pub name: String,
    pub value: TraceValue,
}

/// One entry in the explanation trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub label: String,
    /// Human-readable template naming the inputs, e.g. `base × rate`.
    pub formula: String,
    pub inputs: Vec<TraceInput>,
    pub amount: Decimal,
}

impl LineItem {
    pub fn input(&self, name: &str) -> Option<&TraceValue> {
        self.inputs
            .iter()
            .find(|i| i.name == name)
            .map(|i| &i.value)
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.formula)?;
        if !self.inputs.is_empty() {
            let inputs: Vec<String> = self
                .inputs
                .iter()
                .map(|i| format!("{}={}", i.name, i.value))
                .collect();
            write!(f, " [{}]", inputs.join(", "))?;
        }
        write!(f, " = {:.2}", self.amount)
    }
}

/// Accumulates line items for a single estimate run.
#[derive(Debug, Default)]
pub struct ExplanationTracer {
    items: Vec<LineItem>,
}

impl ExplanationTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a line item; call [`LineBuilder::amount`] to append it.
    pub fn line(&mut self, label: impl Into<String>, formula: impl Into<String>) -> LineBuilder<'_> {
        LineBuilder {
            tracer: self,
            label: label.into(),
            formula: formula.into(),
            inputs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }
}

/// Collects the named inputs of one line item.
pub struct LineBuilder<'a> {
    tracer: &'a mut ExplanationTracer,
    label: String,
    formula: String,
    inputs: Vec<TraceInput>,
}

impl LineBuilder<'_> {
    fn push(mut self, name: &str, value: TraceValue) -> Self {
        self.inputs.push(TraceInput {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn with_amount(self, name: &str, value: Decimal) -> Self {
        self.push(name, TraceValue::Amount(value))
    }

    pub fn with_rate(self, name: &str, value: Decimal) -> Self {
        self.push(name, TraceValue::Rate(value))
    }

    pub fn with_flag(self, name: &str, value: bool) -> Self {
        self.push(name, TraceValue::Flag(value))
    }

    pub fn with_text(self, name: &str, value: impl Into<String>) -> Self {
        self.push(name, TraceValue::Text(value.into()))
    }

    /// Append the line item with its computed amount.
    pub fn amount(self, amount: Decimal) {
        self.tracer.items.push(LineItem {
            label: self.label,
            formula: self.formula,
            inputs: self.inputs,
            amount,
        });
    }
}

/// Render a trace as plain text, one line per item.
pub fn render_text(items: &[LineItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
