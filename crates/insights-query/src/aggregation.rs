//! Group accumulators

use insights_core::{Document, FieldValue};

/// Accumulator computed per group
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of documents in the group
    Count,
    /// Sum of the numeric values at a path; non-numeric values are ignored
    Sum(String),
    /// Mean of the numeric values at a path; null when there are none
    Avg(String),
    /// Collect one embedded document per input, built from `(name, path)` pairs
    Push(Vec<(String, String)>),
}

impl Accumulator {
    pub fn sum(path: impl Into<String>) -> Self {
        Accumulator::Sum(path.into())
    }

    pub fn avg(path: impl Into<String>) -> Self {
        Accumulator::Avg(path.into())
    }

    pub fn push(fields: &[(&str, &str)]) -> Self {
        Accumulator::Push(
            fields
                .iter()
                .map(|(name, path)| (name.to_string(), path.to_string()))
                .collect(),
        )
    }

    /// Fresh state for one group
    pub fn start(&self) -> AccumulatorState {
        match self {
            Accumulator::Count => AccumulatorState::Count(0),
            Accumulator::Sum(_) => AccumulatorState::Sum {
                int_total: Some(0),
                float_total: 0.0,
            },
            Accumulator::Avg(_) => AccumulatorState::Avg { total: 0.0, count: 0 },
            Accumulator::Push(_) => AccumulatorState::Push(Vec::new()),
        }
    }
}

/// Running state of an accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorState {
    Count(u64),
    /// `int_total` stays populated while every input is an integer and the
    /// running total fits in an i64
    Sum {
        int_total: Option<i64>,
        float_total: f64,
    },
    Avg {
        total: f64,
        count: u64,
    },
    Push(Vec<FieldValue>),
}

impl AccumulatorState {
    /// Fold one document into the state
    pub fn add(&mut self, accumulator: &Accumulator, doc: &Document) {
        match (self, accumulator) {
            (AccumulatorState::Count(n), Accumulator::Count) => *n += 1,
            (
                AccumulatorState::Sum {
                    int_total,
                    float_total,
                },
                Accumulator::Sum(path),
            ) => match doc.get_path(path) {
                Some(FieldValue::Integer(v)) => {
                    *float_total += *v as f64;
                    *int_total = int_total.and_then(|t| t.checked_add(*v));
                }
                Some(FieldValue::Float(v)) => {
                    *float_total += *v;
                    *int_total = None;
                }
                _ => {}
            },
            (AccumulatorState::Avg { total, count }, Accumulator::Avg(path)) => {
                if let Some(v) = doc.get_path(path).and_then(FieldValue::as_f64) {
                    *total += v;
                    *count += 1;
                }
            }
            (AccumulatorState::Push(items), Accumulator::Push(fields)) => {
                let mut item = Document::new();
                for (name, path) in fields {
                    if let Some(value) = doc.get_path(path) {
                        item.insert(name.clone(), value.clone());
                    }
                }
                items.push(FieldValue::Object(item));
            }
            // start() always pairs a state with its own accumulator
            _ => {}
        }
    }

    /// Compute the final value
    pub fn finish(self) -> FieldValue {
        match self {
            AccumulatorState::Count(n) => FieldValue::from(n),
            AccumulatorState::Sum {
                int_total: Some(total),
                ..
            } => FieldValue::Integer(total),
            AccumulatorState::Sum { float_total, .. } => FieldValue::Float(float_total),
            AccumulatorState::Avg { count: 0, .. } => FieldValue::Null,
            AccumulatorState::Avg { total, count } => FieldValue::Float(total / count as f64),
            AccumulatorState::Push(items) => FieldValue::Array(items),
        }
    }
}
