//! Parsing of untyped request records into validated inputs

use std::num::IntErrorKind;

use serde_json::Value;

use crate::data::{FeatureVector, FEATURE_NAMES, N_FEATURES};
use crate::error::ServiceError;

impl FeatureVector {
    /// Extract the four named measurements from a JSON record
    ///
    /// Each field may be a JSON number or a string holding a number.
    /// Any missing, non-numeric or non-finite field fails with
    /// [`ServiceError::InvalidInput`].
    pub fn from_record(record: &Value) -> crate::Result<Self> {
        let fields = record
            .as_object()
            .ok_or_else(|| ServiceError::invalid_input("record is not an object"))?;

        let mut values = [0.0; N_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            let raw = fields
                .get(name)
                .ok_or_else(|| ServiceError::invalid_input(format!("field '{}' is missing", name)))?;
            *slot = parse_real(raw)
                .ok_or_else(|| ServiceError::invalid_input(format!("field '{}' is not a number", name)))?;
        }

        FeatureVector::new(values)
    }
}

/// Parse the requested cluster count
///
/// Accepts a JSON integer, an integral float such as `3.0`, or an
/// integer string. Integers too large for `i64` saturate, so they still
/// reach the clustering engine's range check rather than failing here.
pub fn parse_cluster_count(request: &Value) -> crate::Result<i64> {
    let raw = request
        .get("k")
        .ok_or_else(|| ServiceError::invalid_input("field 'k' is missing"))?;

    let k = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| {
                // `as` saturates at the i64 bounds
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
        Value::String(s) => parse_integer(s.trim()),
        _ => None,
    };

    k.ok_or_else(|| ServiceError::invalid_input(format!("k must be an integer, got {}", raw)))
}

fn parse_integer(text: &str) -> Option<i64> {
    match text.parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

fn parse_real(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
