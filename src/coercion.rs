// Numeric coercion - currency/percentage-formatted text → numbers
//
// Spreadsheet exports hand us "$2,500.00", "1,683" and "16.3%" where a
// number is meant. Coercion strips the recognized decorations and parses
// the remainder; anything else is a typed failure, never a silent zero.
// Sentinel rows ("Grand Total") must be filtered out before coercion.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("cannot coerce empty text to a number")]
    EmptyText,

    #[error("text {0:?} is not numeric after stripping currency/percent decorations")]
    NotNumeric(String),

    #[error("value {0} has a fractional part but an integer was expected")]
    NotIntegral(f64),

    #[error("value {0} is out of range for the target integer type")]
    OutOfRange(f64),

    #[error("cell of type {0} cannot be coerced to a number")]
    UnsupportedType(&'static str),
}

/// Coerce a raw cell to a decimal number.
///
/// Already-numeric cells pass through unchanged. Text cells may carry a
/// leading `$`, thousands separators `,`, and/or a trailing `%`; the
/// percent sign is stripped, not scaled ("16.3%" → 16.3).
pub fn coerce_decimal(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoercionError::NotNumeric(n.to_string())),
        Value::String(text) => parse_decorated(text),
        Value::Null => Err(CoercionError::UnsupportedType("null")),
        Value::Bool(_) => Err(CoercionError::UnsupportedType("bool")),
        Value::Array(_) => Err(CoercionError::UnsupportedType("array")),
        Value::Object(_) => Err(CoercionError::UnsupportedType("object")),
    }
}

/// Coerce a raw cell to an integer.
///
/// Spreadsheet readers frequently widen integer columns to floats
/// (`1222.0` for a dealer id), so numerically-integral decimals are
/// accepted; a genuine fractional part is an error.
pub fn coerce_integer(value: &Value) -> Result<i64, CoercionError> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
    }

    let decimal = coerce_decimal(value)?;
    if decimal.fract() != 0.0 {
        return Err(CoercionError::NotIntegral(decimal));
    }
    // f64 → i64 casts saturate silently; reject out-of-range magnitudes
    // instead. i64::MAX as f64 rounds up to 2^63, so >= is the right bound.
    if decimal >= i64::MAX as f64 || decimal < i64::MIN as f64 {
        return Err(CoercionError::OutOfRange(decimal));
    }
    Ok(decimal as i64)
}

fn parse_decorated(text: &str) -> Result<f64, CoercionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::EmptyText);
    }

    // Sign may precede the currency symbol ("-$855.94")
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    let rest = rest.strip_suffix('%').unwrap_or(rest);
    let cleaned = rest.replace(',', "");

    let parsed: f64 = cleaned
        .trim()
        .parse()
        .map_err(|_| CoercionError::NotNumeric(text.to_string()))?;

    Ok(if negative { -parsed } else { parsed })
}
