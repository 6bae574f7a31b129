//! Wire codec for values stored in the remote tier.
//!
//! JSON cannot express NaN or `undefined`, and a JSON `null` is easy to
//! confuse with a missing key. Those three values are written as reserved
//! string tokens and restored on the way back.
//!
//! A genuine string equal to one of the tokens decodes as the value the token
//! stands for. Reserved tokens are prefixed with a double underscore to keep
//! collisions unlikely.
//!
//! Whether the key existed at all is never encoded here: store calls carry
//! that as `Option<String>`.

use crate::error::CodecError;
use crate::value::Value;

pub const NAN_TOKEN: &str = "__NaN";
pub const NULL_TOKEN: &str = "__null";
pub const UNDEFINED_TOKEN: &str = "__undefined";

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Encodes a value into its wire text.
pub fn encode(value: &Value) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&to_wire(value))?)
}

/// Decodes wire text produced by [`encode`].
pub fn decode(text: &str) -> Result<Value, CodecError> {
    let wire: serde_json::Value = serde_json::from_str(text)?;
    Ok(from_wire(wire))
}

fn to_wire(value: &Value) -> serde_json::Value {
    match value {
        Value::Undefined => serde_json::Value::String(UNDEFINED_TOKEN.to_string()),
        Value::Null => serde_json::Value::String(NULL_TOKEN.to_string()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_wire(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_wire).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_wire(v))).collect(),
        ),
    }
}

fn number_to_wire(n: f64) -> serde_json::Value {
    if n.is_nan() {
        return serde_json::Value::String(NAN_TOKEN.to_string());
    }
    // Integral values are written without a fraction so other clients of the
    // same store read `2`, not `2.0`.
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::Number(serde_json::Number::from(n as i64));
    }
    // Infinities have no JSON form and degrade to null.
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn from_wire(wire: serde_json::Value) -> Value {
    match wire {
        serde_json::Value::String(s) => match s.as_str() {
            NAN_TOKEN => Value::Number(f64::NAN),
            NULL_TOKEN => Value::Null,
            UNDEFINED_TOKEN => Value::Undefined,
            _ => Value::String(s),
        },
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(from_wire).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, from_wire(v))).collect())
        }
        other => Value::from(other),
    }
}
