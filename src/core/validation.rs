//! Argument coercion for dynamic invocation
//!
//! Externally supplied arguments arrive as loosely typed JSON. This module
//! converts them, best effort, into the shape a method parameter declares
//! (string "5" -> integer 5, number 1 -> `true`, number -> string, ...).

use crate::core::error::{HostError, HostResult};
use crate::protocol::param_type::ParamType;
use serde_json::{Number, Value};

/// Helper function to get a human-readable type name for a JSON value
fn get_value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce `value` into the declared type of parameter `field_name`.
///
/// Fails with [`HostError::Invocation`] when no sensible conversion exists.
pub fn coerce(value: &Value, ty: &ParamType, field_name: &str) -> HostResult<Value> {
    let coerced = match ty {
        ParamType::Bool => coerce_to_boolean(value),
        ParamType::I32 => coerce_to_integer(value, i32::MIN as i64, i32::MAX as i64),
        ParamType::I64 => coerce_to_integer(value, i64::MIN, i64::MAX),
        ParamType::U32 => coerce_to_unsigned(value, u32::MAX as u64),
        ParamType::U64 => coerce_to_unsigned(value, u64::MAX),
        ParamType::F32 | ParamType::F64 => coerce_to_number(value),
        ParamType::Char => coerce_to_char(value),
        ParamType::String => coerce_to_string(value),
        ParamType::Json | ParamType::Custom(_) => Some(value.clone()),
        ParamType::Unit => value.is_null().then_some(Value::Null),
        ParamType::Optional(inner) => {
            if value.is_null() {
                Some(Value::Null)
            } else {
                return coerce(value, inner, field_name);
            }
        }
        ParamType::List(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    out.push(coerce(item, inner, &format!("{field_name}[{index}]"))?);
                }
                Some(Value::Array(out))
            }
            _ => None,
        },
    };

    coerced.ok_or_else(|| {
        HostError::invocation(format!(
            "Argument '{field_name}' of type {} cannot be converted to {ty}",
            get_value_type_name(value)
        ))
    })
}

fn coerce_to_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn coerce_to_char(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(Value::String(c.to_string())),
        _ => None,
    }
}

fn coerce_to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Value::Bool(true) => Some(Value::from(1)),
        Value::Bool(false) => Some(Value::from(0)),
        _ => None,
    }
}

fn coerce_to_integer(value: &Value, min: i64, max: i64) -> Option<Value> {
    let n = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => whole_float(n.as_f64()?)?,
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => whole_float(s.parse::<f64>().ok()?)?,
            }
        }
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };
    (min..=max).contains(&n).then(|| Value::from(n))
}

fn coerce_to_unsigned(value: &Value, max: u64) -> Option<Value> {
    let n = match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => u,
            None => u64::try_from(whole_float(n.as_f64()?)?).ok()?,
        },
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        Value::Bool(b) => u64::from(*b),
        _ => return None,
    };
    (n <= max).then(|| Value::from(n))
}

fn whole_float(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn coerce_to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Bool(i != 0))
            } else {
                Some(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0))
            }
        }
        _ => None,
    }
}
