// ! Declared type vocabulary shared by modules and the host

use crate::core::error::HostError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Declared type of a method parameter or return value
///
/// The textual form (`Display` / `FromStr`) is what descriptors carry in their
/// `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParamType {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    /// Arbitrary JSON (`serde_json::Value`)
    Json,
    /// No value, used for methods that return nothing
    Unit,
    List(Box<ParamType>),
    Optional(Box<ParamType>),
    /// A module-defined type known only by name
    Custom(String),
}

impl ParamType {
    /// Shorthand for `Vec<inner>`
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    /// Shorthand for `Option<inner>`
    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    /// Default-constructed value of this type.
    ///
    /// `None` means the type has no default: nullable wrappers construct to
    /// nothing and custom types have no known constructor.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            ParamType::Bool => Some(Value::Bool(false)),
            ParamType::I32 | ParamType::I64 | ParamType::U32 | ParamType::U64 => {
                Some(Value::from(0))
            }
            ParamType::F32 | ParamType::F64 => Some(Value::from(0.0)),
            ParamType::Char => Some(Value::String('\0'.to_string())),
            ParamType::String => Some(Value::String(String::new())),
            ParamType::Json | ParamType::Unit => Some(Value::Null),
            ParamType::List(_) => Some(Value::Array(Vec::new())),
            ParamType::Optional(_) | ParamType::Custom(_) => None,
        }
    }

    /// Whether `default_value` produces something
    pub fn is_default_constructible(&self) -> bool {
        self.default_value().is_some()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Bool => write!(f, "bool"),
            ParamType::I32 => write!(f, "i32"),
            ParamType::I64 => write!(f, "i64"),
            ParamType::U32 => write!(f, "u32"),
            ParamType::U64 => write!(f, "u64"),
            ParamType::F32 => write!(f, "f32"),
            ParamType::F64 => write!(f, "f64"),
            ParamType::Char => write!(f, "char"),
            ParamType::String => write!(f, "String"),
            ParamType::Json => write!(f, "serde_json::Value"),
            ParamType::Unit => write!(f, "()"),
            ParamType::List(inner) => write!(f, "Vec<{inner}>"),
            ParamType::Optional(inner) => write!(f, "Option<{inner}>"),
            ParamType::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for ParamType {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HostError::malformed("empty type name"));
        }

        if let Some(inner) = generic_argument(s, "Vec") {
            return Ok(ParamType::list(inner.parse()?));
        }
        if let Some(inner) = generic_argument(s, "Option") {
            return Ok(ParamType::optional(inner.parse()?));
        }

        Ok(match s {
            "bool" => ParamType::Bool,
            "i32" => ParamType::I32,
            "i64" => ParamType::I64,
            "u32" => ParamType::U32,
            "u64" => ParamType::U64,
            "f32" => ParamType::F32,
            "f64" => ParamType::F64,
            "char" => ParamType::Char,
            "String" | "string" | "str" | "&str" => ParamType::String,
            "serde_json::Value" | "Value" | "json" => ParamType::Json,
            "()" => ParamType::Unit,
            other => ParamType::Custom(other.to_string()),
        })
    }
}

fn generic_argument<'a>(s: &'a str, outer: &str) -> Option<&'a str> {
    s.strip_prefix(outer)?
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}

impl TryFrom<String> for ParamType {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_names_round_trip() {
        let types = [
            ParamType::Bool,
            ParamType::I64,
            ParamType::F64,
            ParamType::String,
            ParamType::Json,
            ParamType::Unit,
            ParamType::list(ParamType::optional(ParamType::U32)),
            ParamType::Custom("greeter::Mood".to_string()),
        ];
        for ty in types {
            let parsed: ParamType = ty.to_string().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("string".parse::<ParamType>().unwrap(), ParamType::String);
        assert_eq!(" Value ".parse::<ParamType>().unwrap(), ParamType::Json);
        assert!("".parse::<ParamType>().is_err());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(ParamType::I32.default_value(), Some(json!(0)));
        assert_eq!(ParamType::String.default_value(), Some(json!("")));
        assert_eq!(
            ParamType::list(ParamType::Bool).default_value(),
            Some(json!([]))
        );
        assert!(!ParamType::optional(ParamType::I32).is_default_constructible());
        assert!(!ParamType::Custom("x::Y".into()).is_default_constructible());
    }

    #[test]
    fn test_serde_as_string() {
        let value = serde_json::to_value(ParamType::list(ParamType::String)).unwrap();
        assert_eq!(value, json!("Vec<String>"));
        let back: ParamType = serde_json::from_value(value).unwrap();
        assert_eq!(back, ParamType::list(ParamType::String));
    }

    #[test]
    fn test_plugin_path_names_the_same_type() {
        let declared: crate::plugin::ParamType = ParamType::list(ParamType::String);
        let descriptor = crate::protocol::ParameterDescriptor::declared("names", &declared);
        assert_eq!(descriptor.param_type().unwrap(), declared);
    }
}
