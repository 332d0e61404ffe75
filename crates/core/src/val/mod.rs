use std::cmp::Ordering;
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

pub mod number;
pub mod object;

pub use self::number::Number;
pub use self::object::Object;

/// A row, as returned by storage and evaluated by filters.
pub type Row = Object;

/// A dynamically typed value held in a row field, a query parameter or a
/// filter comparison.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Number(Number),
	String(String),
	Array(Vec<Value>),
	Object(Object),
	// Add new variants here
}

impl Value {
	// -----------------------------------
	// Simple value detection
	// -----------------------------------

	/// Check if this Value is NULL
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Check if this Value is TRUE
	pub fn is_true(&self) -> bool {
		matches!(self, Value::Bool(true))
	}

	/// Check if this Value is truthy
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(v) => *v,
			Value::Number(v) => v.is_truthy(),
			Value::String(v) => !v.is_empty(),
			Value::Array(v) => !v.is_empty(),
			Value::Object(v) => !v.is_empty(),
		}
	}

	/// Check if this Value can be carried in a wire parameter bag
	pub fn is_scalar(&self) -> bool {
		!matches!(self, Value::Array(_) | Value::Object(_))
	}

	/// Returns the name of the kind of this value
	pub fn kindof(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Number(Number::Int(_)) => "int",
			Value::Number(Number::Float(_)) => "float",
			Value::String(_) => "string",
			Value::Array(_) => "array",
			Value::Object(_) => "object",
		}
	}

	// -----------------------------------
	// Simple conversion of values
	// -----------------------------------

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Number(Number::Int(v)) => Some(*v),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(v) => Some(v),
			_ => None,
		}
	}

	// -----------------------------------
	// Value comparison
	// -----------------------------------

	/// Compares two values of the same kind. Values of different
	/// kinds, and NULL, are not comparable.
	pub fn compare(&self, other: &Value) -> Option<Ordering> {
		match (self, other) {
			(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
			(Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
			(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
			_ => None,
		}
	}

	/// A total ordering over all values, used when sorting rows.
	/// NULL sorts first, then booleans, numbers, strings, arrays and objects.
	pub fn total_cmp(&self, other: &Value) -> Ordering {
		fn rank(v: &Value) -> u8 {
			match v {
				Value::Null => 0,
				Value::Bool(_) => 1,
				Value::Number(_) => 2,
				Value::String(_) => 3,
				Value::Array(_) => 4,
				Value::Object(_) => 5,
			}
		}
		match (self, other) {
			(Value::Number(a), Value::Number(b)) => a.total_cmp(b),
			(Value::Array(a), Value::Array(b)) => {
				for (x, y) in a.iter().zip(b.iter()) {
					match x.total_cmp(y) {
						Ordering::Equal => continue,
						o => return o,
					}
				}
				a.len().cmp(&b.len())
			}
			(Value::Object(a), Value::Object(b)) => {
				for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
					match ka.cmp(kb).then_with(|| va.total_cmp(vb)) {
						Ordering::Equal => continue,
						o => return o,
					}
				}
				a.len().cmp(&b.len())
			}
			_ => self.compare(other).unwrap_or_else(|| rank(self).cmp(&rank(other))),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Value::Null => f.write_str("NULL"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Number(v) => write!(f, "{v}"),
			Value::String(v) => {
				f.write_char('\'')?;
				for c in v.chars() {
					if c == '\'' || c == '\\' {
						f.write_char('\\')?;
					}
					f.write_char(c)?;
				}
				f.write_char('\'')
			}
			Value::Array(v) => {
				f.write_char('[')?;
				for (i, x) in v.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{x}")?;
				}
				f.write_char(']')
			}
			Value::Object(v) => write!(f, "{v}"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Number(Number::Int(v as i64))
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Number(Number::Int(v))
	}
}

impl From<u32> for Value {
	fn from(v: u32) -> Self {
		Value::Number(Number::Int(v as i64))
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Number(Number::Float(v))
	}
}

impl From<Number> for Value {
	fn from(v: Number) -> Self {
		Value::Number(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<&String> for Value {
	fn from(v: &String) -> Self {
		Value::String(v.clone())
	}
}

impl From<Object> for Value {
	fn from(v: Object) -> Self {
		Value::Object(v)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Value::Array(v.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		match v {
			Some(v) => v.into(),
			None => Value::Null,
		}
	}
}

impl From<serde_json::Value> for Value {
	fn from(v: serde_json::Value) -> Self {
		match v {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(v) => Value::Bool(v),
			serde_json::Value::Number(v) => match v.as_i64() {
				Some(i) => Value::Number(Number::Int(i)),
				None => Value::Number(Number::Float(v.as_f64().unwrap_or(f64::NAN))),
			},
			serde_json::Value::String(v) => Value::String(v),
			serde_json::Value::Array(v) => Value::Array(v.into_iter().map(Value::from).collect()),
			serde_json::Value::Object(v) => {
				Value::Object(v.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case::null(Value::Null, false)]
	#[case::bool(Value::Bool(true), true)]
	#[case::zero(Value::from(0), false)]
	#[case::int(Value::from(3), true)]
	#[case::empty_string(Value::from(""), false)]
	#[case::string(Value::from("a"), true)]
	#[case::empty_array(Value::Array(vec![]), false)]
	fn truthiness(#[case] value: Value, #[case] expected: bool) {
		assert_eq!(value.is_truthy(), expected);
	}

	#[test]
	fn numbers_compare_across_int_and_float() {
		assert_eq!(Value::from(2).compare(&Value::from(2.0)), Some(Ordering::Equal));
		assert_eq!(Value::from(1).compare(&Value::from(1.5)), Some(Ordering::Less));
		assert_eq!(Value::from(1), Value::from(1.0));
	}

	#[test]
	fn different_kinds_are_not_comparable() {
		assert_eq!(Value::from(1).compare(&Value::from("1")), None);
		assert_eq!(Value::Null.compare(&Value::Null), None);
		assert_eq!(Value::Null.total_cmp(&Value::from(false)), Ordering::Less);
		assert_eq!(Value::from("a").total_cmp(&Value::from(10)), Ordering::Greater);
	}

	#[test]
	fn converts_from_json() {
		let v = Value::from(json!({"a": [1, 2.5, "x", null], "b": true}));
		let Value::Object(o) = &v else {
			panic!("expected an object");
		};
		assert_eq!(o.get("b"), Some(&Value::Bool(true)));
		assert_eq!(
			o.get("a"),
			Some(&Value::Array(vec![
				Value::from(1),
				Value::from(2.5),
				Value::from("x"),
				Value::Null
			]))
		);
		assert_eq!(serde_json::to_value(&v).unwrap(), json!({"a": [1, 2.5, "x", null], "b": true}));
	}

	#[test]
	fn strings_are_quoted_when_displayed() {
		assert_eq!(Value::from("it's").to_string(), "'it\\'s'");
		assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
	}
}
