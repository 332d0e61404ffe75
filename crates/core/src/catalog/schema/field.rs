use std::fmt;

use serde::{Deserialize, Serialize};

use crate::val::{Number, Value};

/// The kind of value a field or query parameter accepts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
	#[default]
	Any,
	Bool,
	Int,
	Float,
	Number,
	String,
	Array,
	Object,
}

impl Kind {
	/// Checks whether a non-null value is of this kind
	pub fn allows(&self, value: &Value) -> bool {
		match (self, value) {
			(Kind::Any, _) => true,
			(Kind::Bool, Value::Bool(_)) => true,
			(Kind::Int, Value::Number(Number::Int(_))) => true,
			(Kind::Float, Value::Number(_)) => true,
			(Kind::Number, Value::Number(_)) => true,
			(Kind::String, Value::String(_)) => true,
			(Kind::Array, Value::Array(_)) => true,
			(Kind::Object, Value::Object(_)) => true,
			_ => false,
		}
	}

	/// A representative value of this kind, used when dry-running
	/// query declarations at server startup. Numbers are one, so that
	/// they are accepted as a page size.
	pub fn placeholder(&self) -> Value {
		match self {
			Kind::Any | Kind::String => Value::from(""),
			Kind::Bool => Value::Bool(false),
			Kind::Int | Kind::Number => Value::from(1),
			Kind::Float => Value::from(1.0),
			Kind::Array => Value::Array(vec![]),
			Kind::Object => Value::Object(Default::default()),
		}
	}
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Kind::Any => "any",
			Kind::Bool => "bool",
			Kind::Int => "int",
			Kind::Float => "float",
			Kind::Number => "number",
			Kind::String => "string",
			Kind::Array => "array",
			Kind::Object => "object",
		})
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FieldDefinition {
	pub name: String,
	pub kind: Kind,
	/// Whether the field may hold NULL or be absent from a row.
	pub optional: bool,
}

impl FieldDefinition {
	pub fn new(name: impl Into<String>, kind: Kind) -> Self {
		Self {
			name: name.into(),
			kind,
			optional: false,
		}
	}

	pub fn optional(mut self) -> Self {
		self.optional = true;
		self
	}

	/// Checks a value which is about to be written into this field
	pub fn allows(&self, value: &Value) -> bool {
		match value {
			Value::Null => self.optional,
			v => self.kind.allows(v),
		}
	}
}

impl fmt::Display for FieldDefinition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} {}", self.name, self.kind)?;
		if self.optional {
			f.write_str(" OPTIONAL")?;
		}
		Ok(())
	}
}
