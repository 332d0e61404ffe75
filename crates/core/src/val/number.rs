use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A numeric value. Integers and floats compare with each other numerically.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
	Int(i64),
	Float(f64),
}

impl Default for Number {
	fn default() -> Self {
		Self::Int(0)
	}
}

impl Number {
	pub fn is_truthy(&self) -> bool {
		match self {
			Number::Int(v) => *v != 0,
			Number::Float(v) => *v != 0.0,
		}
	}

	pub fn to_float(self) -> f64 {
		match self {
			Number::Int(v) => v as f64,
			Number::Float(v) => v,
		}
	}

	/// A total ordering, placing NaN after every other number.
	pub fn total_cmp(&self, other: &Number) -> Ordering {
		match (self, other) {
			(Number::Int(a), Number::Int(b)) => a.cmp(b),
			(a, b) => a.to_float().total_cmp(&b.to_float()),
		}
	}
}

impl PartialEq for Number {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Number::Int(a), Number::Int(b)) => a == b,
			(a, b) => a.to_float() == b.to_float(),
		}
	}
}

impl PartialOrd for Number {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		match (self, other) {
			(Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
			(a, b) => a.to_float().partial_cmp(&b.to_float()),
		}
	}
}

impl fmt::Display for Number {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Number::Int(v) => write!(f, "{v}"),
			Number::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
			Number::Float(v) => write!(f, "{v}"),
		}
	}
}
