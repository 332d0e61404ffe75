use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::catalog::Kind;
use crate::err::{Error, Result};
use crate::val::Value;

/// A parameter a query declaration accepts
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ParamDefinition {
	pub name: String,
	pub kind: Kind,
	pub optional: bool,
}

/// The scalar arguments a registered query or mutation is invoked with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct Params(BTreeMap<String, Value>);

impl TryFrom<BTreeMap<String, Value>> for Params {
	type Error = Error;

	fn try_from(v: BTreeMap<String, Value>) -> Result<Self> {
		let mut out = Params::new();
		for (name, value) in v {
			out.insert(name, value)?;
		}
		Ok(out)
	}
}

impl Params {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a parameter, rejecting arrays and objects
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
		self.insert(name, value)?;
		Ok(self)
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
		let (name, value) = (name.into(), value.into());
		if !value.is_scalar() {
			return Err(Error::InvalidParam {
				name,
				message: format!("expected a scalar value but found {}", value.kindof()),
			});
		}
		self.0.insert(name, value);
		Ok(())
	}

	/// Fetch a parameter which must have been supplied
	pub fn get(&self, name: &str) -> Result<&Value> {
		self.0.get(name).ok_or_else(|| Error::InvalidParam {
			name: name.to_owned(),
			message: "the parameter is missing".to_owned(),
		})
	}

	/// Fetch a parameter which may be omitted
	pub fn opt(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	pub fn get_str(&self, name: &str) -> Result<&str> {
		let v = self.get(name)?;
		v.as_str().ok_or_else(|| Self::mistyped(name, Kind::String, v))
	}

	pub fn get_int(&self, name: &str) -> Result<i64> {
		let v = self.get(name)?;
		v.as_int().ok_or_else(|| Self::mistyped(name, Kind::Int, v))
	}

	pub fn get_bool(&self, name: &str) -> Result<bool> {
		let v = self.get(name)?;
		v.as_bool().ok_or_else(|| Self::mistyped(name, Kind::Bool, v))
	}

	fn mistyped(name: &str, kind: Kind, found: &Value) -> Error {
		Error::InvalidParam {
			name: name.to_owned(),
			message: format!("expected {kind} but found {}", found.kindof()),
		}
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.0.iter()
	}

	/// Checks these parameters against a declared parameter list.
	/// Unknown, missing and ill-typed parameters are rejected.
	pub fn validate(&self, declared: &[ParamDefinition]) -> Result<()> {
		for (name, value) in self.0.iter() {
			let Some(def) = declared.iter().find(|d| &d.name == name) else {
				return Err(Error::InvalidParam {
					name: name.clone(),
					message: "the parameter is not declared".to_owned(),
				});
			};
			if value.is_null() {
				if !def.optional {
					return Err(Self::mistyped(name, def.kind, value));
				}
			} else if !def.kind.allows(value) {
				return Err(Self::mistyped(name, def.kind, value));
			}
		}
		for def in declared.iter().filter(|d| !d.optional) {
			self.get(&def.name)?;
		}
		Ok(())
	}
}

impl Display for Params {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("{ ")?;
		for (i, (k, v)) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{k}: {v}")?;
		}
		f.write_str(" }")
	}
}
