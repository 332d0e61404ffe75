//! Caller identities, as resolved by the authentication provider.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::val::{Object, Value};

pub mod provider;

pub use self::provider::{IdentityProvider, StaticProvider, resolve};

/// An authenticated caller.
///
/// An anonymous caller has no identity at all, and is represented as
/// `None` wherever an `Option<&Identity>` is accepted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	/// The unique id of the caller, usually a user record key
	pub id: String,
	/// The role the caller was authenticated with
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	/// Any additional claims carried by the caller's token
	#[serde(default)]
	pub attributes: Object,
}

impl Identity {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Default::default()
		}
	}

	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.role = Some(role.into());
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.role.as_deref() == Some(role)
	}

	/// Fetch a claim, or NULL when the caller does not carry it
	pub fn attribute(&self, key: &str) -> &Value {
		self.attributes.pick(key)
	}

	/// The caller id as a value, for comparing against row fields
	pub fn id_value(&self) -> Value {
		Value::from(self.id.as_str())
	}
}

impl Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.role {
			Some(role) => write!(f, "{} ({role})", self.id),
			None => f.write_str(&self.id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_attributes_are_null() {
		let who = Identity::new("u1").with_attribute("plan", "pro");
		assert_eq!(who.attribute("plan"), &Value::from("pro"));
		assert!(who.attribute("org").is_null());
	}

	#[test]
	fn deserializes_without_optional_parts() {
		let who: Identity = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
		assert_eq!(who, Identity::new("u1"));
		assert!(!who.has_role("admin"));
		assert_eq!(Identity::new("u2").with_role("admin").to_string(), "u2 (admin)");
	}
}
