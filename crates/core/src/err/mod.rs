use std::fmt::{self, Display};

use serde::Serialize;
use thiserror::Error;

/// The crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error originating from the Syncline core.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// The engine encountered unreachable logic
	#[error("The engine encountered unreachable logic: {0}")]
	Unreachable(String),

	/// A query referenced a table, field or relation the schema does not define
	#[error("Schema mismatch on table '{table}': {detail}")]
	SchemaMismatch {
		table: String,
		detail: String,
	},

	/// A query declaration or stable name was registered twice
	#[error("Duplicate query registration for '{name}': {detail}")]
	DuplicateRegistration {
		name: String,
		detail: String,
	},

	/// A permission predicate failed while evaluating a row
	#[error("Permission evaluation failed on table '{table}': {message}")]
	PermissionEvaluation {
		table: String,
		message: String,
	},

	/// The server composition is inconsistent with its schema
	#[error("The server composition failed validation:\n{0}")]
	SchemaValidation(Violations),

	/// A subscription failed and has been closed
	#[error("Subscription {id} failed: {message}")]
	Subscription {
		id: String,
		message: String,
	},

	/// The caller is not allowed to perform the mutation
	#[error("Not enough permissions to {action} on table '{table}'")]
	Unauthorized {
		action: String,
		table: String,
	},

	/// No query is registered under the requested stable name
	#[error("No query is registered under the name '{name}'")]
	QueryNotFound {
		name: String,
	},

	/// No mutation action is registered under the requested name
	#[error("No mutation action is registered under the name '{name}'")]
	ActionNotFound {
		name: String,
	},

	/// A query parameter was missing, unknown, non-scalar or of the wrong kind
	#[error("Invalid query parameter '{name}': {message}")]
	InvalidParam {
		name: String,
		message: String,
	},

	/// The LIMIT clause must be a positive integer within the configured maximum
	#[error("Found {value} but the limit must be between 1 and {max}")]
	InvalidLimit {
		value: u64,
		max: u32,
	},

	/// An unbounded query produced more rows than the configured maximum
	#[error("The query produced more than {max} rows, specify a limit")]
	ResultTooLarge {
		max: usize,
	},

	/// A mutation targeted a row which does not exist
	#[error("The record '{key}' does not exist on table '{table}'")]
	RecordNotFound {
		table: String,
		key: String,
	},

	/// Related and existential sub-queries nested too deeply
	#[error("Reached excessive query depth limit: {0}")]
	MaxDepth(u32),

	/// There was a problem with the storage collaborator
	#[error("There was a problem with the underlying storage: {0}")]
	Storage(String),

	/// A mutation action failed while planning its writes
	#[error("The mutation action '{name}' failed: {message}")]
	Action {
		name: String,
		message: String,
	},

	/// The identity provider could not resolve the caller
	#[error("The caller identity could not be resolved: {0}")]
	InvalidIdentity(String),
}

impl Error {
	#[track_caller]
	pub fn unreachable<T: fmt::Display>(message: T) -> Error {
		let location = std::panic::Location::caller();
		let message = format!("{}:{}: {}", location.file(), location.line(), message);
		Error::Unreachable(message)
	}

	pub(crate) fn unknown_table(table: &str) -> Error {
		Error::SchemaMismatch {
			table: table.to_owned(),
			detail: "the table is not defined".to_owned(),
		}
	}

	pub(crate) fn unknown_field(table: &str, field: &str) -> Error {
		Error::SchemaMismatch {
			table: table.to_owned(),
			detail: format!("the field '{field}' is not defined"),
		}
	}

	pub(crate) fn unknown_relation(table: &str, relation: &str) -> Error {
		Error::SchemaMismatch {
			table: table.to_owned(),
			detail: format!("the relation '{relation}' is not defined"),
		}
	}

	/// Wraps a collaborator failure as a storage error
	pub fn storage(error: anyhow::Error) -> Error {
		Error::Storage(format!("{error:#}"))
	}

	/// Check if this error was raised while checking a query against the schema
	pub fn is_schema_related(&self) -> bool {
		matches!(self, Error::SchemaMismatch { .. } | Error::SchemaValidation(_))
	}
}

impl From<Error> for String {
	fn from(e: Error) -> String {
		e.to_string()
	}
}

impl Serialize for Error {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(self.to_string().as_str())
	}
}

/// A single inconsistency found while validating a server composition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
	/// What was being validated, for example `query 'allBookings'`
	pub subject: String,
	/// Why it failed
	pub message: String,
}

impl Display for Violation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}: {}", self.subject, self.message)
	}
}

/// Every inconsistency found while validating a server composition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
	pub fn push(&mut self, subject: impl Into<String>, message: impl Display) {
		self.0.push(Violation {
			subject: subject.into(),
			message: message.to_string(),
		});
	}

	/// Appends every violation from another list
	pub fn append(&mut self, other: Violations) {
		self.0.extend(other.0);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Violation> {
		self.0.iter()
	}
}

impl Display for Violations {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, v) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("\n")?;
			}
			write!(f, "  - {v}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn violations_are_listed_one_per_line() {
		let mut v = Violations::default();
		v.push("query 'a'", Error::unknown_table("nope"));
		v.push("model 'b'", "duplicate model");
		let e = Error::SchemaValidation(v);
		let s = e.to_string();
		assert!(s.contains("  - query 'a': Schema mismatch on table 'nope'"));
		assert!(s.contains("\n  - model 'b': duplicate model"));
	}

	#[test]
	fn unreachable_records_location() {
		let Error::Unreachable(msg) = Error::unreachable("boom") else {
			panic!("expected an unreachable error");
		};
		assert!(msg.contains("err/mod.rs"));
		assert!(msg.ends_with("boom"));
	}
}
