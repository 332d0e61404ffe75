use std::fmt;

use serde::{Deserialize, Serialize};

/// A named link from a row of one table to the rows of another.
///
/// A related row in `target_table` belongs to a source row when its
/// `target_field` equals the source row's `source_field`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RelationDefinition {
	pub name: String,
	pub source_field: String,
	pub target_table: String,
	pub target_field: String,
}

impl RelationDefinition {
	pub fn new(
		name: impl Into<String>,
		source_field: impl Into<String>,
		target_table: impl Into<String>,
		target_field: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			source_field: source_field.into(),
			target_table: target_table.into(),
			target_field: target_field.into(),
		}
	}
}

impl fmt::Display for RelationDefinition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"RELATION {} ({} -> {}.{})",
			self.name, self.source_field, self.target_table, self.target_field
		)
	}
}
