use std::fmt::{self, Display};

use crate::catalog::Permissions;
use crate::err::{Error, Result};
use crate::val::Value;

/// A data model: a table exposed through the server together with the
/// row-level permissions guarding it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelDefinition {
	pub table: String,
	pub permissions: Permissions,
	pub comment: Option<String>,
}

impl ModelDefinition {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			..Default::default()
		}
	}

	pub fn with_permissions(mut self, permissions: Permissions) -> Self {
		self.permissions = permissions;
		self
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	/// Checks that every permission clause is bound to this model's table
	pub(crate) fn check(&self) -> Result<()> {
		for clause in self.permissions.clauses() {
			if clause.table() != self.table {
				return Err(Error::SchemaMismatch {
					table: self.table.clone(),
					detail: format!(
						"the permission clause is bound to the table '{}'",
						clause.table()
					),
				});
			}
		}
		Ok(())
	}
}

impl Display for ModelDefinition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "DEFINE MODEL {} {}", self.table, self.permissions)?;
		if let Some(ref v) = self.comment {
			write!(f, " COMMENT {}", Value::from(v.as_str()))?
		}
		Ok(())
	}
}
