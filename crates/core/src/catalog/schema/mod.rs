use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::TableDefinition;
use crate::err::{Error, Result, Violations};

mod field;
mod relation;

pub use self::field::{FieldDefinition, Kind};
pub use self::relation::RelationDefinition;

/// The set of tables a server composition and its queries are bound to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
	tables: BTreeMap<String, Arc<TableDefinition>>,
}

impl Schema {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_table(mut self, table: TableDefinition) -> Self {
		self.define_table(table);
		self
	}

	/// Defines a table, replacing any existing definition with the same name
	pub fn define_table(&mut self, table: TableDefinition) {
		self.tables.insert(table.name.clone(), Arc::new(table));
	}

	pub fn table(&self, name: &str) -> Option<&TableDefinition> {
		self.tables.get(name).map(AsRef::as_ref)
	}

	/// Fetch a table definition, failing when the schema does not define it
	pub fn expect_table(&self, name: &str) -> Result<&TableDefinition> {
		self.table(name).ok_or_else(|| Error::unknown_table(name))
	}

	pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
		self.tables.values().map(AsRef::as_ref)
	}

	/// Checks that every primary key and relation refers to defined
	/// fields and tables.
	pub fn check(&self) -> Violations {
		let mut violations = Violations::default();
		for tb in self.tables() {
			let subject = format!("table '{}'", tb.name);
			if tb.primary_key.is_empty() {
				violations.push(&subject, "the primary key is empty");
			}
			for key in tb.primary_key.iter() {
				if let Err(e) = tb.expect_field(key) {
					violations.push(&subject, e);
				}
			}
			for rel in tb.relations() {
				if let Err(e) = tb.expect_field(&rel.source_field) {
					violations.push(&subject, e);
				}
				match self.expect_table(&rel.target_table) {
					Ok(target) => {
						if let Err(e) = target.expect_field(&rel.target_field) {
							violations.push(&subject, e);
						}
					}
					Err(e) => violations.push(&subject, e),
				}
			}
		}
		violations
	}
}
