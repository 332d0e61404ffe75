use std::collections::BTreeMap;

use crate::catalog::{FieldDefinition, RelationDefinition};
use crate::err::{Error, Result};
use crate::val::{Row, Value};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableDefinition {
	pub(crate) name: String,
	pub(crate) primary_key: Vec<String>,
	pub(crate) fields: BTreeMap<String, FieldDefinition>,
	pub(crate) relations: BTreeMap<String, RelationDefinition>,
	pub(crate) comment: Option<String>,
}

impl TableDefinition {
	/// Creates a table keyed by its `id` field
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			primary_key: vec!["id".to_owned()],
			fields: BTreeMap::new(),
			relations: BTreeMap::new(),
			comment: None,
		}
	}

	pub fn with_primary_key<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.primary_key = fields.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_field(mut self, field: FieldDefinition) -> Self {
		self.fields.insert(field.name.clone(), field);
		self
	}

	pub fn with_relation(mut self, relation: RelationDefinition) -> Self {
		self.relations.insert(relation.name.clone(), relation);
		self
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn primary_key(&self) -> &[String] {
		&self.primary_key
	}

	pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
		self.fields.values()
	}

	pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
		self.relations.values()
	}

	pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
		self.fields.get(name)
	}

	pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
		self.relations.get(name)
	}

	/// Fetch a field definition, failing when the table does not define it
	pub fn expect_field(&self, name: &str) -> Result<&FieldDefinition> {
		self.field(name).ok_or_else(|| Error::unknown_field(&self.name, name))
	}

	/// Fetch a relation definition, failing when the table does not define it
	pub fn expect_relation(&self, name: &str) -> Result<&RelationDefinition> {
		self.relation(name).ok_or_else(|| Error::unknown_relation(&self.name, name))
	}

	/// The primary key of a row. Single-field keys are returned as the
	/// field value, compound keys as an array of the field values.
	pub fn key_of(&self, row: &Row) -> Value {
		match self.primary_key.as_slice() {
			[single] => row.pick(single).clone(),
			fields => Value::Array(fields.iter().map(|f| row.pick(f).clone()).collect()),
		}
	}

	/// Checks that a row about to be written only holds defined fields
	/// with values of the declared kinds, and carries its primary key.
	pub fn check_row(&self, row: &Row) -> Result<()> {
		for (name, value) in row.iter() {
			let field = self.expect_field(name)?;
			if !field.allows(value) {
				return Err(Error::SchemaMismatch {
					table: self.name.clone(),
					detail: format!(
						"the field '{name}' expects {} but found {}",
						field.kind,
						value.kindof()
					),
				});
			}
		}
		for field in self.fields.values() {
			if !field.optional && row.pick(&field.name).is_null() {
				return Err(Error::SchemaMismatch {
					table: self.name.clone(),
					detail: format!("the field '{}' is required", field.name),
				});
			}
		}
		for key in self.primary_key.iter() {
			if row.pick(key).is_null() {
				return Err(Error::SchemaMismatch {
					table: self.name.clone(),
					detail: format!("the primary key field '{key}' is missing"),
				});
			}
		}
		Ok(())
	}
}

impl std::fmt::Display for TableDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "DEFINE TABLE {} KEY ({})", self.name, self.primary_key.join(", "))?;
		if let Some(ref v) = self.comment {
			write!(f, " COMMENT {}", Value::from(v.as_str()))?
		}
		Ok(())
	}
}
