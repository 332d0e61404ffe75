use std::sync::Arc;

use crate::catalog::{Schema, TableDefinition};
use crate::cnf::MAX_QUERY_DEPTH;
use crate::err::{Error, Result};
use crate::expr::{FilterClause, PermissionClause, Predicate, QueryDescriptor, server_where};
use crate::iam::Identity;
use crate::val::Row;

/// The entry point for declaring queries against a schema.
#[derive(Clone, Debug)]
pub struct QueryBuilder {
	schema: Arc<Schema>,
}

impl QueryBuilder {
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
		}
	}

	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	/// Starts a query over every row of a table
	pub fn table(&self, name: &str) -> Result<QueryDescriptor> {
		QueryDescriptor::new(self.schema.clone(), name, 0)
	}

	/// Wraps a predicate as a permission clause, checking that the table exists
	pub fn server_where<F>(&self, table: &str, predicate: F) -> Result<PermissionClause>
	where
		F: Fn(&Row, Option<&Identity>) -> anyhow::Result<Predicate> + Send + Sync + 'static,
	{
		self.schema.expect_table(table)?;
		Ok(server_where(table, predicate))
	}
}

/// Checks that every field, relation and permission a clause refers to
/// is defined on the table the clause is evaluated against.
pub(crate) fn check(
	schema: &Schema,
	table: &TableDefinition,
	clause: &FilterClause,
	depth: u32,
) -> Result<()> {
	match clause {
		FilterClause::Compare(v) => {
			table.expect_field(&v.field)?;
		}
		FilterClause::Not(v) => check(schema, table, v, depth)?,
		FilterClause::And(v) | FilterClause::Or(v) => {
			for c in v.iter() {
				check(schema, table, c, depth)?;
			}
		}
		FilterClause::Exists(v) => {
			if depth + 1 > *MAX_QUERY_DEPTH {
				return Err(Error::MaxDepth(*MAX_QUERY_DEPTH));
			}
			let rel = table.expect_relation(&v.relation)?;
			let target = schema.expect_table(&rel.target_table)?;
			for c in v.conditions.iter() {
				check(schema, target, c, depth + 1)?;
			}
		}
		FilterClause::Permission(v) => {
			if v.table() != table.name() {
				return Err(Error::SchemaMismatch {
					table: table.name().to_owned(),
					detail: format!("the permission clause is bound to the table '{}'", v.table()),
				});
			}
		}
		FilterClause::Constant(_) => {}
	}
	Ok(())
}
