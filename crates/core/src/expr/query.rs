use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Schema, TableDefinition};
use crate::cnf::{MAX_QUERY_DEPTH, MAX_QUERY_LIMIT};
use crate::err::{Error, Result};
use crate::expr::builder::check;
use crate::expr::{Direction, Environment, FilterClause, Operator, Order, cmp, exists_in};
use crate::val::Value;

/// Whether a query yields a single row or a list of rows
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
	One,
	#[default]
	Many,
}

/// An immutable, structural description of a query.
///
/// Every method returns a new descriptor and leaves the original
/// untouched. Two descriptors are equal when their structure is equal.
#[derive(Clone, Debug)]
pub struct QueryDescriptor {
	schema: Arc<Schema>,
	depth: u32,
	table: String,
	filters: Vec<FilterClause>,
	order: Vec<Order>,
	limit: Option<u32>,
	cardinality: Cardinality,
	related: BTreeMap<String, QueryDescriptor>,
}

impl PartialEq for QueryDescriptor {
	fn eq(&self, other: &Self) -> bool {
		self.table == other.table
			&& self.filters == other.filters
			&& self.order == other.order
			&& self.limit == other.limit
			&& self.cardinality == other.cardinality
			&& self.related == other.related
	}
}

impl QueryDescriptor {
	pub(crate) fn new(schema: Arc<Schema>, table: &str, depth: u32) -> Result<Self> {
		if depth > *MAX_QUERY_DEPTH {
			return Err(Error::MaxDepth(*MAX_QUERY_DEPTH));
		}
		schema.expect_table(table)?;
		Ok(Self {
			schema,
			depth,
			table: table.to_owned(),
			filters: Vec::new(),
			order: Vec::new(),
			limit: None,
			cardinality: Cardinality::Many,
			related: BTreeMap::new(),
		})
	}

	fn definition(&self) -> Result<&TableDefinition> {
		self.schema.expect_table(&self.table)
	}

	// -----------------------------------
	// Building
	// -----------------------------------

	/// Adds a comparison which every returned row must satisfy
	pub fn filter(&self, field: &str, op: Operator, value: impl Into<Value>) -> Result<Self> {
		self.filter_by(cmp(field, op, value))
	}

	/// Adds a clause which every returned row must satisfy
	pub fn filter_by(&self, clause: impl Into<FilterClause>) -> Result<Self> {
		let clause = clause.into();
		check(&self.schema, self.definition()?, &clause, self.depth)?;
		let mut out = self.clone();
		out.filters.push(clause);
		Ok(out)
	}

	/// Adds an existential condition over a relation of this table
	pub fn where_exists<F>(&self, relation: &str, build: F) -> Result<Self>
	where
		F: FnOnce(QueryDescriptor) -> Result<QueryDescriptor>,
	{
		let clause = self.exists(relation, build)?;
		let mut out = self.clone();
		out.filters.push(clause);
		Ok(out)
	}

	/// Builds an existential clause over a relation of this table, for
	/// use inside a larger clause. Only the filters of the nested query
	/// are kept.
	pub fn exists<F>(&self, relation: &str, build: F) -> Result<FilterClause>
	where
		F: FnOnce(QueryDescriptor) -> Result<QueryDescriptor>,
	{
		let sub = self.nested(relation, build)?;
		Ok(exists_in(relation, sub.filters))
	}

	pub fn order_by(&self, field: &str, direction: Direction) -> Result<Self> {
		self.definition()?.expect_field(field)?;
		let mut out = self.clone();
		out.order.push(Order::new(field, direction));
		Ok(out)
	}

	/// Caps the number of returned rows
	pub fn limit(&self, n: u32) -> Result<Self> {
		if n == 0 || n > *MAX_QUERY_LIMIT {
			return Err(Error::InvalidLimit {
				value: n as u64,
				max: *MAX_QUERY_LIMIT,
			});
		}
		let mut out = self.clone();
		out.limit = Some(match self.cardinality {
			Cardinality::One => 1,
			Cardinality::Many => n,
		});
		Ok(out)
	}

	/// Yields at most one row
	pub fn one(&self) -> Self {
		let mut out = self.clone();
		out.cardinality = Cardinality::One;
		out.limit = Some(1);
		out
	}

	/// Nests a query over a relation of this table. The nested query is
	/// scoped independently and does not inherit any parent filters.
	pub fn related<F>(&self, relation: &str, build: F) -> Result<Self>
	where
		F: FnOnce(QueryDescriptor) -> Result<QueryDescriptor>,
	{
		let sub = self.nested(relation, build)?;
		let mut out = self.clone();
		out.related.insert(relation.to_owned(), sub);
		Ok(out)
	}

	fn nested<F>(&self, relation: &str, build: F) -> Result<QueryDescriptor>
	where
		F: FnOnce(QueryDescriptor) -> Result<QueryDescriptor>,
	{
		let rel = self.definition()?.expect_relation(relation)?;
		let sub = QueryDescriptor::new(self.schema.clone(), &rel.target_table, self.depth + 1)?;
		let sub = build(sub)?;
		if sub.table != rel.target_table {
			return Err(Error::SchemaMismatch {
				table: self.table.clone(),
				detail: format!(
					"the relation '{relation}' targets '{}' but the nested query reads '{}'",
					rel.target_table, sub.table
				),
			});
		}
		Ok(sub)
	}

	/// Compiles this descriptor for an environment.
	pub fn compile(&self, env: Environment) -> Self {
		let mut out = self.clone();
		out.filters = self.filters.iter().map(|c| c.compile(env)).collect();
		out.related = self.related.iter().map(|(k, v)| (k.clone(), v.compile(env))).collect();
		out
	}

	// -----------------------------------
	// Inspection
	// -----------------------------------

	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	pub fn table_name(&self) -> &str {
		&self.table
	}

	pub fn filters(&self) -> &[FilterClause] {
		&self.filters
	}

	pub fn sort(&self) -> &[Order] {
		&self.order
	}

	pub fn row_limit(&self) -> Option<u32> {
		self.limit
	}

	pub fn cardinality(&self) -> Cardinality {
		self.cardinality
	}

	pub fn relations(&self) -> &BTreeMap<String, QueryDescriptor> {
		&self.related
	}

	pub(crate) fn depth(&self) -> u32 {
		self.depth
	}

	/// Check if a permission clause appears in this query or a nested one
	pub fn has_permission(&self) -> bool {
		self.filters.iter().any(FilterClause::has_permission)
			|| self.related.values().any(QueryDescriptor::has_permission)
	}

	/// Check if an existential clause appears in this query or a nested one
	pub fn has_exists(&self) -> bool {
		self.filters.iter().any(FilterClause::has_exists)
			|| self.related.values().any(QueryDescriptor::has_exists)
	}
}

impl Display for QueryDescriptor {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("SELECT * FROM ")?;
		if self.cardinality == Cardinality::One {
			f.write_str("ONLY ")?;
		}
		f.write_str(&self.table)?;
		for (i, c) in self.filters.iter().enumerate() {
			f.write_str(if i == 0 {
				" WHERE "
			} else {
				" AND "
			})?;
			write!(f, "{c}")?;
		}
		for (i, o) in self.order.iter().enumerate() {
			f.write_str(if i == 0 {
				" ORDER BY "
			} else {
				", "
			})?;
			write!(f, "{o}")?;
		}
		if let Some(v) = self.limit {
			write!(f, " LIMIT {v}")?;
		}
		for (name, sub) in self.related.iter() {
			write!(f, " FETCH {name} ({sub})")?;
		}
		Ok(())
	}
}
