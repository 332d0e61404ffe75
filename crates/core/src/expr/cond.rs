use std::fmt::{self, Display, Formatter, Write};

use crate::catalog::Schema;
use crate::expr::{Environment, Operator, PermissionClause};
use crate::val::Value;

/// A single comparison between a row field and a value
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
	pub field: String,
	pub op: Operator,
	pub value: Value,
}

/// Matches when at least one row reached through a relation satisfies
/// every nested condition
#[derive(Clone, Debug, PartialEq)]
pub struct ExistsClause {
	pub relation: String,
	pub conditions: Vec<FilterClause>,
}

/// A boolean condition over a row.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterClause {
	Compare(Comparison),
	Not(Box<FilterClause>),
	And(Vec<FilterClause>),
	Or(Vec<FilterClause>),
	Exists(ExistsClause),
	Permission(PermissionClause),
	Constant(bool),
}

pub fn cmp(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> FilterClause {
	FilterClause::Compare(Comparison {
		field: field.into(),
		op,
		value: value.into(),
	})
}

pub fn and<I: IntoIterator<Item = FilterClause>>(clauses: I) -> FilterClause {
	FilterClause::And(clauses.into_iter().collect())
}

pub fn or<I: IntoIterator<Item = FilterClause>>(clauses: I) -> FilterClause {
	FilterClause::Or(clauses.into_iter().collect())
}

pub fn not(clause: impl Into<FilterClause>) -> FilterClause {
	FilterClause::Not(Box::new(clause.into()))
}

pub fn exists_in<I>(relation: impl Into<String>, conditions: I) -> FilterClause
where
	I: IntoIterator<Item = FilterClause>,
{
	FilterClause::Exists(ExistsClause {
		relation: relation.into(),
		conditions: conditions.into_iter().collect(),
	})
}

pub fn constant(v: bool) -> FilterClause {
	FilterClause::Constant(v)
}

impl FilterClause {
	/// Check if a permission clause appears anywhere in this clause
	pub fn has_permission(&self) -> bool {
		self.any(&|c| matches!(c, FilterClause::Permission(_)))
	}

	/// Check if an existential sub-query appears anywhere in this clause
	pub fn has_exists(&self) -> bool {
		self.any(&|c| matches!(c, FilterClause::Exists(_)))
	}

	/// Check if this clause can be handed to storage as it stands.
	/// Storage only evaluates comparisons and their boolean combinations.
	pub fn is_pushdown(&self) -> bool {
		!self.any(&|c| matches!(c, FilterClause::Exists(_) | FilterClause::Permission(_)))
	}

	/// Check if evaluating this clause against a row of `table` may read
	/// rows of `target`. Permission clauses are only known once they run,
	/// so they may read any table.
	pub(crate) fn reads(&self, schema: &Schema, table: &str, target: &str) -> bool {
		match self {
			FilterClause::Compare(_) | FilterClause::Constant(_) => false,
			FilterClause::Permission(_) => true,
			FilterClause::Not(v) => v.reads(schema, table, target),
			FilterClause::And(v) | FilterClause::Or(v) => {
				v.iter().any(|c| c.reads(schema, table, target))
			}
			FilterClause::Exists(v) => {
				let Some(rel) = schema.table(table).and_then(|t| t.relation(&v.relation)) else {
					return true;
				};
				rel.target_table == target
					|| v.conditions.iter().any(|c| c.reads(schema, &rel.target_table, target))
			}
		}
	}

	fn any(&self, check: &dyn Fn(&FilterClause) -> bool) -> bool {
		if check(self) {
			return true;
		}
		match self {
			FilterClause::Not(v) => v.any(check),
			FilterClause::And(v) | FilterClause::Or(v) => v.iter().any(|c| c.any(check)),
			FilterClause::Exists(v) => v.conditions.iter().any(|c| c.any(check)),
			_ => false,
		}
	}

	/// Compiles this clause for an environment. Client replicas replace
	/// every permission clause with a constant true value.
	pub fn compile(&self, env: Environment) -> FilterClause {
		match (env, self) {
			(Environment::Server, _) => self.clone(),
			(Environment::Client, FilterClause::Permission(_)) => FilterClause::Constant(true),
			(Environment::Client, FilterClause::Not(v)) => FilterClause::Not(Box::new(v.compile(env))),
			(Environment::Client, FilterClause::And(v)) => {
				FilterClause::And(v.iter().map(|c| c.compile(env)).collect())
			}
			(Environment::Client, FilterClause::Or(v)) => {
				FilterClause::Or(v.iter().map(|c| c.compile(env)).collect())
			}
			(Environment::Client, FilterClause::Exists(v)) => FilterClause::Exists(ExistsClause {
				relation: v.relation.clone(),
				conditions: v.conditions.iter().map(|c| c.compile(env)).collect(),
			}),
			(Environment::Client, v) => v.clone(),
		}
	}

	/// Splits a list of conjuncts into the ones storage can evaluate,
	/// flattening nested conjunctions on the way.
	pub(crate) fn pushdown(clauses: &[FilterClause]) -> Vec<FilterClause> {
		let mut out = Vec::new();
		for clause in clauses {
			match clause {
				FilterClause::And(v) => out.extend(Self::pushdown(v)),
				v if v.is_pushdown() => out.push(v.clone()),
				_ => {}
			}
		}
		out
	}
}

impl From<PermissionClause> for FilterClause {
	fn from(v: PermissionClause) -> Self {
		FilterClause::Permission(v)
	}
}

impl From<bool> for FilterClause {
	fn from(v: bool) -> Self {
		FilterClause::Constant(v)
	}
}

impl From<Comparison> for FilterClause {
	fn from(v: Comparison) -> Self {
		FilterClause::Compare(v)
	}
}

fn join(f: &mut Formatter, clauses: &[FilterClause], sep: &str, empty: &str) -> fmt::Result {
	if clauses.is_empty() {
		return f.write_str(empty);
	}
	f.write_char('(')?;
	for (i, c) in clauses.iter().enumerate() {
		if i > 0 {
			f.write_str(sep)?;
		}
		write!(f, "{c}")?;
	}
	f.write_char(')')
}

impl Display for FilterClause {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			FilterClause::Compare(v) => write!(f, "{} {} {}", v.field, v.op, v.value),
			FilterClause::Not(v) => write!(f, "!({v})"),
			FilterClause::And(v) => join(f, v, " AND ", "true"),
			FilterClause::Or(v) => join(f, v, " OR ", "false"),
			FilterClause::Exists(v) => {
				write!(f, "EXISTS {}", v.relation)?;
				if !v.conditions.is_empty() {
					f.write_str(" WHERE ")?;
					join(f, &v.conditions, " AND ", "true")?;
				}
				Ok(())
			}
			FilterClause::Permission(v) => write!(f, "{v}"),
			FilterClause::Constant(v) => write!(f, "{v}"),
		}
	}
}
