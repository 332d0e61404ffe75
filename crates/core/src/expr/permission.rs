use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::err::{Error, Result};
use crate::expr::FilterClause;
use crate::iam::Identity;
use crate::val::Row;

/// Where a compiled query is about to run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Environment {
	/// The authoritative server, which enforces permission clauses
	#[default]
	Server,
	/// A client replica, which treats permission clauses as always true
	Client,
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Server => f.write_str("server"),
			Self::Client => f.write_str("client"),
		}
	}
}

/// The outcome of a permission predicate for one row.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
	/// The row is allowed, or denied, outright
	Boolean(bool),
	/// The row is allowed when it matches the clause
	Clause(FilterClause),
}

impl From<bool> for Predicate {
	fn from(v: bool) -> Self {
		Self::Boolean(v)
	}
}

impl From<FilterClause> for Predicate {
	fn from(v: FilterClause) -> Self {
		Self::Clause(v)
	}
}

/// A permission predicate, invoked with the row under evaluation and the
/// caller, who is `None` when anonymous.
pub type PredicateFn = dyn Fn(&Row, Option<&Identity>) -> anyhow::Result<Predicate> + Send + Sync;

/// A row-level access rule bound to a table, enforced by the server
/// and bypassed by client replicas.
///
/// Two clauses are equal when they are bound to the same table and were
/// built from the same closure expression. The values a closure captures
/// are not compared, so two rules built by one constructor for different
/// captured ids are equal. Use [`PermissionClause::same_predicate`] to
/// check whether two clauses share one predicate instance.
#[derive(Clone)]
pub struct PermissionClause {
	table: String,
	predicate: Arc<PredicateFn>,
	kind: TypeId,
}

/// Wraps a predicate as a permission clause on a table.
///
/// ```
/// use syncline_core::expr::{Operator, Predicate, cmp, server_where};
///
/// let own_bookings = server_where("booking", |_, who| {
/// 	Ok(match who {
/// 		Some(who) => Predicate::from(cmp("owner", Operator::Equal, who.id_value())),
/// 		None => Predicate::from(false),
/// 	})
/// });
/// assert_eq!(own_bookings.table(), "booking");
/// ```
pub fn server_where<F>(table: impl Into<String>, predicate: F) -> PermissionClause
where
	F: Fn(&Row, Option<&Identity>) -> anyhow::Result<Predicate> + Send + Sync + 'static,
{
	PermissionClause {
		table: table.into(),
		predicate: Arc::new(predicate),
		kind: TypeId::of::<F>(),
	}
}

impl PermissionClause {
	/// The table this clause is bound to
	pub fn table(&self) -> &str {
		&self.table
	}

	/// Check if both clauses invoke the very same predicate instance
	pub fn same_predicate(&self, other: &PermissionClause) -> bool {
		self.table == other.table && Arc::ptr_eq(&self.predicate, &other.predicate)
	}

	/// Evaluates the predicate for a row.
	///
	/// Client replicas receive `Boolean(true)` without the predicate
	/// being invoked. On the server, a predicate which fails or panics
	/// yields a [`Error::PermissionEvaluation`].
	pub fn evaluate(
		&self,
		env: Environment,
		row: &Row,
		identity: Option<&Identity>,
	) -> Result<Predicate> {
		if env == Environment::Client {
			return Ok(Predicate::Boolean(true));
		}
		match catch_unwind(AssertUnwindSafe(|| (self.predicate)(row, identity))) {
			Ok(Ok(v)) => Ok(v),
			Ok(Err(e)) => Err(Error::PermissionEvaluation {
				table: self.table.clone(),
				message: format!("{e:#}"),
			}),
			Err(panic) => Err(Error::PermissionEvaluation {
				table: self.table.clone(),
				message: panic_message(panic.as_ref()),
			}),
		}
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(v) = panic.downcast_ref::<&str>() {
		format!("the predicate panicked: {v}")
	} else if let Some(v) = panic.downcast_ref::<String>() {
		format!("the predicate panicked: {v}")
	} else {
		"the predicate panicked".to_owned()
	}
}

impl PartialEq for PermissionClause {
	fn eq(&self, other: &Self) -> bool {
		self.table == other.table && self.kind == other.kind
	}
}

impl fmt::Debug for PermissionClause {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("PermissionClause").field("table", &self.table).finish_non_exhaustive()
	}
}

impl fmt::Display for PermissionClause {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "PERMISSION({})", self.table)
	}
}
