use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Schema;
use crate::iam::Identity;
use crate::kvs::{RowChange, Write};
use crate::qry::Params;

/// A named server-side write operation.
///
/// Planning is pure: an action only describes the writes it wants, and
/// the server checks each of them against the model permissions before
/// any is applied.
pub trait MutationAction: Send + Sync {
	/// The name clients invoke the action by
	fn name(&self) -> &str;

	/// The table the action primarily writes to
	fn table(&self) -> &str;

	/// Plans the writes for a set of arguments and a caller
	fn plan(&self, args: &Params, identity: Option<&Identity>) -> anyhow::Result<Vec<Write>>;
}

/// Produces the mutation actions of a server from its schema.
pub trait MutationFactory: Send + Sync {
	fn actions(&self, schema: &Schema) -> Vec<Arc<dyn MutationAction>>;
}

impl<F> MutationFactory for F
where
	F: Fn(&Schema) -> Vec<Arc<dyn MutationAction>> + Send + Sync,
{
	fn actions(&self, schema: &Schema) -> Vec<Arc<dyn MutationAction>> {
		self(schema)
	}
}

pub type PlanFn = dyn Fn(&Params, Option<&Identity>) -> anyhow::Result<Vec<Write>> + Send + Sync;

/// A mutation action defined by a planning function
pub struct Mutation {
	name: String,
	table: String,
	plan: Box<PlanFn>,
}

impl Mutation {
	pub fn new<F>(name: impl Into<String>, table: impl Into<String>, plan: F) -> Self
	where
		F: Fn(&Params, Option<&Identity>) -> anyhow::Result<Vec<Write>> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			table: table.into(),
			plan: Box::new(plan),
		}
	}
}

impl MutationAction for Mutation {
	fn name(&self) -> &str {
		&self.name
	}

	fn table(&self) -> &str {
		&self.table
	}

	fn plan(&self, args: &Params, identity: Option<&Identity>) -> anyhow::Result<Vec<Write>> {
		(self.plan)(args, identity)
	}
}

impl fmt::Debug for Mutation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Mutation")
			.field("name", &self.name)
			.field("table", &self.table)
			.finish_non_exhaustive()
	}
}

/// The changes a successful mutation applied
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MutationOutcome {
	pub action: String,
	pub changes: Vec<RowChange>,
}
