use futures::future::BoxFuture;

use crate::catalog::Schema;
use crate::cnf::MAX_QUERY_DEPTH;
use crate::doc::PermissionReporter;
use crate::doc::check;
use crate::err::{Error, Result};
use crate::expr::builder;
use crate::expr::{Environment, FilterClause, Operator, Predicate, and, cmp};
use crate::iam::Identity;
use crate::kvs::{ScanRequest, Storage};
use crate::val::Row;

/// Everything needed to evaluate clauses against rows on behalf of a
/// caller.
#[derive(Clone, Copy)]
pub(crate) struct Context<'a> {
	pub env: Environment,
	pub schema: &'a Schema,
	pub storage: &'a dyn Storage,
	pub identity: Option<&'a Identity>,
	pub reporter: &'a dyn PermissionReporter,
}

impl<'a> Context<'a> {
	/// Check whether a row satisfies every clause. A permission predicate
	/// which fails denies the row, and is handed to the reporter.
	pub async fn allows(&self, table: &str, clauses: &[FilterClause], row: &Row) -> Result<bool> {
		match self.all(table, clauses, row, 0).await {
			Ok(v) => Ok(v),
			Err(e @ Error::PermissionEvaluation { .. }) => {
				self.reporter.report(table, &e);
				Ok(false)
			}
			Err(e) => Err(e),
		}
	}

	fn all<'b>(
		&'b self,
		table: &'b str,
		clauses: &'b [FilterClause],
		row: &'b Row,
		depth: u32,
	) -> BoxFuture<'b, Result<bool>> {
		Box::pin(async move {
			for clause in clauses {
				if !self.matches(table, clause, row, depth).await? {
					return Ok(false);
				}
			}
			Ok(true)
		})
	}

	fn matches<'b>(
		&'b self,
		table: &'b str,
		clause: &'b FilterClause,
		row: &'b Row,
		depth: u32,
	) -> BoxFuture<'b, Result<bool>> {
		Box::pin(async move {
			if depth > *MAX_QUERY_DEPTH {
				return Err(Error::MaxDepth(*MAX_QUERY_DEPTH));
			}
			match clause {
				FilterClause::Compare(v) => check::compare_row(row, v),
				FilterClause::Constant(v) => Ok(*v),
				FilterClause::Not(v) => Ok(!self.matches(table, v, row, depth).await?),
				FilterClause::And(v) => self.all(table, v, row, depth).await,
				FilterClause::Or(v) => {
					for c in v.iter() {
						if self.matches(table, c, row, depth).await? {
							return Ok(true);
						}
					}
					Ok(false)
				}
				FilterClause::Exists(v) => {
					let tb = self.schema.expect_table(table)?;
					let rel = tb.expect_relation(&v.relation)?;
					let source = row.pick(&rel.source_field);
					if source.is_null() {
						return Ok(false);
					}
					// Only the rows linked to this one are read
					let mut pushdown = vec![cmp(&rel.target_field, Operator::Equal, source.clone())];
					pushdown.extend(FilterClause::pushdown(&v.conditions));
					let exact = v.conditions.iter().all(FilterClause::is_pushdown);
					let req = ScanRequest {
						table: rel.target_table.clone(),
						filter: Some(and(pushdown)),
						order: Vec::new(),
						limit: exact.then_some(1),
					};
					let rows = self.storage.scan(&req).await.map_err(Error::storage)?;
					for candidate in rows.iter() {
						if self.all(&rel.target_table, &v.conditions, candidate, depth + 1).await? {
							return Ok(true);
						}
					}
					Ok(false)
				}
				FilterClause::Permission(v) => {
					match v.evaluate(self.env, row, self.identity)? {
						Predicate::Boolean(b) => Ok(b),
						Predicate::Clause(c) => {
							let tb = self.schema.expect_table(table)?;
							let out = match builder::check(self.schema, tb, &c, depth) {
								Ok(()) => self.matches(table, &c, row, depth + 1).await,
								Err(e) => Err(e),
							};
							// Anything that goes wrong inside a predicate's clause
							// is a failure of that predicate
							out.map_err(|e| match e {
								Error::Storage(_) | Error::PermissionEvaluation { .. } => e,
								e => Error::PermissionEvaluation {
									table: v.table().to_owned(),
									message: e.to_string(),
								},
							})
						}
					}
				}
			}
		})
	}
}
