use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::catalog::{ModelDefinition, Permission, Permissions, Schema, TableDefinition};
use crate::cnf::MAX_RESULT_ROWS;
use crate::doc::{Context, LogReporter, PermissionReporter};
use crate::err::{Error, Result};
use crate::expr::{Cardinality, Environment, FilterClause, Operator, QueryDescriptor, and, cmp};
use crate::iam::Identity;
use crate::kvs::{ScanRequest, Storage};
use crate::val::{Row, Value};

/// The rows a query produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
	pub cardinality: Cardinality,
	pub rows: Vec<Row>,
}

impl Snapshot {
	/// The first row, for single-row queries
	pub fn first(&self) -> Option<&Row> {
		self.rows.first()
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// The result as a single value: an object or NULL for single-row
	/// queries, an array otherwise
	pub fn into_value(self) -> Value {
		match self.cardinality {
			Cardinality::One => self.rows.into_iter().next().map(Value::Object).unwrap_or_default(),
			Cardinality::Many => Value::Array(self.rows.into_iter().map(Value::Object).collect()),
		}
	}
}

/// Runs query descriptors against storage in an environment.
///
/// On the server every row is checked against the query's permission
/// clauses and its table's `select` permission. On a client replica
/// permission clauses are compiled away.
#[derive(Clone)]
pub struct Executor {
	env: Environment,
	schema: Arc<Schema>,
	storage: Arc<dyn Storage>,
	models: Arc<BTreeMap<String, ModelDefinition>>,
	reporter: Arc<dyn PermissionReporter>,
}

impl Executor {
	/// An executor for a client replica
	pub fn client(storage: Arc<dyn Storage>, schema: Arc<Schema>) -> Self {
		Self {
			env: Environment::Client,
			schema,
			storage,
			models: Arc::new(BTreeMap::new()),
			reporter: Arc::new(LogReporter),
		}
	}

	pub(crate) fn server(
		schema: Arc<Schema>,
		storage: Arc<dyn Storage>,
		models: Arc<BTreeMap<String, ModelDefinition>>,
		reporter: Arc<dyn PermissionReporter>,
	) -> Self {
		Self {
			env: Environment::Server,
			schema,
			storage,
			models,
			reporter,
		}
	}

	pub fn environment(&self) -> Environment {
		self.env
	}

	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
		&self.storage
	}

	pub(crate) fn context<'a>(&'a self, identity: Option<&'a Identity>) -> Context<'a> {
		Context {
			env: self.env,
			schema: &self.schema,
			storage: self.storage.as_ref(),
			identity,
			reporter: self.reporter.as_ref(),
		}
	}

	/// The model permissions of a table. Tables without a model are
	/// fully accessible.
	pub(crate) fn permissions(&self, table: &str) -> Permissions {
		self.models.get(table).map(|m| m.permissions.clone()).unwrap_or_default()
	}

	/// Runs a query on behalf of a caller
	pub async fn execute(
		&self,
		query: &QueryDescriptor,
		identity: Option<&Identity>,
	) -> Result<Snapshot> {
		let rows = self.rows(query, identity).await?;
		Ok(Snapshot {
			cardinality: query.cardinality(),
			rows,
		})
	}

	pub(crate) async fn rows(
		&self,
		query: &QueryDescriptor,
		identity: Option<&Identity>,
	) -> Result<Vec<Row>> {
		let query = query.compile(self.env);
		self.select(&query, None, identity).await
	}

	/// Check whether a single row belongs to the top level of a query's
	/// result set, ignoring its limit
	pub(crate) async fn visible(
		&self,
		query: &QueryDescriptor,
		row: &Row,
		identity: Option<&Identity>,
	) -> Result<bool> {
		let query = query.compile(self.env);
		let clauses = self.clauses(&query, None);
		self.context(identity).allows(query.table_name(), &clauses, row).await
	}

	/// Fetch a row by its primary key, with no permission applied
	pub(crate) async fn fetch(&self, table: &TableDefinition, key: &Value) -> Result<Option<Row>> {
		let filter = match (table.primary_key(), key) {
			([single], key) => cmp(single, Operator::Equal, key.clone()),
			(fields, Value::Array(parts)) if fields.len() == parts.len() => {
				and(fields.iter().zip(parts.iter()).map(|(f, v)| cmp(f, Operator::Equal, v.clone())))
			}
			_ => return Ok(None),
		};
		let req = ScanRequest {
			table: table.name().to_owned(),
			filter: Some(filter),
			order: Vec::new(),
			limit: Some(1),
		};
		let rows = self.storage.scan(&req).await.map_err(Error::storage)?;
		Ok(rows.into_iter().next())
	}

	fn clauses(&self, query: &QueryDescriptor, scope: Option<FilterClause>) -> Vec<FilterClause> {
		let mut clauses: Vec<FilterClause> = scope.into_iter().collect();
		clauses.extend(query.filters().iter().cloned());
		if self.env == Environment::Server {
			match self.permissions(query.table_name()).select {
				Permission::Full => {}
				p => clauses.push(p.to_clause()),
			}
		}
		clauses
	}

	fn select<'a>(
		&'a self,
		query: &'a QueryDescriptor,
		scope: Option<FilterClause>,
		identity: Option<&'a Identity>,
	) -> BoxFuture<'a, Result<Vec<Row>>> {
		Box::pin(async move {
			let table = query.table_name();
			let clauses = self.clauses(query, scope);
			// Storage is handed the conjuncts it can evaluate by itself
			let pushdown = FilterClause::pushdown(&clauses);
			let exact = clauses.iter().all(FilterClause::is_pushdown);
			let max = *MAX_RESULT_ROWS;
			let limit = query.row_limit().map(|v| v as usize);
			let req = ScanRequest {
				table: table.to_owned(),
				filter: (!pushdown.is_empty()).then(|| and(pushdown)),
				order: query.sort().to_vec(),
				limit: exact.then(|| limit.unwrap_or(max + 1)),
			};
			if let Some(ref f) = req.filter {
				trace!("Scanning '{table}' with {f} pushed down for {query}");
			}
			let candidates = self.storage.scan(&req).await.map_err(Error::storage)?;
			let ctx = self.context(identity);
			let mut out = Vec::new();
			for row in candidates {
				if !ctx.allows(table, &clauses, &row).await? {
					continue;
				}
				out.push(row);
				match limit {
					Some(l) if out.len() >= l => break,
					None if out.len() > max => {
						return Err(Error::ResultTooLarge {
							max,
						});
					}
					_ => {}
				}
			}
			if !query.relations().is_empty() {
				let tb = self.schema.expect_table(table)?;
				for row in out.iter_mut() {
					for (name, sub) in query.relations() {
						let rel = tb.expect_relation(name)?;
						let source = row.pick(&rel.source_field).clone();
						let rows = if source.is_null() {
							Vec::new()
						} else {
							let scope = cmp(&rel.target_field, Operator::Equal, source);
							self.select(sub, Some(scope), identity).await?
						};
						let value = match sub.cardinality() {
							Cardinality::One => rows.into_iter().next().map(Value::Object).unwrap_or_default(),
							Cardinality::Many => Value::Array(rows.into_iter().map(Value::Object).collect()),
						};
						row.insert(name.clone(), value);
					}
				}
			}
			Ok(out)
		})
	}
}
