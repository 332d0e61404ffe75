use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::catalog::{ModelDefinition, PermissionKind, Schema, TableDefinition};
use crate::cnf::{NOTIFICATION_BUFFER, SERVER_NAME};
use crate::dbs::subscription::Lives;
use crate::dbs::validate::validate;
use crate::dbs::{
	Delta, Executor, MutationAction, MutationFactory, MutationOutcome, Session, Snapshot,
	Subscription,
};
use crate::doc::{LogReporter, PermissionReporter};
use crate::err::{Error, Result};
use crate::expr::{QueryBuilder, QueryDescriptor};
use crate::iam::Identity;
use crate::kvs::{Storage, Write};
use crate::qry::{Params, QueryKey, Registry};
use crate::val::{Row, Value};

const TARGET: &str = "syncline::core::dbs";

/// Rows written by the part of a batch checked so far, by table and key
type Staged = BTreeMap<(String, String), Option<Row>>;

/// Everything a server is composed of.
pub struct ServerConfig {
	pub schema: Arc<Schema>,
	pub storage: Arc<dyn Storage>,
	pub registry: Arc<Registry>,
	pub models: Vec<ModelDefinition>,
	pub mutations: Vec<Arc<dyn MutationFactory>>,
	pub reporter: Arc<dyn PermissionReporter>,
	/// How many notifications each subscription may queue, 0 for no bound
	pub notification_buffer: usize,
}

impl ServerConfig {
	pub fn new(schema: Arc<Schema>, storage: Arc<dyn Storage>) -> Self {
		Self {
			schema,
			storage,
			registry: Arc::new(Registry::new()),
			models: Vec::new(),
			mutations: Vec::new(),
			reporter: Arc::new(LogReporter),
			notification_buffer: *NOTIFICATION_BUFFER,
		}
	}

	pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
		self.registry = registry;
		self
	}

	pub fn with_model(mut self, model: ModelDefinition) -> Self {
		self.models.push(model);
		self
	}

	pub fn with_mutations(mut self, factory: impl MutationFactory + 'static) -> Self {
		self.mutations.push(Arc::new(factory));
		self
	}

	pub fn with_reporter(mut self, reporter: Arc<dyn PermissionReporter>) -> Self {
		self.reporter = reporter;
		self
	}

	pub fn with_notification_buffer(mut self, size: usize) -> Self {
		self.notification_buffer = size;
		self
	}
}

/// The authoritative endpoint answering queries, subscriptions and
/// mutations for a composition that was validated as a whole.
pub struct Server {
	registry: Arc<Registry>,
	builder: QueryBuilder,
	actions: BTreeMap<String, Arc<dyn MutationAction>>,
	executor: Executor,
	lives: Lives,
	buffer: usize,
}

impl Server {
	/// Composes a server, failing with every inconsistency between the
	/// schema, the models, the mutation actions and the registered queries
	pub fn new(config: ServerConfig) -> Result<Self> {
		let ServerConfig {
			schema,
			storage,
			registry,
			models,
			mutations,
			reporter,
			notification_buffer,
		} = config;
		let actions: Vec<_> = mutations.iter().flat_map(|f| f.actions(&schema)).collect();
		validate(&schema, &models, &registry, &actions)?;
		let models = models.into_iter().map(|m| (m.table.clone(), m)).collect();
		let actions = actions.into_iter().map(|a| (a.name().to_owned(), a)).collect();
		let executor = Executor::server(schema.clone(), storage, Arc::new(models), reporter);
		info!(
			target: TARGET,
			"Started the {SERVER_NAME} server with {} queries and {} tables",
			registry.len(),
			schema.tables().count()
		);
		Ok(Self {
			registry,
			builder: QueryBuilder::new(schema),
			actions,
			executor,
			lives: Arc::new(DashMap::new()),
			buffer: notification_buffer,
		})
	}

	pub fn schema(&self) -> &Arc<Schema> {
		self.builder.schema()
	}

	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	pub fn executor(&self) -> &Executor {
		&self.executor
	}

	/// Open a session for a caller
	pub fn session(&self, identity: Option<Identity>) -> Session {
		Session::new(identity)
	}

	/// The number of subscriptions which are not closed yet
	pub fn subscriptions(&self) -> usize {
		self.lives.len()
	}

	fn prepare(&self, name: &str, params: &Params) -> Result<QueryDescriptor> {
		let declaration = self.registry.expect(name)?;
		declaration.build(&self.builder, params)
	}

	/// Runs a registered query once
	#[instrument(level = "trace", target = "syncline::core::dbs", skip(self, params, identity))]
	pub async fn query(
		&self,
		name: &str,
		params: &Params,
		identity: Option<&Identity>,
	) -> Result<Snapshot> {
		let query = self.prepare(name, params)?;
		self.executor.execute(&query, identity).await
	}

	/// Subscribes to a registered query. The stream yields the baseline
	/// result set first, then every change to it.
	#[instrument(level = "trace", target = "syncline::core::dbs", skip(self, params, identity))]
	pub async fn subscribe(
		&self,
		name: &str,
		params: Params,
		identity: Option<Identity>,
	) -> Result<Subscription> {
		let query = self.prepare(name, &params)?;
		let key = QueryKey::new(name, params);
		let subscription = Subscription::spawn(
			self.executor.clone(),
			query,
			key,
			identity,
			self.lives.clone(),
			self.buffer,
		)?;
		debug!(target: TARGET, "Opened subscription {} for {}", subscription.id(), subscription.key());
		Ok(subscription)
	}

	/// Runs a mutation action. Every planned write is checked before any
	/// of them is applied.
	#[instrument(level = "trace", target = "syncline::core::dbs", skip(self, args, identity))]
	pub async fn mutate(
		&self,
		name: &str,
		args: &Params,
		identity: Option<&Identity>,
	) -> Result<MutationOutcome> {
		let action = self.actions.get(name).ok_or_else(|| Error::ActionNotFound {
			name: name.to_owned(),
		})?;
		let writes = action.plan(args, identity).map_err(|e| Error::Action {
			name: name.to_owned(),
			message: format!("{e:#}"),
		})?;
		// Later writes are checked against the rows earlier writes leave behind
		let mut staged = Staged::new();
		for write in writes.iter() {
			self.authorize(write, identity, &mut staged).await?;
		}
		let changes = self.executor.storage().apply(&writes).await.map_err(Error::storage)?;
		debug!(target: TARGET, "The action '{name}' applied {} changes", changes.len());
		Ok(MutationOutcome {
			action: name.to_owned(),
			changes,
		})
	}

	/// Finds the row a write applies to, as the batch has left it so far
	async fn before(
		&self,
		tb: &TableDefinition,
		key: &Value,
		staged: &Staged,
	) -> Result<Option<Row>> {
		match staged.get(&(tb.name.clone(), key.to_string())) {
			Some(row) => Ok(row.clone()),
			None => self.executor.fetch(tb, key).await,
		}
	}

	async fn authorize(
		&self,
		write: &Write,
		identity: Option<&Identity>,
		staged: &mut Staged,
	) -> Result<()> {
		let schema = self.schema();
		let table = write.table();
		let tb = schema.expect_table(table)?;
		let permissions = self.executor.permissions(table);
		let ctx = self.executor.context(identity);
		let deny = |kind: PermissionKind| Error::Unauthorized {
			action: kind.to_string(),
			table: table.to_owned(),
		};
		let missing = |key: &Value| Error::RecordNotFound {
			table: table.to_owned(),
			key: key.to_string(),
		};
		match write {
			Write::Insert {
				row,
				..
			} => {
				tb.check_row(row)?;
				if !ctx.granted(table, &permissions, PermissionKind::Insert, row).await? {
					return Err(deny(PermissionKind::Insert));
				}
				staged.insert((table.to_owned(), tb.key_of(row).to_string()), Some(row.clone()));
			}
			Write::Update {
				row,
				..
			} => {
				tb.check_row(row)?;
				let key = tb.key_of(row);
				let Some(before) = self.before(tb, &key, staged).await? else {
					return Err(missing(&key));
				};
				// The caller must be allowed to update the row as it is and as it will be
				for version in [&before, row] {
					if !ctx.granted(table, &permissions, PermissionKind::Update, version).await? {
						return Err(deny(PermissionKind::Update));
					}
				}
				staged.insert((table.to_owned(), key.to_string()), Some(row.clone()));
			}
			Write::Delete {
				key,
				..
			} => {
				let Some(before) = self.before(tb, key, staged).await? else {
					return Err(missing(key));
				};
				if !ctx.granted(table, &permissions, PermissionKind::Delete, &before).await? {
					return Err(deny(PermissionKind::Delete));
				}
				staged.insert((table.to_owned(), key.to_string()), None);
			}
		}
		Ok(())
	}

	/// Closes every open subscription, telling each subscriber to
	/// resubscribe. Returns the number of subscriptions closed.
	pub fn resync(&self, reason: &str) -> usize {
		let lives: Vec<_> = self.lives.iter().map(|v| v.value().clone()).collect();
		for live in lives.iter() {
			live.close(Some(Delta::Resubscribe {
				reason: reason.to_owned(),
			}));
			self.lives.remove(&live.id());
		}
		info!(target: TARGET, "Resynchronising {} subscriptions: {reason}", lives.len());
		lives.len()
	}
}

impl fmt::Debug for Server {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Server")
			.field("registry", &self.registry)
			.field("actions", &self.actions.keys().collect::<Vec<_>>())
			.field("subscriptions", &self.lives.len())
			.finish_non_exhaustive()
	}
}
