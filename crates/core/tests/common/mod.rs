#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use syncline_core::catalog::{
	FieldDefinition, Kind, ModelDefinition, Permission, Permissions, RelationDefinition, Schema,
	TableDefinition,
};
use syncline_core::dbs::{Delta, Mutation, MutationAction, Server, ServerConfig, Subscription};
use syncline_core::doc::PermissionReporter;
use syncline_core::err::Error;
use syncline_core::expr::{Operator, PermissionClause, Predicate, cmp, exists_in, not, server_where};
use syncline_core::kvs::{ChangeFeed, MemStore, RowChange, ScanRequest, Storage, Write};
use syncline_core::map;
use syncline_core::qry::{QueryDeclaration, Registry};
use syncline_core::val::{Row, Value};

pub fn schema() -> Arc<Schema> {
	Arc::new(
		Schema::new()
			.with_table(
				TableDefinition::new("user")
					.with_field(FieldDefinition::new("id", Kind::String))
					.with_field(FieldDefinition::new("name", Kind::String)),
			)
			.with_table(
				TableDefinition::new("block")
					.with_field(FieldDefinition::new("id", Kind::String))
					.with_field(FieldDefinition::new("blockerId", Kind::String))
					.with_field(FieldDefinition::new("blockedId", Kind::String))
					.with_relation(RelationDefinition::new("blocker", "blockerId", "user", "id")),
			)
			.with_table(
				TableDefinition::new("post")
					.with_field(FieldDefinition::new("id", Kind::String))
					.with_field(FieldDefinition::new("authorId", Kind::String))
					.with_field(FieldDefinition::new("body", Kind::String))
					.with_relation(RelationDefinition::new("author", "authorId", "user", "id"))
					.with_relation(RelationDefinition::new(
						"authorBlocks",
						"authorId",
						"block",
						"blockedId",
					)),
			)
			.with_table(
				TableDefinition::new("booking")
					.with_field(FieldDefinition::new("id", Kind::String))
					.with_field(FieldDefinition::new("owner", Kind::String))
					.with_field(FieldDefinition::new("status", Kind::String))
					.with_field(FieldDefinition::new("seats", Kind::Int))
					.with_relation(RelationDefinition::new("guest", "owner", "user", "id")),
			),
	)
}

pub fn store(schema: &Arc<Schema>) -> Arc<MemStore> {
	let store = MemStore::new(schema.clone());
	store
		.seed(
			"user",
			[
				map! { "id" => "u1", "name" => "Ada" },
				map! { "id" => "u2", "name" => "Brook" },
				map! { "id" => "u3", "name" => "Cyd" },
			],
		)
		.unwrap();
	store
		.seed(
			"block",
			[
				map! { "id" => "k1", "blockerId" => "u1", "blockedId" => "u3" },
				map! { "id" => "k2", "blockerId" => "u2", "blockedId" => "u3" },
				map! { "id" => "k3", "blockerId" => "u1", "blockedId" => "u2" },
			],
		)
		.unwrap();
	store
		.seed(
			"post",
			[
				map! { "id" => "p1", "authorId" => "u1", "body" => "hello" },
				map! { "id" => "p2", "authorId" => "u3", "body" => "hi" },
				map! { "id" => "p3", "authorId" => "u2", "body" => "hey" },
			],
		)
		.unwrap();
	store
		.seed(
			"booking",
			[
				map! { "id" => "b1", "owner" => "u1", "status" => "confirmed", "seats" => 2 },
				map! { "id" => "b2", "owner" => "u2", "status" => "confirmed", "seats" => 4 },
				map! { "id" => "b3", "owner" => "u1", "status" => "cancelled", "seats" => 1 },
			],
		)
		.unwrap();
	Arc::new(store)
}

/// Only the blocker can see a block
pub fn block_visibility() -> PermissionClause {
	server_where("block", |_, who| {
		Ok(match who {
			Some(who) => Predicate::from(cmp("blockerId", Operator::Equal, who.id_value())),
			None => Predicate::from(false),
		})
	})
}

/// Hides the posts of authors the caller blocked
pub fn not_blocked_by_viewer() -> PermissionClause {
	server_where("post", |_, who| {
		Ok(match who {
			Some(who) => Predicate::from(not(exists_in(
				"authorBlocks",
				[cmp("blockerId", Operator::Equal, who.id_value())],
			))),
			None => Predicate::from(true),
		})
	})
}

/// Bookings are visible to, and writable by, their owner
pub fn owner_only() -> PermissionClause {
	server_where("booking", |row, who| {
		Ok(match who {
			Some(who) if who.has_role("admin") => Predicate::from(true),
			Some(who) => Predicate::from(row.pick("owner") == &who.id_value()),
			None => Predicate::from(false),
		})
	})
}

pub fn blocked_by_user() -> Arc<QueryDeclaration> {
	Arc::new(
		QueryDeclaration::new("tests::blocked_by_user", |q, p| {
			q.table("block")?
				.filter("blockerId", Operator::Equal, p.get("userId")?.clone())?
				.filter_by(block_visibility())
		})
		.param("userId", Kind::String),
	)
}

pub fn feed() -> Arc<QueryDeclaration> {
	Arc::new(QueryDeclaration::new("tests::feed", |q, _| {
		q.table("post")?.filter_by(not_blocked_by_viewer())
	}))
}

pub fn all_bookings() -> Arc<QueryDeclaration> {
	Arc::new(
		QueryDeclaration::new("tests::all_bookings", |q, p| {
			q.table("booking")?
				.filter("status", Operator::Equal, p.get("status")?.clone())?
				.order_by("id", syncline_core::expr::Direction::Ascending)?
				.limit(p.get_int("pageSize")? as u32)
		})
		.param("status", Kind::String)
		.param("pageSize", Kind::Int),
	)
}

pub fn my_bookings() -> Arc<QueryDeclaration> {
	Arc::new(QueryDeclaration::new("tests::my_bookings", |q, _| {
		q.table("booking")?.related("guest", Ok)
	}))
}

pub fn registry() -> Arc<Registry> {
	let registry = Registry::new();
	registry.register(&blocked_by_user(), "blockedByUser").unwrap();
	registry.register(&feed(), "feed").unwrap();
	registry.register(&all_bookings(), "allBookings").unwrap();
	registry.register(&my_bookings(), "myBookings").unwrap();
	Arc::new(registry)
}

pub fn actions(_: &Schema) -> Vec<Arc<dyn MutationAction>> {
	let book = Mutation::new("book", "booking", |args, who| {
		let owner = who.map(|w| w.id.clone()).unwrap_or_default();
		Ok(vec![Write::Insert {
			table: "booking".to_owned(),
			row: map! {
				"id" => args.get_str("id")?,
				"owner" => owner,
				"status" => "confirmed",
				"seats" => args.get_int("seats")?,
			},
		}])
	});
	let cancel = Mutation::new("cancel", "booking", |args, _| {
		Ok(vec![Write::Update {
			table: "booking".to_owned(),
			row: map! {
				"id" => args.get_str("id")?,
				"owner" => args.get_str("owner")?,
				"status" => "cancelled",
				"seats" => args.get_int("seats")?,
			},
		}])
	});
	let remove = Mutation::new("remove", "booking", |args, _| {
		Ok(vec![Write::Delete {
			table: "booking".to_owned(),
			key: Value::from(args.get_str("id")?),
		}])
	});
	let transfer = Mutation::new("transfer", "booking", |args, _| {
		// Moves every seat of one booking onto another
		Ok(vec![
			Write::Delete {
				table: "booking".to_owned(),
				key: Value::from(args.get_str("from")?),
			},
			Write::Update {
				table: "booking".to_owned(),
				row: map! {
					"id" => args.get_str("to")?,
					"owner" => args.get_str("owner")?,
					"status" => "confirmed",
					"seats" => args.get_int("seats")?,
				},
			},
		])
	});
	let rebook = Mutation::new("rebook", "booking", |args, who| {
		// Books a single seat, then grows the same booking
		let owner = who.map(|w| w.id.clone()).unwrap_or_default();
		let id = args.get_str("id")?;
		let row = |seats: i64| -> Row {
			map! {
				"id" => id,
				"owner" => owner.clone(),
				"status" => "confirmed",
				"seats" => seats,
			}
		};
		Ok(vec![
			Write::Insert {
				table: "booking".to_owned(),
				row: row(1),
			},
			Write::Update {
				table: "booking".to_owned(),
				row: row(args.get_int("seats")?),
			},
		])
	});
	let hold = Mutation::new("hold", "booking", |args, who| {
		// Books and releases within one batch
		let owner = who.map(|w| w.id.clone()).unwrap_or_default();
		let id = args.get_str("id")?;
		Ok(vec![
			Write::Insert {
				table: "booking".to_owned(),
				row: map! {
					"id" => id.clone(),
					"owner" => owner,
					"status" => "confirmed",
					"seats" => 1,
				},
			},
			Write::Delete {
				table: "booking".to_owned(),
				key: Value::from(id),
			},
		])
	});
	vec![
		Arc::new(book),
		Arc::new(cancel),
		Arc::new(remove),
		Arc::new(transfer),
		Arc::new(rebook),
		Arc::new(hold),
	]
}

pub fn models() -> Vec<ModelDefinition> {
	vec![
		ModelDefinition::new("booking").with_permissions(Permissions {
			select: Permission::from(owner_only()),
			insert: Permission::from(owner_only()),
			update: Permission::from(owner_only()),
			delete: Permission::from(owner_only()),
		}),
		ModelDefinition::new("user").with_permissions(Permissions {
			select: Permission::Full,
			..Permissions::none()
		}),
	]
}

pub fn config(schema: &Arc<Schema>, storage: Arc<dyn Storage>) -> ServerConfig {
	let mut config = ServerConfig::new(schema.clone(), storage)
		.with_registry(registry())
		.with_mutations(actions);
	for model in models() {
		config = config.with_model(model);
	}
	config
}

pub fn server() -> (Server, Arc<MemStore>) {
	let schema = schema();
	let store = store(&schema);
	let server = Server::new(config(&schema, store.clone())).unwrap();
	(server, store)
}

/// Collects every reported permission failure
#[derive(Default)]
pub struct Collect(pub Mutex<Vec<(String, Error)>>);

impl PermissionReporter for Collect {
	fn report(&self, table: &str, error: &Error) {
		self.0.lock().push((table.to_owned(), error.clone()));
	}
}

/// A store whose reads fail while the switch is on
pub struct Flaky {
	pub inner: Arc<MemStore>,
	pub failing: AtomicBool,
}

#[async_trait]
impl Storage for Flaky {
	async fn scan(&self, req: &ScanRequest) -> anyhow::Result<Vec<Row>> {
		if self.failing.load(Ordering::Acquire) {
			anyhow::bail!("the disk is on fire");
		}
		self.inner.scan(req).await
	}

	async fn apply(&self, writes: &[Write]) -> anyhow::Result<Vec<RowChange>> {
		self.inner.apply(writes).await
	}

	fn changes(&self) -> ChangeFeed {
		self.inner.changes()
	}
}

/// Waits for the next notification of a subscription
pub async fn next(sub: &mut Subscription) -> Option<Delta> {
	tokio::time::timeout(Duration::from_secs(5), sub.next())
		.await
		.expect("timed out waiting for a notification")
		.map(|n| n.delta)
}

/// The ids of a list of rows
pub fn ids(rows: &[Row]) -> Vec<String> {
	rows.iter().map(|r| r.pick("id").as_str().unwrap_or_default().to_owned()).collect()
}
