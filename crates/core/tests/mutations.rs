mod common;

use std::sync::Arc;

use common::*;
use syncline_core::catalog::{
	FieldDefinition, Kind, ModelDefinition, RelationDefinition, Schema, TableDefinition,
};
use syncline_core::dbs::{Mutation, MutationAction, Server, ServerConfig};
use syncline_core::err::Error;
use syncline_core::expr::Operator;
use syncline_core::iam::Identity;
use syncline_core::kvs::{MemStore, Write};
use syncline_core::map;
use syncline_core::qry::{Params, QueryDeclaration, Registry};
use syncline_core::val::Value;
use test_log::test;

fn status(store: &MemStore, id: &str) -> Option<String> {
	store.get("booking", &Value::from(id)).and_then(|r| r.pick("status").as_str().map(String::from))
}

#[test(tokio::test)]
async fn an_authorized_insert_is_applied() {
	let (server, store) = server();
	let u1 = Identity::new("u1");
	let args = Params::new().with("id", "b4").unwrap().with("seats", 2).unwrap();
	let outcome = server.mutate("book", &args, Some(&u1)).await.unwrap();
	assert_eq!(outcome.action, "book");
	assert_eq!(outcome.changes.len(), 1);
	assert!(outcome.changes[0].old.is_none());
	assert_eq!(store.count("booking"), 4);
	assert_eq!(status(&store, "b4").as_deref(), Some("confirmed"));
}

#[test(tokio::test)]
async fn an_unauthorized_insert_applies_nothing() {
	let (server, store) = server();
	let args = Params::new().with("id", "b4").unwrap().with("seats", 2).unwrap();
	let err = server.mutate("book", &args, None).await.unwrap_err();
	assert_eq!(
		err,
		Error::Unauthorized {
			action: "insert".to_owned(),
			table: "booking".to_owned()
		}
	);
	assert_eq!(store.count("booking"), 3);
}

#[test(tokio::test)]
async fn updates_are_checked_against_the_row_before_and_after() {
	let (server, store) = server();
	let u1 = Identity::new("u1");
	// Someone else's booking
	let args = Params::new()
		.with("id", "b2")
		.unwrap()
		.with("owner", "u2")
		.unwrap()
		.with("seats", 4)
		.unwrap();
	let err = server.mutate("cancel", &args, Some(&u1)).await.unwrap_err();
	assert!(matches!(err, Error::Unauthorized { ref action, .. } if action == "update"));
	// Handing one's own booking to someone else
	let args = Params::new()
		.with("id", "b1")
		.unwrap()
		.with("owner", "u2")
		.unwrap()
		.with("seats", 2)
		.unwrap();
	let err = server.mutate("cancel", &args, Some(&u1)).await.unwrap_err();
	assert!(matches!(err, Error::Unauthorized { .. }));
	assert_eq!(status(&store, "b1").as_deref(), Some("confirmed"));
	// Cancelling one's own booking
	let args = Params::new()
		.with("id", "b1")
		.unwrap()
		.with("owner", "u1")
		.unwrap()
		.with("seats", 2)
		.unwrap();
	let outcome = server.mutate("cancel", &args, Some(&u1)).await.unwrap();
	assert_eq!(outcome.changes.len(), 1);
	assert_eq!(status(&store, "b1").as_deref(), Some("cancelled"));
}

#[test(tokio::test)]
async fn a_batch_is_applied_only_if_every_write_is_allowed() {
	let (server, store) = server();
	let u1 = Identity::new("u1");
	// b3 belongs to u1 but b2 does not
	let args = Params::new()
		.with("from", "b3")
		.unwrap()
		.with("to", "b2")
		.unwrap()
		.with("owner", "u2")
		.unwrap()
		.with("seats", 5)
		.unwrap();
	let err = server.mutate("transfer", &args, Some(&u1)).await.unwrap_err();
	assert!(matches!(err, Error::Unauthorized { .. }));
	assert!(store.get("booking", &Value::from("b3")).is_some());
	assert_eq!(store.count("booking"), 3);
	// An administrator may move seats anywhere
	let admin = Identity::new("root").with_role("admin");
	let outcome = server.mutate("transfer", &args, Some(&admin)).await.unwrap();
	assert_eq!(outcome.changes.len(), 2);
	assert!(store.get("booking", &Value::from("b3")).is_none());
	assert_eq!(store.count("booking"), 2);
}

#[test(tokio::test)]
async fn later_writes_are_checked_against_earlier_ones() {
	let (server, store) = server();
	let u1 = Identity::new("u1");
	// The update finds the row the insert before it creates
	let args = Params::new().with("id", "b5").unwrap().with("seats", 3).unwrap();
	let outcome = server.mutate("rebook", &args, Some(&u1)).await.unwrap();
	assert_eq!(outcome.changes.len(), 2);
	let row = store.get("booking", &Value::from("b5")).unwrap();
	assert_eq!(row.pick("seats"), &Value::from(3));
	assert_eq!(row.pick("owner"), &Value::from("u1"));
	// A row created and removed within one batch leaves nothing behind
	let args = Params::new().with("id", "b6").unwrap();
	let outcome = server.mutate("hold", &args, Some(&u1)).await.unwrap();
	assert_eq!(outcome.changes.len(), 2);
	assert!(store.get("booking", &Value::from("b6")).is_none());
	assert_eq!(store.count("booking"), 4);
	// Staged rows are still subject to the permissions of the caller
	let args = Params::new().with("id", "b7").unwrap().with("seats", 2).unwrap();
	let err = server.mutate("rebook", &args, None).await.unwrap_err();
	assert!(matches!(err, Error::Unauthorized { ref action, .. } if action == "insert"));
	assert_eq!(store.count("booking"), 4);
}

#[test(tokio::test)]
async fn mutations_on_missing_rows_fail() {
	let (server, _) = server();
	let admin = Identity::new("root").with_role("admin");
	let args = Params::new().with("id", "b9").unwrap();
	let err = server.mutate("remove", &args, Some(&admin)).await.unwrap_err();
	assert!(matches!(err, Error::RecordNotFound { ref key, .. } if key == "'b9'"));
}

#[test(tokio::test)]
async fn unknown_and_failing_actions_are_reported() {
	let (server, _) = server();
	let err = server.mutate("nope", &Params::new(), None).await.unwrap_err();
	assert!(matches!(err, Error::ActionNotFound { .. }));
	// The seat count is missing
	let args = Params::new().with("id", "b4").unwrap();
	let err = server.mutate("book", &args, Some(&Identity::new("u1"))).await.unwrap_err();
	assert!(matches!(err, Error::Action { ref name, .. } if name == "book"));
}

#[test(tokio::test)]
async fn rows_which_do_not_fit_the_table_are_rejected() {
	let schema = schema();
	let store = store(&schema);
	let config = ServerConfig::new(schema.clone(), store.clone()).with_mutations(|_: &Schema| {
		let action = Mutation::new("overbook", "booking", |_, _| {
			Ok(vec![Write::Insert {
				table: "booking".to_owned(),
				row: map! { "id" => "b5", "owner" => "root", "status" => "x", "seats" => "many" },
			}])
		});
		vec![Arc::new(action) as Arc<dyn MutationAction>]
	});
	let server = Server::new(config).unwrap();
	let err = server.mutate("overbook", &Params::new(), None).await.unwrap_err();
	assert!(err.is_schema_related());
	assert!(store.get("booking", &Value::from("b5")).is_none());
}

#[test(tokio::test)]
async fn startup_validation_reports_every_violation() {
	let schema = schema();
	let store = store(&schema);
	let registry = Registry::new();
	let typo = Arc::new(QueryDeclaration::new("tests::typo", |q, _| {
		q.table("booking")?.filter("statsu", Operator::Equal, "confirmed")
	}));
	let missing = Arc::new(QueryDeclaration::new("tests::missing", |q, _| q.table("invoice")));
	registry.register(&typo, "typo").unwrap();
	registry.register(&missing, "missing").unwrap();
	registry.register(&feed(), "feed").unwrap();
	let config = ServerConfig::new(schema.clone(), store)
		.with_registry(Arc::new(registry))
		.with_model(ModelDefinition::new("booking"))
		.with_model(ModelDefinition::new("booking"))
		.with_model(ModelDefinition::new("invoice"))
		.with_mutations(|_: &Schema| {
			let action = Mutation::new("bill", "invoice", |_, _| Ok(vec![]));
			vec![Arc::new(action) as Arc<dyn MutationAction>]
		});
	let Err(Error::SchemaValidation(violations)) = Server::new(config) else {
		panic!("expected the composition to be rejected");
	};
	let subjects: Vec<&str> = violations.iter().map(|v| v.subject.as_str()).collect();
	assert_eq!(violations.len(), 5, "{violations}");
	assert!(subjects.contains(&"query 'typo'"));
	assert!(subjects.contains(&"query 'missing'"));
	assert!(subjects.contains(&"model 'booking'"));
	assert!(subjects.contains(&"model 'invoice'"));
	assert!(subjects.contains(&"action 'bill'"));
}

#[test(tokio::test)]
async fn an_inconsistent_schema_is_rejected_at_startup() {
	let schema = Arc::new(
		Schema::new().with_table(
			TableDefinition::new("booking")
				.with_field(FieldDefinition::new("id", Kind::String))
				.with_relation(RelationDefinition::new("guest", "owner", "user", "id")),
		),
	);
	let store = Arc::new(MemStore::new(schema.clone()));
	let err = Server::new(ServerConfig::new(schema, store)).unwrap_err();
	assert!(err.is_schema_related());
	assert!(err.to_string().contains("table 'booking'"));
}
