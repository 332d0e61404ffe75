mod common;

use std::sync::Arc;

use common::*;
use syncline_core::dbs::{Executor, Server};
use syncline_core::err::Error;
use syncline_core::expr::{Environment, Predicate, QueryBuilder};
use syncline_core::iam::Identity;
use syncline_core::map;
use syncline_core::qry::{Params, QueryKey};
use test_log::test;

fn params(user: &str) -> Params {
	Params::new().with("userId", user).unwrap()
}

#[test(tokio::test)]
async fn blocked_by_user_is_filtered_by_block_visibility_on_the_server() {
	let (server, _) = server();
	let u1 = Identity::new("u1");
	let res = server.query("blockedByUser", &params("u1"), Some(&u1)).await.unwrap();
	assert_eq!(ids(&res.rows), ["k1", "k3"]);
	for row in res.rows.iter() {
		assert_eq!(row.pick("blockerId").as_str(), Some("u1"));
	}
	// Another caller asking for the same blocker sees nothing
	let u2 = Identity::new("u2");
	let res = server.query("blockedByUser", &params("u1"), Some(&u2)).await.unwrap();
	assert!(res.is_empty());
	let res = server.query("blockedByUser", &params("u1"), None).await.unwrap();
	assert!(res.is_empty());
}

#[test(tokio::test)]
async fn blocked_by_user_ignores_the_permission_clause_on_a_client_replica() {
	let schema = schema();
	let store = store(&schema);
	let builder = QueryBuilder::new(schema.clone());
	let query = blocked_by_user().build(&builder, &params("u1")).unwrap();
	assert!(query.has_permission());
	assert!(!query.compile(Environment::Client).has_permission());
	let client = Executor::client(store, schema);
	assert_eq!(client.environment(), Environment::Client);
	// The caller is not the blocker, and the rows are still returned
	let u2 = Identity::new("u2");
	let res = client.execute(&query, Some(&u2)).await.unwrap();
	assert_eq!(ids(&res.rows), ["k1", "k3"]);
}

#[test(tokio::test)]
async fn not_blocked_by_viewer_passes_everything_for_anonymous_callers() {
	let row = map! { "id" => "p2", "authorId" => "u3", "body" => "hi" };
	let clause = not_blocked_by_viewer();
	assert_eq!(clause.evaluate(Environment::Server, &row, None).unwrap(), Predicate::Boolean(true));
	let (server, _) = server();
	let res = server.query("feed", &Params::new(), None).await.unwrap();
	assert_eq!(ids(&res.rows), ["p1", "p2", "p3"]);
}

#[test(tokio::test)]
async fn not_blocked_by_viewer_hides_the_authors_a_viewer_blocked() {
	let (server, _) = server();
	// u2 blocked u3
	let u2 = Identity::new("u2");
	let res = server.query("feed", &Params::new(), Some(&u2)).await.unwrap();
	assert_eq!(ids(&res.rows), ["p1", "p3"]);
	// u1 blocked both u2 and u3
	let u1 = Identity::new("u1");
	let res = server.query("feed", &Params::new(), Some(&u1)).await.unwrap();
	assert_eq!(ids(&res.rows), ["p1"]);
	// u3 blocked nobody
	let u3 = Identity::new("u3");
	let res = server.query("feed", &Params::new(), Some(&u3)).await.unwrap();
	assert_eq!(ids(&res.rows), ["p1", "p2", "p3"]);
}

#[test(tokio::test)]
async fn identical_parameters_build_equal_but_distinct_descriptors() {
	let schema = schema();
	let registry = registry();
	let builder = QueryBuilder::new(schema);
	let declaration = registry.expect("allBookings").unwrap();
	let params = Params::new().with("status", "confirmed").unwrap().with("pageSize", 10).unwrap();
	let a = declaration.build(&builder, &params).unwrap();
	let b = declaration.build(&builder, &params).unwrap();
	assert_eq!(a, b);
	assert!(!std::ptr::eq(&a, &b));
	assert_eq!(a.to_string(), b.to_string());
	assert_eq!(registry.name_of(&declaration).as_deref(), Some("allBookings"));
	// Names are bound to the declaration token, not to one instance
	assert_eq!(registry.name_of(&all_bookings()).as_deref(), Some("allBookings"));
	// The same name and parameters always share a subscription key
	let x = QueryKey::new("allBookings", params.clone());
	let y = QueryKey::new("allBookings", params);
	assert_eq!(x.hash(), y.hash());
}

#[test(tokio::test)]
async fn all_bookings_respects_the_model_select_permission() {
	let (server, _) = server();
	let params = Params::new().with("status", "confirmed").unwrap().with("pageSize", 10).unwrap();
	let u1 = Identity::new("u1");
	let res = server.query("allBookings", &params, Some(&u1)).await.unwrap();
	assert_eq!(ids(&res.rows), ["b1"]);
	let admin = Identity::new("root").with_role("admin");
	let res = server.query("allBookings", &params, Some(&admin)).await.unwrap();
	assert_eq!(ids(&res.rows), ["b1", "b2"]);
	let res = server.query("allBookings", &params, None).await.unwrap();
	assert!(res.is_empty());
}

#[test(tokio::test)]
async fn related_rows_are_fetched_into_each_result() {
	let (server, _) = server();
	let u2 = Identity::new("u2");
	let res = server.query("myBookings", &Params::new(), Some(&u2)).await.unwrap();
	assert_eq!(ids(&res.rows), ["b2"]);
	let guest = res.rows[0].pick("guest");
	assert_eq!(guest.as_array().map(|v| v.len()), Some(1));
}

#[test(tokio::test)]
async fn unknown_queries_and_parameters_are_rejected() {
	let (server, _) = server();
	let err = server.query("nope", &Params::new(), None).await.unwrap_err();
	assert!(matches!(err, Error::QueryNotFound { .. }));
	let err = server.query("blockedByUser", &Params::new(), None).await.unwrap_err();
	assert!(matches!(err, Error::InvalidParam { .. }));
	let bad = Params::new().with("userId", 7).unwrap();
	let err = server.query("blockedByUser", &bad, None).await.unwrap_err();
	assert!(matches!(err, Error::InvalidParam { .. }));
}

#[test(tokio::test)]
async fn failing_predicates_are_reported_and_deny_the_row() {
	let schema = schema();
	let store = store(&schema);
	let reporter = Arc::new(Collect::default());
	let config = config(&schema, store)
		.with_model(syncline_core::catalog::ModelDefinition::new("post").with_permissions(
			syncline_core::catalog::Permissions {
				select: syncline_core::catalog::Permission::from(
					syncline_core::expr::server_where("post", |row, _| {
						if row.pick("id").as_str() == Some("p2") {
							anyhow::bail!("no such claim");
						}
						Ok(Predicate::from(true))
					}),
				),
				..syncline_core::catalog::Permissions::full()
			},
		))
		.with_reporter(reporter.clone());
	let server = Server::new(config).unwrap();
	let res = server.query("feed", &Params::new(), None).await.unwrap();
	assert_eq!(ids(&res.rows), ["p1", "p3"]);
	let reports = reporter.0.lock();
	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].0, "post");
	assert!(matches!(&reports[0].1, Error::PermissionEvaluation { message, .. } if message.contains("no such claim")));
}
