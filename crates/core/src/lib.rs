//! # Syncline Core
//!
//! This crate is the query compilation and permission enforcement core of
//! Syncline. It decides what a synced query means and which rows a caller
//! may see, and composes schema, queries and mutations into one
//! authoritative server.
//!
//! The core performs no persistence and no network transport. Storage, the
//! change feed and identity resolution are collaborators expressed as
//! traits in [`kvs`] and [`iam`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use syncline_core::catalog::{FieldDefinition, Kind, Schema, TableDefinition};
//! use syncline_core::expr::{Direction, Operator, QueryBuilder};
//! use syncline_core::qry::{QueryDeclaration, Registry};
//!
//! let schema = Arc::new(Schema::new()
//! 	.with_table(TableDefinition::new("booking")
//! 		.with_field(FieldDefinition::new("id", Kind::String))
//! 		.with_field(FieldDefinition::new("status", Kind::String))));
//! let builder = QueryBuilder::new(schema);
//! let registry = Registry::new();
//! let all_bookings = Arc::new(QueryDeclaration::new("bookings::all", |q, p| {
//! 	q.table("booking")?
//! 		.filter("status", Operator::Equal, p.get("status")?.clone())?
//! 		.order_by("id", Direction::Ascending)
//! }));
//! registry.register(&all_bookings, "allBookings").unwrap();
//! ```

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod catalog;
pub mod cnf;
pub mod dbs;
pub mod doc;
pub mod err;
pub mod expr;
pub mod iam;
pub mod kvs;
pub mod qry;
pub mod rpc;
pub mod val;
