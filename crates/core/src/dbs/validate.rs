use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::{ModelDefinition, Schema};
use crate::dbs::MutationAction;
use crate::err::{Error, Result, Violations};
use crate::expr::QueryBuilder;
use crate::qry::Registry;

/// Checks a server composition as a whole. Every inconsistency found
/// is collected before failing.
pub(crate) fn validate(
	schema: &Arc<Schema>,
	models: &[ModelDefinition],
	registry: &Registry,
	actions: &[Arc<dyn MutationAction>],
) -> Result<()> {
	let mut violations = schema.check();
	// Check the data models
	let mut seen = BTreeSet::new();
	for model in models {
		let subject = format!("model '{}'", model.table);
		if !seen.insert(model.table.as_str()) {
			violations.push(&subject, "the table already has a model");
		}
		if let Err(e) = schema.expect_table(&model.table) {
			violations.push(&subject, e);
		}
		if let Err(e) = model.check() {
			violations.push(&subject, e);
		}
	}
	// Check the mutation actions
	let mut seen = BTreeSet::new();
	for action in actions {
		let subject = format!("action '{}'", action.name());
		if !seen.insert(action.name()) {
			violations.push(&subject, "the name is already used by another action");
		}
		if let Err(e) = schema.expect_table(action.table()) {
			violations.push(&subject, e);
		}
	}
	// Dry-run every registered query with placeholder parameters
	let builder = QueryBuilder::new(schema.clone());
	for (name, declaration) in registry.entries() {
		if let Err(e) = declaration.build(&builder, &declaration.placeholders()) {
			violations.push(format!("query '{name}'"), e);
		}
	}
	match violations.is_empty() {
		true => Ok(()),
		false => Err(fail_with(violations)),
	}
}

fn fail_with(violations: Violations) -> Error {
	error!("The server composition is invalid:\n{violations}");
	Error::SchemaValidation(violations)
}
