use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::err::{Error, Result};
use crate::qry::QueryDeclaration;

#[derive(Default)]
struct Entries {
	/// Declaration token to stable name
	names: HashMap<&'static str, String>,
	/// Stable name to declaration
	queries: HashMap<String, Arc<QueryDeclaration>>,
}

/// The append-only mapping between query declarations and the stable
/// names clients and the server identify them by.
///
/// Within the lifetime of a registry the mapping is a bijection, and a
/// name is never reassigned.
#[derive(Default)]
pub struct Registry {
	entries: RwLock<Entries>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a declaration under a stable name.
	///
	/// Registering the same declaration under the same name again is a
	/// no-op. Registering it under another name, or giving its name to
	/// another declaration, fails.
	pub fn register(&self, declaration: &Arc<QueryDeclaration>, name: &str) -> Result<()> {
		let token = declaration.token();
		let mut entries = self.entries.write();
		match (entries.names.get(token), entries.queries.get(name)) {
			(Some(existing), _) if existing == name => {
				trace!("The query '{name}' is already registered");
				Ok(())
			}
			(Some(existing), _) => Err(Error::DuplicateRegistration {
				name: name.to_owned(),
				detail: format!("the declaration '{token}' is already registered as '{existing}'"),
			}),
			(None, Some(other)) => Err(Error::DuplicateRegistration {
				name: name.to_owned(),
				detail: format!("the name is already used by the declaration '{}'", other.token()),
			}),
			(None, None) => {
				entries.names.insert(token, name.to_owned());
				entries.queries.insert(name.to_owned(), declaration.clone());
				debug!("Registered the query '{name}' for '{token}'");
				Ok(())
			}
		}
	}

	/// The stable name a declaration was registered under
	pub fn name_of(&self, declaration: &QueryDeclaration) -> Option<String> {
		self.entries.read().names.get(declaration.token()).cloned()
	}

	/// The declaration registered under a stable name
	pub fn get(&self, name: &str) -> Option<Arc<QueryDeclaration>> {
		self.entries.read().queries.get(name).cloned()
	}

	/// Fetch the declaration registered under a stable name, failing when
	/// there is none
	pub fn expect(&self, name: &str) -> Result<Arc<QueryDeclaration>> {
		self.get(name).ok_or_else(|| Error::QueryNotFound {
			name: name.to_owned(),
		})
	}

	/// Every registered name with its declaration, sorted by name
	pub fn entries(&self) -> Vec<(String, Arc<QueryDeclaration>)> {
		let mut out: Vec<_> =
			self.entries.read().queries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
		out.sort_by(|a, b| a.0.cmp(&b.0));
		out
	}

	pub fn len(&self) -> usize {
		self.entries.read().queries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_map().entries(self.entries.read().names.iter()).finish()
	}
}
