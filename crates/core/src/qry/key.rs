use std::fmt::{self, Display};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::qry::Params;

/// The identity of a query invocation: its stable name and parameters.
///
/// Clients and the server use the hash of a key to match cached and
/// streamed results to the invocation that produced them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryKey {
	pub name: String,
	pub params: Params,
}

impl QueryKey {
	pub fn new(name: impl Into<String>, params: Params) -> Self {
		Self {
			name: name.into(),
			params,
		}
	}

	/// A deterministic hash of the canonical JSON encoding of this key
	pub fn hash(&self) -> String {
		let mut hasher = Sha256::new();
		// Params are kept sorted, so the encoding is canonical
		match serde_json::to_vec(&(&self.name, &self.params)) {
			Ok(v) => hasher.update(v),
			Err(_) => hasher.update(self.to_string()),
		}
		hex::encode(hasher.finalize())
	}
}

impl Display for QueryKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}({})", self.name, self.params)
	}
}
