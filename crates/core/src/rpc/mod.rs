//! Request and response types for clients speaking to a server over a
//! transport, and a router resolving their tokens into identities.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dbs::{MutationOutcome, Server, Subscription};
use crate::err::Result;
use crate::iam::{IdentityProvider, resolve};
use crate::qry::{Params, QueryKey};
use crate::val::Value;

/// A request to run or subscribe to a registered query
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct QueryRequest {
	/// The stable name of the query
	pub query: String,
	#[serde(default)]
	pub params: Params,
	/// The caller's token, absent for anonymous callers
	#[serde(default)]
	pub token: Option<String>,
}

/// A request to run a mutation action
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MutationRequest {
	/// The name of the mutation action
	pub action: String,
	#[serde(default)]
	pub args: Params,
	/// The caller's token, absent for anonymous callers
	#[serde(default)]
	pub token: Option<String>,
}

/// The result of a query, tagged with the hash of the query key
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResponse {
	pub key: String,
	pub result: Value,
}

/// Dispatches requests to a server on behalf of the callers their
/// tokens identify.
#[derive(Clone)]
pub struct Router {
	server: Arc<Server>,
	provider: Arc<dyn IdentityProvider>,
}

impl Router {
	pub fn new(server: Arc<Server>, provider: Arc<dyn IdentityProvider>) -> Self {
		Self {
			server,
			provider,
		}
	}

	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let identity = resolve(self.provider.as_ref(), req.token.as_deref()).await?;
		let snapshot = self.server.query(&req.query, &req.params, identity.as_ref()).await?;
		Ok(QueryResponse {
			key: QueryKey::new(req.query, req.params).hash(),
			result: snapshot.into_value(),
		})
	}

	pub async fn subscribe(&self, req: QueryRequest) -> Result<Subscription> {
		let identity = resolve(self.provider.as_ref(), req.token.as_deref()).await?;
		self.server.subscribe(&req.query, req.params, identity).await
	}

	pub async fn mutate(&self, req: MutationRequest) -> Result<MutationOutcome> {
		let identity = resolve(self.provider.as_ref(), req.token.as_deref()).await?;
		self.server.mutate(&req.action, &req.args, identity.as_ref()).await
	}
}
