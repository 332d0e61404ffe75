use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::err::{Error, Result};
use crate::iam::Identity;

/// Resolves the token carried by a request into a caller identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Returns `None` when the token is not recognised
	async fn identify(&self, token: &str) -> anyhow::Result<Option<Identity>>;
}

/// Resolves the identity for an optional request token. Requests
/// without a token are anonymous, while unrecognised tokens are rejected.
pub async fn resolve(
	provider: &dyn IdentityProvider,
	token: Option<&str>,
) -> Result<Option<Identity>> {
	let Some(token) = token else {
		return Ok(None);
	};
	match provider.identify(token).await {
		Ok(Some(v)) => Ok(Some(v)),
		Ok(None) => Err(Error::InvalidIdentity("the token is not recognised".to_owned())),
		Err(e) => Err(Error::InvalidIdentity(format!("{e:#}"))),
	}
}

/// An identity provider backed by a fixed table of tokens.
#[derive(Debug, Default)]
pub struct StaticProvider {
	tokens: RwLock<HashMap<String, Identity>>,
}

impl StaticProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_token(self, token: impl Into<String>, identity: Identity) -> Self {
		self.tokens.write().insert(token.into(), identity);
		self
	}

	pub fn revoke(&self, token: &str) -> bool {
		self.tokens.write().remove(token).is_some()
	}
}

#[async_trait]
impl IdentityProvider for StaticProvider {
	async fn identify(&self, token: &str) -> anyhow::Result<Option<Identity>> {
		Ok(self.tokens.read().get(token).cloned())
	}
}
