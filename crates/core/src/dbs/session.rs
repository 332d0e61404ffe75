use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::dbs::subscription::Live;
use crate::dbs::{MutationOutcome, Server, Snapshot, Subscription};
use crate::err::Result;
use crate::iam::Identity;
use crate::qry::Params;

/// A client connection: the caller identity every request on the
/// connection runs as, and the subscriptions the connection owns.
///
/// Closing or dropping the session closes every subscription it opened.
#[derive(Debug)]
pub struct Session {
	/// The current connection id
	pub id: Uuid,
	/// The authenticated caller, or `None` when anonymous
	pub identity: Option<Identity>,
	lives: Mutex<Vec<Weak<Live>>>,
}

impl Session {
	pub fn new(identity: Option<Identity>) -> Session {
		Session {
			id: Uuid::now_v7(),
			identity,
			lives: Mutex::new(Vec::new()),
		}
	}

	/// Create a session for an authenticated caller
	pub fn for_identity(identity: Identity) -> Session {
		Session::new(Some(identity))
	}

	/// Create a session for an anonymous caller
	pub fn anonymous() -> Session {
		Session::new(None)
	}

	pub async fn query(&self, server: &Server, name: &str, params: &Params) -> Result<Snapshot> {
		server.query(name, params, self.identity.as_ref()).await
	}

	pub async fn subscribe(&self, server: &Server, name: &str, params: Params) -> Result<Subscription> {
		let subscription = server.subscribe(name, params, self.identity.clone()).await?;
		let mut lives = self.lives.lock();
		lives.retain(|v| v.strong_count() > 0);
		lives.push(Arc::downgrade(subscription.live()));
		Ok(subscription)
	}

	pub async fn mutate(&self, server: &Server, name: &str, args: &Params) -> Result<MutationOutcome> {
		server.mutate(name, args, self.identity.as_ref()).await
	}

	/// Closes every subscription opened through this session
	pub fn close(&self) {
		for live in self.lives.lock().drain(..) {
			if let Some(live) = live.upgrade() {
				trace!("Closing subscription {} of session {}", live.id(), self.id);
				live.unsubscribe();
			}
		}
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.close();
	}
}
