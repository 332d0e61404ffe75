use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::TableDefinition;
use crate::dbs::{Delta, Executor, Notification};
use crate::err::{Error, Result};
use crate::expr::QueryDescriptor;
use crate::iam::Identity;
use crate::kvs::{ChangeEvent, ChangeFeed, RowChange};
use crate::qry::QueryKey;
use crate::val::Row;

/// The lifecycle of a subscription
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SubscriptionState {
	/// The baseline result set has not been delivered yet
	Initializing,
	/// The baseline was delivered and changes are being streamed
	Live,
	/// No further notifications will be produced
	Closed,
}

pub(crate) type Lives = Arc<DashMap<Uuid, Arc<Live>>>;

/// The state shared between a subscription handle and the task
/// streaming its changes.
pub(crate) struct Live {
	id: Uuid,
	state: Mutex<SubscriptionState>,
	tx: Sender<Notification>,
	/// How many data notifications may be queued, when bounded. One more
	/// slot is always kept free for the final notification.
	capacity: Option<usize>,
	canceller: CancellationToken,
	/// Set once the subscriber itself closed the subscription
	abandoned: AtomicBool,
}

impl Live {
	fn new(id: Uuid, buffer: usize) -> (Arc<Self>, Receiver<Notification>) {
		let (tx, rx) = match buffer {
			0 => async_channel::unbounded(),
			n => async_channel::bounded(n + 1),
		};
		let live = Live {
			id,
			state: Mutex::new(SubscriptionState::Initializing),
			tx,
			capacity: (buffer > 0).then_some(buffer),
			canceller: CancellationToken::new(),
			abandoned: AtomicBool::new(false),
		};
		(Arc::new(live), rx)
	}

	pub(crate) fn id(&self) -> Uuid {
		self.id
	}

	pub(crate) fn state(&self) -> SubscriptionState {
		*self.state.lock()
	}

	/// Delivers a notification unless the subscription is closed
	fn send(&self, delta: Delta) -> bool {
		let mut state = self.state.lock();
		if *state == SubscriptionState::Closed {
			return false;
		}
		self.push(&mut state, delta)
	}

	/// Delivers the baseline and moves to the live state
	fn baseline(&self, rows: Vec<Row>) -> bool {
		let mut state = self.state.lock();
		if *state != SubscriptionState::Initializing {
			return false;
		}
		if !self.push(&mut state, Delta::Baseline(rows)) {
			return false;
		}
		trace!("Subscription {} is live", self.id);
		*state = SubscriptionState::Live;
		true
	}

	/// Queues a data notification. A subscriber which fell too far behind
	/// is told to resubscribe in the slot kept free for it.
	fn push(&self, state: &mut SubscriptionState, delta: Delta) -> bool {
		if self.capacity.is_some_and(|n| self.tx.len() >= n) {
			warn!("Subscription {} fell too far behind and was closed", self.id);
			self.finish(
				state,
				Delta::Resubscribe {
					reason: "the subscriber fell too far behind".to_owned(),
				},
			);
			return false;
		}
		let notification = Notification {
			id: self.id,
			delta,
		};
		match self.tx.try_send(notification) {
			Ok(()) => true,
			Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
				self.shut(state);
				false
			}
		}
	}

	/// Queues the final notification and closes the subscription
	fn finish(&self, state: &mut SubscriptionState, delta: Delta) {
		let notification = Notification {
			id: self.id,
			delta,
		};
		if self.tx.try_send(notification).is_err() {
			trace!("The subscriber of {} is already gone", self.id);
		}
		self.shut(state);
	}

	fn shut(&self, state: &mut SubscriptionState) {
		*state = SubscriptionState::Closed;
		self.tx.close();
		self.canceller.cancel();
	}

	/// Closes the subscription from the server side. The final delta, if
	/// any, is delivered after everything already queued.
	pub(crate) fn close(&self, last: Option<Delta>) {
		let mut state = self.state.lock();
		if *state == SubscriptionState::Closed {
			return;
		}
		trace!("Subscription {} is closed", self.id);
		match last {
			Some(delta) => self.finish(&mut state, delta),
			None => self.shut(&mut state),
		}
	}

	/// Closes the subscription on behalf of the subscriber. Notifications
	/// still queued are discarded.
	pub(crate) fn unsubscribe(&self) {
		self.abandoned.store(true, Ordering::Release);
		self.close(None);
	}
}

/// A stream of notifications for one subscribed query.
///
/// Dropping the subscription closes it.
#[must_use = "streams do nothing unless you poll them"]
pub struct Subscription {
	key: QueryKey,
	live: Arc<Live>,
	rx: Pin<Box<Receiver<Notification>>>,
}

impl Subscription {
	/// Starts streaming a query on its own task
	pub(crate) fn spawn(
		executor: Executor,
		query: QueryDescriptor,
		key: QueryKey,
		identity: Option<Identity>,
		lives: Lives,
		buffer: usize,
	) -> Result<Self> {
		let tb = executor.schema().expect_table(query.table_name())?.clone();
		let (live, rx) = Live::new(Uuid::now_v7(), buffer);
		// Changes are observed from before the baseline is read
		let feed = executor.storage().changes();
		lives.insert(live.id, live.clone());
		let task = Watch {
			executor,
			query,
			table: tb,
			identity,
			live: live.clone(),
			visible: BTreeMap::new(),
		};
		tokio::spawn(task.run(feed, lives));
		Ok(Self {
			key,
			live,
			rx: Box::pin(rx),
		})
	}

	pub fn id(&self) -> Uuid {
		self.live.id
	}

	pub fn key(&self) -> &QueryKey {
		&self.key
	}

	pub fn state(&self) -> SubscriptionState {
		self.live.state()
	}

	/// Closes the subscription. Calling this more than once has no further
	/// effect, and no notification is yielded once it returns.
	pub fn unsubscribe(&self) {
		self.live.unsubscribe();
	}

	pub(crate) fn live(&self) -> &Arc<Live> {
		&self.live
	}
}

impl futures::Stream for Subscription {
	type Item = Notification;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		if self.live.abandoned.load(Ordering::Acquire) {
			return Poll::Ready(None);
		}
		self.rx.poll_next_unpin(cx)
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.live.unsubscribe();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.live.id)
			.field("key", &self.key)
			.field("state", &self.state())
			.finish()
	}
}

/// The task keeping one subscription's result set up to date
struct Watch {
	executor: Executor,
	query: QueryDescriptor,
	table: TableDefinition,
	identity: Option<Identity>,
	live: Arc<Live>,
	/// The rows the subscriber currently holds, by primary key
	visible: BTreeMap<String, Row>,
}

impl Watch {
	async fn run(mut self, feed: ChangeFeed, lives: Lives) {
		let id = self.live.id;
		let canceller = self.live.canceller.clone();
		let res = tokio::select! {
			biased;
			_ = canceller.cancelled() => Ok(()),
			res = self.watch(feed) => res,
		};
		if let Err(e) = res {
			debug!("Subscription {id} failed: {e}");
			self.live.close(Some(Delta::Error(Error::Subscription {
				id: id.to_string(),
				message: e.to_string(),
			})));
		}
		lives.remove(&id);
	}

	async fn watch(&mut self, feed: ChangeFeed) -> Result<()> {
		let rows = self.executor.rows(&self.query, self.identity.as_ref()).await?;
		self.visible = self.keyed(&rows);
		if !self.live.baseline(rows) {
			return Ok(());
		}
		loop {
			let event = match feed.recv().await {
				Ok(v) => v,
				Err(_) => {
					self.live.close(Some(Delta::Resubscribe {
						reason: "the change feed was closed".to_owned(),
					}));
					return Ok(());
				}
			};
			let deltas = match event {
				ChangeEvent::Resync(reason) => {
					self.live.close(Some(Delta::Resubscribe {
						reason,
					}));
					return Ok(());
				}
				ChangeEvent::Row(change) => self.apply(change).await?,
			};
			for delta in deltas {
				if !self.live.send(delta) {
					return Ok(());
				}
			}
		}
	}

	/// Check whether a change to the subscribed table can be decided
	/// from the changed row alone. When a clause may read other rows of
	/// the same table, their visibility can change too.
	fn incremental(&self) -> bool {
		let table = self.query.table_name();
		let schema = self.executor.schema();
		self.query.row_limit().is_none()
			&& self.query.relations().is_empty()
			&& !self.query.filters().iter().any(|c| c.reads(schema, table, table))
			&& !self.executor.permissions(table).select.is_specific()
	}

	/// Check whether a change to another table can alter the result set
	fn follows_other_tables(&self) -> bool {
		!self.query.relations().is_empty()
			|| self.query.has_exists()
			|| self.query.has_permission()
			|| self.executor.permissions(self.query.table_name()).select.is_specific()
	}

	async fn apply(&mut self, change: RowChange) -> Result<Vec<Delta>> {
		if change.table == self.query.table_name() {
			if self.incremental() {
				return self.apply_row(change).await;
			}
		} else if !self.follows_other_tables() {
			return Ok(Vec::new());
		}
		self.requery().await
	}

	async fn apply_row(&mut self, change: RowChange) -> Result<Vec<Delta>> {
		let mut out = Vec::new();
		let new_key = change.new.as_ref().map(|r| self.table.key_of(r).to_string());
		// A row which moved to another key leaves under its old key
		if let Some(old) = change.old.as_ref() {
			let old_key = self.table.key_of(old).to_string();
			if new_key.as_ref() != Some(&old_key) {
				if let Some(row) = self.visible.remove(&old_key) {
					out.push(Delta::Delete(row));
				}
			}
		}
		let (Some(key), Some(row)) = (new_key, change.new) else {
			return Ok(out);
		};
		let matches = self.executor.visible(&self.query, &row, self.identity.as_ref()).await?;
		match (self.visible.remove(&key), matches) {
			(Some(before), true) => {
				if before != row {
					out.push(Delta::Update(row.clone()));
				}
				self.visible.insert(key, row);
			}
			(None, true) => {
				out.push(Delta::Create(row.clone()));
				self.visible.insert(key, row);
			}
			(Some(before), false) => out.push(Delta::Delete(before)),
			(None, false) => {}
		}
		Ok(out)
	}

	async fn requery(&mut self) -> Result<Vec<Delta>> {
		let rows = self.executor.rows(&self.query, self.identity.as_ref()).await?;
		let next = self.keyed(&rows);
		let mut out = Vec::new();
		for (key, row) in self.visible.iter() {
			if !next.contains_key(key) {
				out.push(Delta::Delete(row.clone()));
			}
		}
		for row in rows {
			let key = self.table.key_of(&row).to_string();
			match self.visible.get(&key) {
				None => out.push(Delta::Create(row)),
				Some(before) if *before != row => out.push(Delta::Update(row)),
				Some(_) => {}
			}
		}
		self.visible = next;
		Ok(out)
	}

	fn keyed(&self, rows: &[Row]) -> BTreeMap<String, Row> {
		rows.iter().map(|r| (self.table.key_of(r).to_string(), r.clone())).collect()
	}
}
