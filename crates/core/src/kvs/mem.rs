use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, bail, ensure};
use async_channel::Sender;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::catalog::Schema;
use crate::doc::check;
use crate::expr::order;
use crate::kvs::{ChangeEvent, ChangeFeed, RowChange, ScanRequest, Storage, Write};
use crate::val::{Row, Value};

type Table = BTreeMap<String, Row>;

/// An in-memory storage engine.
///
/// Rows are kept per table, keyed by their primary key. All writes in a
/// call to [`Storage::apply`] are checked before any of them is applied.
pub struct MemStore {
	schema: Arc<Schema>,
	tables: RwLock<BTreeMap<String, Table>>,
	feeds: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl MemStore {
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
			tables: RwLock::new(BTreeMap::new()),
			feeds: Mutex::new(Vec::new()),
		}
	}

	fn key(&self, table: &str, row: &Row) -> Result<String> {
		let tb = self.schema.expect_table(table)?;
		let key = tb.key_of(row);
		ensure!(!key.is_null(), "the row has no primary key on table '{table}'");
		Ok(key.to_string())
	}

	/// Loads rows without checking them or publishing any change
	pub fn seed<I>(&self, table: &str, rows: I) -> Result<()>
	where
		I: IntoIterator<Item = Row>,
	{
		let mut tables = self.tables.write();
		for row in rows {
			let key = self.key(table, &row)?;
			tables.entry(table.to_owned()).or_default().insert(key, row);
		}
		Ok(())
	}

	/// Fetch a row by its primary key
	pub fn get(&self, table: &str, key: &Value) -> Option<Row> {
		self.tables.read().get(table).and_then(|t| t.get(&key.to_string())).cloned()
	}

	/// The number of rows held in a table
	pub fn count(&self, table: &str) -> usize {
		self.tables.read().get(table).map(BTreeMap::len).unwrap_or_default()
	}

	/// Tells every open change feed that incremental changes are no
	/// longer available
	pub fn resync(&self, reason: impl Into<String>) {
		self.publish(ChangeEvent::Resync(reason.into()));
	}

	fn publish(&self, event: ChangeEvent) {
		let mut feeds = self.feeds.lock();
		// Drop the feeds nobody listens to anymore
		feeds.retain(|tx| !tx.is_closed());
		for tx in feeds.iter() {
			if tx.try_send(event.clone()).is_err() {
				trace!("A change feed was closed while publishing");
			}
		}
	}

	fn plan(&self, tables: &BTreeMap<String, Table>, writes: &[Write]) -> Result<Vec<(String, RowChange)>> {
		// Writes later in the batch see the effects of earlier ones
		let mut staged: BTreeMap<(String, String), Option<Row>> = BTreeMap::new();
		let mut out = Vec::with_capacity(writes.len());
		for write in writes {
			let table = write.table();
			let tb = self.schema.expect_table(table)?;
			let (key, new) = match write {
				Write::Insert {
					row,
					..
				}
				| Write::Update {
					row,
					..
				} => {
					tb.check_row(row)?;
					(self.key(table, row)?, Some(row.clone()))
				}
				Write::Delete {
					key,
					..
				} => (key.to_string(), None),
			};
			let slot = (table.to_owned(), key.clone());
			let old = match staged.get(&slot) {
				Some(v) => v.clone(),
				None => tables.get(table).and_then(|t| t.get(&key)).cloned(),
			};
			match (write, &old) {
				(Write::Insert { .. }, Some(_)) => {
					bail!("the record '{key}' already exists on table '{table}'")
				}
				(Write::Update { .. } | Write::Delete { .. }, None) => {
					bail!("the record '{key}' does not exist on table '{table}'")
				}
				_ => {}
			}
			staged.insert(slot, new.clone());
			out.push((
				key,
				RowChange {
					table: table.to_owned(),
					old,
					new,
				},
			));
		}
		Ok(out)
	}
}

#[async_trait]
impl Storage for MemStore {
	async fn scan(&self, req: &ScanRequest) -> Result<Vec<Row>> {
		self.schema.expect_table(&req.table)?;
		let tables = self.tables.read();
		let mut out = Vec::new();
		if let Some(rows) = tables.get(&req.table) {
			for row in rows.values() {
				let keep = match &req.filter {
					Some(f) => check::matches(f, row)?,
					None => true,
				};
				if keep {
					out.push(row.clone());
				}
			}
		}
		if !req.order.is_empty() {
			out.sort_by(|a, b| order::compare(&req.order, a, b));
		}
		if let Some(limit) = req.limit {
			out.truncate(limit);
		}
		Ok(out)
	}

	async fn apply(&self, writes: &[Write]) -> Result<Vec<RowChange>> {
		let changes = {
			let mut tables = self.tables.write();
			let planned = self.plan(&tables, writes)?;
			for (key, change) in planned.iter() {
				let table = tables.entry(change.table.clone()).or_default();
				match &change.new {
					Some(row) => table.insert(key.clone(), row.clone()),
					None => table.remove(key),
				};
			}
			// Publish before releasing the lock so feeds observe commit order
			let changes = planned.into_iter().map(|(_, c)| c).collect::<Vec<_>>();
			for change in changes.iter() {
				self.publish(ChangeEvent::Row(change.clone()));
			}
			changes
		};
		Ok(changes)
	}

	fn changes(&self) -> ChangeFeed {
		let (tx, rx) = async_channel::unbounded();
		self.feeds.lock().push(tx);
		rx
	}
}
