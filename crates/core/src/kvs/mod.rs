//! The storage collaborator: the trait the engine reads and writes rows
//! through, and the feed of row changes it subscribes to.

use std::fmt::{self, Display};

use async_channel::Receiver;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::expr::{FilterClause, Order};
use crate::val::{Row, Value};

pub mod mem;

pub use self::mem::MemStore;

/// A request to read rows from a single table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
	pub table: String,
	/// A filter made only of comparisons and their boolean combinations
	pub filter: Option<FilterClause>,
	pub order: Vec<Order>,
	pub limit: Option<usize>,
}

impl ScanRequest {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			..Default::default()
		}
	}
}

/// A single planned write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Write {
	/// Creates a row which must not exist yet
	Insert {
		table: String,
		row: Row,
	},
	/// Replaces an existing row, located by the primary key of the new row
	Update {
		table: String,
		row: Row,
	},
	/// Removes the row with the given primary key
	Delete {
		table: String,
		key: Value,
	},
}

impl Write {
	pub fn table(&self) -> &str {
		match self {
			Write::Insert {
				table,
				..
			}
			| Write::Update {
				table,
				..
			}
			| Write::Delete {
				table,
				..
			} => table,
		}
	}
}

impl Display for Write {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Write::Insert {
				table,
				row,
			} => write!(f, "INSERT INTO {table} {row}"),
			Write::Update {
				table,
				row,
			} => write!(f, "UPDATE {table} CONTENT {row}"),
			Write::Delete {
				table,
				key,
			} => write!(f, "DELETE {table}:{key}"),
		}
	}
}

/// A row which was created, updated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
	pub table: String,
	/// The row before the change, absent for creations
	pub old: Option<Row>,
	/// The row after the change, absent for deletions
	pub new: Option<Row>,
}

/// An event published on a storage change feed.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
	Row(RowChange),
	/// Storage can no longer guarantee incremental changes, and every
	/// subscriber must re-read from scratch
	Resync(String),
}

pub type ChangeFeed = Receiver<ChangeEvent>;

/// The storage engine the engine executes compiled queries against.
#[async_trait]
pub trait Storage: Send + Sync {
	/// Reads the rows of a table matching the request filter, in the
	/// requested order, up to the requested limit
	async fn scan(&self, req: &ScanRequest) -> anyhow::Result<Vec<Row>>;

	/// Applies every write atomically, returning the resulting changes
	async fn apply(&self, writes: &[Write]) -> anyhow::Result<Vec<RowChange>>;

	/// Opens a feed of every change applied after this call returns
	fn changes(&self) -> ChangeFeed;
}
