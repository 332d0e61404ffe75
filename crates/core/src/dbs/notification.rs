use std::fmt::{self, Debug, Display};

use serde::Serialize;
use uuid::Uuid;

use crate::err::Error;
use crate::val::{Row, Value};

/// What a notification tells a subscriber about its result set.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", content = "result", rename_all = "UPPERCASE")]
pub enum Delta {
	/// The complete initial result set, always the first notification
	Baseline(Vec<Row>),
	/// A row entered the result set
	Create(Row),
	/// A row in the result set changed
	Update(Row),
	/// A row left the result set
	Delete(Row),
	/// The subscription was closed and must be recreated from scratch
	Resubscribe {
		reason: String,
	},
	/// The subscription failed and was closed
	Error(Error),
}

impl Delta {
	/// Check if no further notification follows this one
	pub fn is_terminal(&self) -> bool {
		matches!(self, Delta::Resubscribe { .. } | Delta::Error(_))
	}
}

impl Display for Delta {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Delta::Baseline(v) => write!(f, "BASELINE {}", Value::from(v.clone())),
			Delta::Create(v) => write!(f, "CREATE {v}"),
			Delta::Update(v) => write!(f, "UPDATE {v}"),
			Delta::Delete(v) => write!(f, "DELETE {v}"),
			Delta::Resubscribe {
				reason,
			} => write!(f, "RESUBSCRIBE {}", Value::from(reason)),
			Delta::Error(e) => write!(f, "ERROR {}", Value::from(e.to_string())),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
	/// The subscription this notification belongs to
	pub id: Uuid,
	/// The change to the subscription's result set
	#[serde(flatten)]
	pub delta: Delta,
}

impl Display for Notification {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Notification {{id: {}, delta: {}}}", self.id, self.delta)
	}
}
