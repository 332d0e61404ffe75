use std::cmp;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::val::Row;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
	#[default]
	Ascending,
	Descending,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Order {
	/// The field to order by
	pub field: String,
	pub direction: Direction,
}

impl Order {
	pub fn new(field: impl Into<String>, direction: Direction) -> Self {
		Self {
			field: field.into(),
			direction,
		}
	}
}

impl fmt::Display for Order {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.field)?;
		if matches!(self.direction, Direction::Descending) {
			f.write_str(" DESC")?;
		}
		Ok(())
	}
}

/// Compares two rows by a list of sort orders, earlier orders first
pub fn compare(orders: &[Order], a: &Row, b: &Row) -> cmp::Ordering {
	for order in orders {
		let (x, y) = (a.pick(&order.field), b.pick(&order.field));
		let o = match order.direction {
			Direction::Ascending => x.total_cmp(y),
			Direction::Descending => y.total_cmp(x),
		};
		match o {
			cmp::Ordering::Equal => continue,
			o => return o,
		}
	}
	cmp::Ordering::Equal
}
