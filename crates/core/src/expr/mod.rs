//! The query builder and the descriptor model it produces.

pub(crate) mod builder;
pub(crate) mod cond;
pub(crate) mod operator;
pub(crate) mod order;
pub(crate) mod permission;
pub(crate) mod query;

pub use self::builder::QueryBuilder;
pub use self::cond::{
	Comparison, ExistsClause, FilterClause, and, cmp, constant, exists_in, not, or,
};
pub use self::operator::Operator;
pub use self::order::{Direction, Order};
pub use self::permission::{Environment, PermissionClause, Predicate, PredicateFn, server_where};
pub use self::query::{Cardinality, QueryDescriptor};
