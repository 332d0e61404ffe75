//! Definitions of the tables, relations and data models which queries and
//! mutations are checked against.

mod model;
mod permission;
mod schema;
mod table;

pub use self::model::ModelDefinition;
pub use self::permission::{Permission, PermissionKind, Permissions};
pub use self::schema::{FieldDefinition, Kind, RelationDefinition, Schema};
pub use self::table::TableDefinition;
