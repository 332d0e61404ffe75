//! Query declarations, their parameters, and the registry assigning
//! each declaration a stable name.

mod declaration;
mod key;
mod params;
mod registry;

pub use self::declaration::{BuildFn, QueryDeclaration};
pub use self::key::QueryKey;
pub use self::params::{ParamDefinition, Params};
pub use self::registry::Registry;
