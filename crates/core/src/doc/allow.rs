use crate::catalog::{Permission, PermissionKind, Permissions};
use crate::doc::Context;
use crate::err::Result;
use crate::val::Row;

impl Context<'_> {
	/// Check whether the caller holds a model permission over a row
	pub async fn granted(
		&self,
		table: &str,
		permissions: &Permissions,
		kind: PermissionKind,
		row: &Row,
	) -> Result<bool> {
		match permissions.get(kind) {
			Permission::None => Ok(false),
			Permission::Full => Ok(true),
			p @ Permission::Specific(_) => {
				let allowed = self.allows(table, &[p.to_clause()], row).await?;
				if !allowed {
					trace!("The {kind} permission on table '{table}' was not granted");
				}
				Ok(allowed)
			}
		}
	}
}
