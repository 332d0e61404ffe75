use std::fmt::{self, Display, Formatter};

use crate::expr::{FilterClause, PermissionClause};

/// The row-level permissions of a data model, one per kind of access.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Permissions {
	pub select: Permission,
	pub insert: Permission,
	pub update: Permission,
	pub delete: Permission,
}

impl Permissions {
	pub fn none() -> Self {
		Permissions {
			select: Permission::None,
			insert: Permission::None,
			update: Permission::None,
			delete: Permission::None,
		}
	}

	pub fn full() -> Self {
		Permissions {
			select: Permission::Full,
			insert: Permission::Full,
			update: Permission::Full,
			delete: Permission::Full,
		}
	}

	pub fn is_none(&self) -> bool {
		self.select.is_none()
			&& self.insert.is_none()
			&& self.update.is_none()
			&& self.delete.is_none()
	}

	pub fn is_full(&self) -> bool {
		self.select.is_full()
			&& self.insert.is_full()
			&& self.update.is_full()
			&& self.delete.is_full()
	}

	pub fn get(&self, kind: PermissionKind) -> &Permission {
		match kind {
			PermissionKind::Select => &self.select,
			PermissionKind::Insert => &self.insert,
			PermissionKind::Update => &self.update,
			PermissionKind::Delete => &self.delete,
		}
	}

	/// The permission clauses bound by these permissions
	pub(crate) fn clauses(&self) -> impl Iterator<Item = &PermissionClause> {
		[&self.select, &self.insert, &self.update, &self.delete].into_iter().filter_map(|p| {
			match p {
				Permission::Specific(v) => Some(v),
				_ => None,
			}
		})
	}
}

impl Display for Permissions {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "PERMISSIONS")?;
		if self.is_none() {
			return write!(f, " NONE");
		}
		if self.is_full() {
			return write!(f, " FULL");
		}
		let mut lines = Vec::<(Vec<PermissionKind>, &Permission)>::new();
		for kind in PermissionKind::ALL {
			let permission = self.get(kind);
			if let Some((existing, _)) = lines.iter_mut().find(|(_, p)| p.same_rule(permission)) {
				existing.push(kind);
			} else {
				lines.push((vec![kind], permission));
			}
		}
		for (i, (kinds, permission)) in lines.into_iter().enumerate() {
			f.write_str(if i > 0 {
				", FOR "
			} else {
				" FOR "
			})?;
			for (i, kind) in kinds.into_iter().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				f.write_str(kind.as_str())?;
			}
			write!(f, " {permission}")?;
		}
		Ok(())
	}
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum PermissionKind {
	Select,
	Insert,
	Update,
	Delete,
}

impl PermissionKind {
	pub(crate) const ALL: [PermissionKind; 4] = [
		PermissionKind::Select,
		PermissionKind::Insert,
		PermissionKind::Update,
		PermissionKind::Delete,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionKind::Select => "select",
			PermissionKind::Insert => "insert",
			PermissionKind::Update => "update",
			PermissionKind::Delete => "delete",
		}
	}
}

impl Display for PermissionKind {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Permission {
	None,
	#[default]
	Full,
	Specific(PermissionClause),
}

impl Permission {
	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}

	pub fn is_full(&self) -> bool {
		matches!(self, Self::Full)
	}

	pub fn is_specific(&self) -> bool {
		matches!(self, Self::Specific(_))
	}

	/// Check if two permissions are the same rule. Specific permissions
	/// must share one predicate instance.
	fn same_rule(&self, other: &Permission) -> bool {
		match (self, other) {
			(Self::Specific(a), Self::Specific(b)) => a.same_predicate(b),
			(a, b) => a == b,
		}
	}

	/// The filter a row must satisfy to be granted this permission
	pub(crate) fn to_clause(&self) -> FilterClause {
		match self {
			Self::None => FilterClause::Constant(false),
			Self::Full => FilterClause::Constant(true),
			Self::Specific(v) => FilterClause::Permission(v.clone()),
		}
	}
}

impl From<PermissionClause> for Permission {
	fn from(v: PermissionClause) -> Self {
		Self::Specific(v)
	}
}

impl Display for Permission {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Self::None => f.write_str("NONE"),
			Self::Full => f.write_str("FULL"),
			Self::Specific(v) => write!(f, "WHERE {v}"),
		}
	}
}
