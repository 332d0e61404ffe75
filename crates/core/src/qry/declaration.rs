use std::fmt;

use crate::catalog::Kind;
use crate::err::Result;
use crate::expr::{QueryBuilder, QueryDescriptor};
use crate::qry::{ParamDefinition, Params};

pub type BuildFn = dyn Fn(&QueryBuilder, &Params) -> Result<QueryDescriptor> + Send + Sync;

/// A named-to-be query: a function from parameters to a descriptor.
///
/// The token identifies the declaration itself, and must stay the same
/// across deploys of the same source. Use [`declare!`](crate::declare)
/// to derive it from the declaring module.
pub struct QueryDeclaration {
	token: &'static str,
	params: Vec<ParamDefinition>,
	build: Box<BuildFn>,
}

impl QueryDeclaration {
	pub fn new<F>(token: &'static str, build: F) -> Self
	where
		F: Fn(&QueryBuilder, &Params) -> Result<QueryDescriptor> + Send + Sync + 'static,
	{
		Self {
			token,
			params: Vec::new(),
			build: Box::new(build),
		}
	}

	/// Declares a required parameter
	pub fn param(mut self, name: impl Into<String>, kind: Kind) -> Self {
		self.params.push(ParamDefinition {
			name: name.into(),
			kind,
			optional: false,
		});
		self
	}

	/// Declares a parameter which may be omitted or NULL
	pub fn optional_param(mut self, name: impl Into<String>, kind: Kind) -> Self {
		self.params.push(ParamDefinition {
			name: name.into(),
			kind,
			optional: true,
		});
		self
	}

	pub fn token(&self) -> &'static str {
		self.token
	}

	pub fn params(&self) -> &[ParamDefinition] {
		&self.params
	}

	/// Representative parameters, one per declared parameter
	pub fn placeholders(&self) -> Params {
		let mut out = Params::new();
		for p in self.params.iter() {
			// Placeholders of array and object kinds are not valid params
			if let Err(e) = out.insert(p.name.clone(), p.kind.placeholder()) {
				trace!("Skipping a placeholder for '{}': {e}", p.name);
			}
		}
		out
	}

	/// Builds the descriptor for a set of parameters
	pub fn build(&self, builder: &QueryBuilder, params: &Params) -> Result<QueryDescriptor> {
		params.validate(&self.params)?;
		(self.build)(builder, params)
	}
}

impl fmt::Debug for QueryDeclaration {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("QueryDeclaration")
			.field("token", &self.token)
			.field("params", &self.params)
			.finish_non_exhaustive()
	}
}

/// Declares a query whose token is the path of the declaring module
/// followed by the given name.
///
/// ```
/// use syncline_core::declare;
/// use syncline_core::qry::QueryDeclaration;
///
/// let all: QueryDeclaration = declare!(all_bookings, |q, _| q.table("booking"));
/// assert!(all.token().ends_with("::all_bookings"));
/// ```
#[macro_export]
macro_rules! declare {
	($name:ident, $build:expr $(,)?) => {
		$crate::qry::QueryDeclaration::new(concat!(module_path!(), "::", stringify!($name)), $build)
	};
}
