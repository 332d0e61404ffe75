use crate::cnf::PERMISSIONS_TARGET;
use crate::err::Error;

/// Receives every permission predicate failure. The affected row has
/// already been excluded by the time the reporter is called.
pub trait PermissionReporter: Send + Sync {
	fn report(&self, table: &str, error: &Error);
}

/// Reports permission failures as warning events
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl PermissionReporter for LogReporter {
	fn report(&self, table: &str, error: &Error) {
		warn!(target: PERMISSIONS_TARGET, table, error = %error, "A permission predicate failed and the row was excluded");
	}
}
