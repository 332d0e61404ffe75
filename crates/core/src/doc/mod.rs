//! Evaluation of filters and permissions against individual rows.

pub mod check;

mod allow;
mod document;
mod report;

pub(crate) use self::document::Context;
pub use self::report::{LogReporter, PermissionReporter};
