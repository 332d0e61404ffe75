//! The sync server: composition, query execution, subscriptions and
//! mutations.

mod executor;
mod mutation;
mod notification;
mod server;
mod session;
mod subscription;
mod validate;

pub use self::executor::{Executor, Snapshot};
pub use self::mutation::{Mutation, MutationAction, MutationFactory, MutationOutcome, PlanFn};
pub use self::notification::{Delta, Notification};
pub use self::server::{Server, ServerConfig};
pub use self::session::Session;
pub use self::subscription::{Subscription, SubscriptionState};
