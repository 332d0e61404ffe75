use std::sync::LazyLock;

/// The publicly visible name of the engine
pub const SERVER_NAME: &str = "Syncline";

/// The tracing target used when reporting permission evaluation failures.
pub const PERMISSIONS_TARGET: &str = "syncline::permissions";

/// Specifies the largest value which can be passed to `limit()` on a query.
pub static MAX_QUERY_LIMIT: LazyLock<u32> =
	lazy_env_parse!("SYNCLINE_MAX_QUERY_LIMIT", u32, 10_000);

/// Specifies how many rows an unbounded query may return before it fails.
pub static MAX_RESULT_ROWS: LazyLock<usize> =
	lazy_env_parse!("SYNCLINE_MAX_RESULT_ROWS", usize, 100_000);

/// Specifies how deeply related and existential sub-queries may nest.
pub static MAX_QUERY_DEPTH: LazyLock<u32> = lazy_env_parse!("SYNCLINE_MAX_QUERY_DEPTH", u32, 16);

/// Specifies how many notifications may be buffered per subscription.
/// A value of 0 means the buffer is unbounded.
pub static NOTIFICATION_BUFFER: LazyLock<usize> =
	lazy_env_parse!("SYNCLINE_NOTIFICATION_BUFFER", usize, 0);

/// Specifies how many compiled LIKE patterns are kept in memory.
pub static REGEX_CACHE_SIZE: LazyLock<usize> =
	lazy_env_parse!("SYNCLINE_REGEX_CACHE_SIZE", usize, 1_000);
