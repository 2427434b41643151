use ulid::Ulid;

/// Builds a lexicographically sortable identifier with a type prefix,
/// e.g. `msg_01J5KQ9Z3V8Q4R6T8W0Y2A4C6E`.
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Well-known ID prefixes used across the backend.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const SESSION: &str = "ses";
    pub const CONNECTION: &str = "conn";
    pub const MESSAGE: &str = "msg";
}
