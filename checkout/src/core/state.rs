//! Keys and value encoding for state shared between the main and post phase.
//!
//! Values cross the process boundary as plain strings. Booleans are written
//! as the literals `"true"`/`"false"` and must read back unchanged.

use tracing::warn;

/// Set to `"true"` by the main phase; its presence marks the post invocation.
pub const IS_POST: &str = "isPost";
/// Whether the post phase should reset the workspace.
pub const POST_CLEANUP: &str = "postCleanup";
/// Absolute path of the checked-out repository.
pub const REPOSITORY_PATH: &str = "repositoryPath";

pub fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Decode a persisted boolean. Missing values are `false`.
///
/// Only the exact literal `"true"` is truthy; anything other than `"false"`
/// is logged since it was not written by [`encode_bool`].
pub fn decode_bool(key: &str, raw: Option<&str>) -> bool {
    match raw {
        Some("true") => true,
        Some("false") | None => false,
        Some(other) => {
            warn!(key, value = other, "unexpected persisted boolean, treating as false");
            false
        }
    }
}
