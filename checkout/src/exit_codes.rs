//! Stable exit codes for the checkout binary.

/// Phase completed. The post phase always exits with this code.
pub const OK: i32 = 0;
/// Main phase failed (invalid inputs, state persistence, or checkout).
pub const FAILED: i32 = 1;
