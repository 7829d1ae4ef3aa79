//! The type for database row IDs.

/// Alias for SQLite integer row IDs.
pub type DatabaseId = i64;
