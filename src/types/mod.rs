//! Data types for the metrics store
//!
//! Paths into records, flattened column descriptors, and grouping results.

mod count;
mod field;
mod path;

pub use count::GroupCountResult;
pub use field::{ColumnType, FlatField};
pub use path::{is_valid_separator, FieldPath, PathError, PathSegment, DEFAULT_SEPARATOR};

/// Check if value is zero (for skip_serializing_if)
pub fn is_zero(val: &u64) -> bool {
    *val == 0
}
