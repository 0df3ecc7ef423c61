//! Index inheritance resolution for query compilation.

mod resolver;
mod scan_range;

pub use resolver::{resolve_indexes_for_view, IndexCandidate, IndexResolution, QueryShape};
pub use scan_range::{extract_constraints, ranges_for_layout, ColumnConstraint, ScanRange};
