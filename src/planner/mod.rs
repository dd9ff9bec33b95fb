//! Query planner
//!
//! Chooses an access path for a query and assembles the document stream
//! that runs it.
//!
//! # Design Principles
//!
//! - Deterministic: same catalog and query give the same plan
//! - Rule-based: no statistics are consulted
//! - Safe: the WHERE clause is re-checked on every candidate, so a loose
//!   index range never changes results
//!
//! # Access Path Priority (strict order)
//!
//! 1. Indexed comparison against a constant
//! 2. Index providing the ORDER BY
//! 3. Table scan in key order

mod access;
mod explain;
mod optimizer;

pub use access::{AccessPath, IndexRange, ScanType};
pub use explain::ExplainPlan;
pub use optimizer::{QueryOptimizer, QueryPlan};
