//! Explain output
//!
//! Deterministic, human-readable description of a query plan. Also
//! serializable for callers that want it as JSON.

use std::fmt;

use serde::Serialize;

use super::access::AccessPath;
use super::optimizer::QueryPlan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPlan {
    pub table: String,
    /// Scan type name
    pub scan_type: String,
    /// Index used, if any
    pub index: Option<String>,
    /// Hex-encoded index range bounds
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub reverse: bool,
    pub filter: Option<String>,
    /// In-memory sort, if the access path does not provide the order
    pub sort: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ExplainPlan {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let (lower_bound, upper_bound) = match &plan.access {
            AccessPath::Index { range, .. } => (
                range.lower.as_deref().map(hex),
                range.upper.as_deref().map(hex),
            ),
            AccessPath::TableScan { .. } => (None, None),
        };

        Self {
            table: plan.table.clone(),
            scan_type: plan.access.scan_type().as_str().to_string(),
            index: plan.access.index_name().map(str::to_string),
            lower_bound,
            upper_bound,
            reverse: plan.access.is_reverse(),
            filter: plan.filter.clone(),
            sort: plan
                .sort
                .as_ref()
                .map(|(path, direction)| format!("{} {}", path, direction)),
            offset: plan.offset,
            limit: plan.limit,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Table: {}", self.table)?;
        writeln!(f, "Scan Type: {}", self.scan_type)?;
        if let Some(index) = &self.index {
            writeln!(f, "Index: {}", index)?;
        }
        if let Some(lower) = &self.lower_bound {
            writeln!(f, "Lower Bound: {}", lower)?;
        }
        if let Some(upper) = &self.upper_bound {
            writeln!(f, "Upper Bound: {}", upper)?;
        }
        writeln!(
            f,
            "Direction: {}",
            if self.reverse { "REVERSE" } else { "FORWARD" }
        )?;
        if let Some(filter) = &self.filter {
            writeln!(f, "Filter: {}", filter)?;
        }
        if let Some(sort) = &self.sort {
            writeln!(f, "Sort: {}", sort)?;
        }
        if self.offset > 0 {
            writeln!(f, "Offset: {}", self.offset)?;
        }
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: {}", limit)?;
        }
        Ok(())
    }
}
