//! Fault attribution output.

use serde::{Deserialize, Serialize};

/// Which artifacts the judge wants regenerated after a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairDirective {
    pub design_needs_fix: bool,
    pub testbench_needs_fix: bool,
    pub reasoning: String,
}

impl RepairDirective {
    /// True when the judge attributed the failure to at least one artifact.
    pub fn is_actionable(&self) -> bool {
        self.design_needs_fix || self.testbench_needs_fix
    }
}
