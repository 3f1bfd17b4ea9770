//! Failure-context text handed to generators during repair.
//!
//! Every context starts with the same hint banner, followed by tagged
//! sections holding line-numbered sources, the failure log and, for
//! mismatch repairs, the judge's reasoning.

use crate::classifier::add_line_numbers;

const HINT_BANNER: &str = "----- IMPORTANT HINT FROM PREVIOUS RUN -------";

/// Artifact the repaired output is meant to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTarget {
    Design,
    Testbench,
}

impl RepairTarget {
    fn subject(&self) -> &'static str {
        match self {
            RepairTarget::Design => "the RTL design",
            RepairTarget::Testbench => "the Testbench/ Interface Design",
        }
    }
}

/// Builder for one failure context.
#[derive(Debug, Clone)]
pub struct FailureContext {
    target: RepairTarget,
    design: Option<String>,
    testbench: Option<String>,
    failure_log: String,
    reasoning: Option<String>,
}

impl FailureContext {
    pub fn new(target: RepairTarget, failure_log: impl Into<String>) -> Self {
        Self {
            target,
            design: None,
            testbench: None,
            failure_log: failure_log.into(),
            reasoning: None,
        }
    }

    /// Include the previous design, line-numbered.
    pub fn with_design(mut self, source: &str) -> Self {
        self.design = Some(add_line_numbers(source));
        self
    }

    /// Include the previous testbench, line-numbered.
    pub fn with_testbench(mut self, source: &str) -> Self {
        self.testbench = Some(add_line_numbers(source));
        self
    }

    pub fn with_reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = Some(reasoning.to_string());
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "\n\n{HINT_BANNER}\n\nA previous run with generated code for this specification failed in simulation. \
             Keep this in mind when generating the new code for {}:\n",
            self.target.subject()
        );
        if let Some(design) = &self.design {
            out.push_str(&format!(
                "<previous_code - rtl.sv>\n{design}\n</previous_code>\n"
            ));
        }
        if let Some(testbench) = &self.testbench {
            out.push_str(&format!("<previous_tb - tb.sv>\n{testbench}\n</previous_tb>\n"));
        }
        out.push_str(&format!(
            "<failed_sim_log>\n{}\n</failed_sim_log>\n",
            self.failure_log
        ));
        if let Some(reasoning) = &self.reasoning {
            out.push_str(&format!(
                "<Output by a reasoning agent>\n{reasoning}\n</Output by a reasoning agent>\n"
            ));
        }
        out
    }
}
