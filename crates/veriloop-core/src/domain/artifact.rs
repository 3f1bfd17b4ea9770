//! Persisted run artifacts.

use serde::{Deserialize, Serialize};

/// The three source artifacts produced for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// RTL design under test.
    Design,

    /// Self-checking testbench.
    Testbench,

    /// Module interface stub shared by design and testbench.
    Interface,
}

impl ArtifactKind {
    /// All artifact kinds, in generation order.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Testbench,
        ArtifactKind::Interface,
        ArtifactKind::Design,
    ];

    /// On-disk file name inside the run directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Design => "rtl.sv",
            ArtifactKind::Testbench => "tb.sv",
            ArtifactKind::Interface => "if.sv",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Design => write!(f, "design"),
            ArtifactKind::Testbench => write!(f, "testbench"),
            ArtifactKind::Interface => write!(f, "interface"),
        }
    }
}

/// An artifact with its text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub content: String,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}
