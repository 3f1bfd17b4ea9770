//! Domain types shared across Veriloop crates.

pub mod artifact;
pub mod directive;
pub mod error;
pub mod stage;
pub mod verdict;

pub use artifact::{Artifact, ArtifactKind};
pub use directive::RepairDirective;
pub use error::{Result, VeriloopError};
pub use stage::Stage;
pub use verdict::Verdict;
