//! Staging Core Library
//!
//! Stages local or remote files into a managed directory and never fetches
//! them again once the target exists. Declarations are resolved into plans by
//! a pure resolver and applied through host capabilities.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod plan;
pub mod request;
pub mod resolver;
pub mod shell;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{SettingsStore, StagingSettings};
    pub use crate::manifest::{FileEntry, StagingManifest};

    // Resolution
    pub use crate::plan::{Action, PlanStep, ResolvedPlan, StepKind};
    pub use crate::request::RetrievalRequest;
    pub use crate::resolver::StagingResolver;
    pub use crate::types::{DownloaderFlavor, Transport};

    // Execution
    pub use crate::context::StagingContext;
    pub use crate::error::{StagingError, StagingResult};
    pub use crate::executor::{Capabilities, HostCapabilities, StageReport, Stager};
}
