//! treelight - incremental syntax highlighting over tree-sitter
//!
//! An embeddable client/worker highlighting subsystem. The embedder talks
//! to a [`HighlightClient`]; a dedicated engine thread owns every
//! tree-sitter parser, tree, and query, and streams per-line highlight
//! spans back as buffers are edited.

pub mod cache;
pub mod client;
pub mod data_paths;
pub mod engine;
pub mod highlights;
pub mod loader;
pub mod protocol;
pub mod queue;
pub mod tracing;

// Re-export commonly used types
pub use client::{HighlightClient, HighlightEvent, ParserAvailability, PLAINTEXT_FILETYPE};
pub use highlights::{HighlightSpan, LineHighlights, SyntaxHighlights};
pub use protocol::{
    ArtifactSource, Edit, FiletypeParserDescriptor, GrammarSource, PerformanceStats, Position,
};
