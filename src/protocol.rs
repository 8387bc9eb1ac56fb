//! Message protocol between the highlighting client and the parsing engine
//!
//! All cross-thread interaction goes through these typed messages; no
//! tree-sitter state ever crosses the channel. Round-trip requests carry a
//! `message_id` the client uses to correlate the reply.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tree_sitter::{InputEdit, Point};

use crate::highlights::SyntaxHighlights;

/// A row/column position in the buffer (byte-based column, like tree-sitter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<Position> for Point {
    fn from(pos: Position) -> Self {
        Point {
            row: pos.row,
            column: pos.column,
        }
    }
}

/// A single text edit, in the shape tree-sitter expects for tree mutation.
///
/// Also used as the fallback re-query scope when the changed-range
/// computation between the old and new tree yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_position: Position,
    pub old_end_position: Position,
    pub new_end_position: Position,
}

impl Edit {
    pub fn to_input_edit(&self) -> InputEdit {
        InputEdit {
            start_byte: self.start_byte,
            old_end_byte: self.old_end_byte,
            new_end_byte: self.new_end_byte,
            start_position: self.start_position.into(),
            old_end_position: self.old_end_position.into(),
            new_end_position: self.new_end_position.into(),
        }
    }
}

/// Where a grammar or query artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Fetched over HTTP and cached on disk
    Url(String),
    /// Read directly from the local filesystem, never cached
    Path(PathBuf),
}

/// Where the grammar for a filetype comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarSource {
    /// A grammar statically linked into this binary (e.g. `javascript`)
    Builtin(String),
    /// A shared library loaded from the given source
    Artifact(ArtifactSource),
}

/// A filetype-to-parser mapping supplied by configuration.
///
/// Resolved lazily by the engine into a loaded grammar and compiled query,
/// shared across all buffers of the same filetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiletypeParserDescriptor {
    pub filetype: String,
    pub grammar: GrammarSource,
    /// Query sources, concatenated in order. May be empty for builtin
    /// grammars, which bundle their own highlight query.
    #[serde(default)]
    pub queries: Vec<ArtifactSource>,
    /// Symbol exported by a grammar shared library. Defaults to
    /// `tree_sitter_<filetype>`.
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Rolling parse/query timing averages reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub average_parse_ms: f64,
    pub average_query_ms: f64,
    pub parse_samples: usize,
    pub query_samples: usize,
}

/// Client-to-engine requests
#[derive(Debug)]
pub enum EngineRequest {
    Init {
        data_path: PathBuf,
    },
    AddFiletypeParser {
        descriptor: FiletypeParserDescriptor,
    },
    PreloadParser {
        filetype: String,
        message_id: u64,
    },
    InitializeParser {
        buffer_id: u64,
        version: u64,
        content: String,
        filetype: String,
        message_id: u64,
    },
    HandleEdits {
        buffer_id: u64,
        version: u64,
        content: String,
        edits: Vec<Edit>,
    },
    ResetBuffer {
        buffer_id: u64,
        version: u64,
        content: String,
    },
    DisposeBuffer {
        buffer_id: u64,
    },
    GetPerformance {
        message_id: u64,
    },
    SetDataPath {
        path: PathBuf,
    },
    Shutdown,
}

/// Engine-to-client replies
#[derive(Debug, Clone)]
pub enum EngineReply {
    InitDone {
        error: Option<String>,
    },
    ParserInit {
        buffer_id: u64,
        message_id: u64,
        has_parser: bool,
        warning: Option<String>,
        error: Option<String>,
    },
    PreloadDone {
        message_id: u64,
        has_parser: bool,
    },
    Highlights {
        buffer_id: u64,
        version: u64,
        highlights: SyntaxHighlights,
    },
    Warning {
        buffer_id: u64,
        warning: String,
    },
    Error {
        buffer_id: u64,
        error: String,
    },
    BufferDisposed {
        buffer_id: u64,
    },
    Performance {
        message_id: u64,
        stats: PerformanceStats,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_to_input_edit() {
        let edit = Edit {
            start_byte: 5,
            old_end_byte: 5,
            new_end_byte: 6,
            start_position: Position::new(0, 5),
            old_end_position: Position::new(0, 5),
            new_end_position: Position::new(0, 6),
        };

        let input = edit.to_input_edit();
        assert_eq!(input.start_byte, 5);
        assert_eq!(input.new_end_byte, 6);
        assert_eq!(input.new_end_position.column, 6);
    }

    #[test]
    fn test_descriptor_json_round_trip() {
        let descriptor = FiletypeParserDescriptor {
            filetype: "zig".to_string(),
            grammar: GrammarSource::Artifact(ArtifactSource::Url(
                "https://example.com/zig.so".to_string(),
            )),
            queries: vec![ArtifactSource::Url(
                "https://example.com/highlights.scm".to_string(),
            )],
            symbol: Some("tree_sitter_zig".to_string()),
        };

        let json = serde_json::to_string(&descriptor).unwrap();
        let back: FiletypeParserDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }

    #[test]
    fn test_descriptor_defaults_from_json() {
        let json = r#"{"filetype":"javascript","grammar":{"builtin":"javascript"}}"#;
        let descriptor: FiletypeParserDescriptor = serde_json::from_str(json).unwrap();
        assert!(descriptor.queries.is_empty());
        assert!(descriptor.symbol.is_none());
    }
}
