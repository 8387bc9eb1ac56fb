//! Parsing engine worker
//!
//! Owns every tree-sitter object: parsers, trees, and compiled highlight
//! queries. Runs on a dedicated thread and processes one message at a
//! time, so per-buffer state is never touched concurrently. All results
//! flow back to the client as [`EngineReply`] messages; nothing here is
//! shared memory.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::cache;
use crate::data_paths::{LANGUAGES_SUBDIR, QUERIES_SUBDIR};
use crate::highlights::{HighlightSpan, LineHighlights, SyntaxHighlights};
use crate::loader;
use crate::protocol::{
    EngineReply, EngineRequest, FiletypeParserDescriptor, GrammarSource, PerformanceStats,
};

/// Number of samples kept for rolling parse/query averages
const PERF_WINDOW: usize = 10;

/// Byte padding applied around a changed range when the smallest node
/// containing it is the tree root. Querying the padded window instead of
/// the whole document keeps large-buffer edits cheap; the window size is a
/// heuristic, not a proven bound.
const ROOT_QUERY_PAD: usize = 512;

/// A filetype's grammar and compiled query, shared by every buffer of
/// that filetype. The library handle (for dynamically loaded grammars)
/// must outlive the language and everything derived from it.
struct ResolvedFiletype {
    language: Language,
    query: Arc<Query>,
    _library: Option<Arc<libloading::Library>>,
}

/// Per-buffer parse state (never exposed to the client)
struct BufferParser {
    parser: Parser,
    tree: Tree,
    source: String,
    resolved: Arc<ResolvedFiletype>,
    highlights: SyntaxHighlights,
}

/// Rolling window of recent parse/query durations
#[derive(Default)]
struct RollingStats {
    parse: VecDeque<Duration>,
    query: VecDeque<Duration>,
}

impl RollingStats {
    fn record_parse(&mut self, elapsed: Duration) {
        if self.parse.len() == PERF_WINDOW {
            self.parse.pop_front();
        }
        self.parse.push_back(elapsed);
    }

    fn record_query(&mut self, elapsed: Duration) {
        if self.query.len() == PERF_WINDOW {
            self.query.pop_front();
        }
        self.query.push_back(elapsed);
    }

    fn snapshot(&self) -> PerformanceStats {
        fn average_ms(samples: &VecDeque<Duration>) -> f64 {
            if samples.is_empty() {
                return 0.0;
            }
            let total: Duration = samples.iter().sum();
            total.as_secs_f64() * 1000.0 / samples.len() as f64
        }

        PerformanceStats {
            average_parse_ms: average_ms(&self.parse),
            average_query_ms: average_ms(&self.query),
            parse_samples: self.parse.len(),
            query_samples: self.query.len(),
        }
    }
}

/// The worker-side half of the highlighting subsystem.
pub struct ParsingEngine {
    reply_tx: Sender<EngineReply>,
    data_path: PathBuf,
    descriptors: HashMap<String, FiletypeParserDescriptor>,
    resolved: HashMap<String, Arc<ResolvedFiletype>>,
    buffers: HashMap<u64, BufferParser>,
    stats: RollingStats,
}

impl ParsingEngine {
    pub fn new(reply_tx: Sender<EngineReply>) -> Self {
        Self {
            reply_tx,
            data_path: PathBuf::new(),
            descriptors: HashMap::new(),
            resolved: HashMap::new(),
            buffers: HashMap::new(),
            stats: RollingStats::default(),
        }
    }

    /// Main loop: drain requests until shutdown or the client goes away.
    pub fn run(mut self, rx: Receiver<EngineRequest>) {
        while let Ok(request) = rx.recv() {
            if !self.handle(request) {
                break;
            }
        }
        tracing::debug!("Parsing engine exiting");
    }

    fn reply(&self, reply: EngineReply) {
        if self.reply_tx.send(reply).is_err() {
            tracing::debug!("Client reply channel closed");
        }
    }

    /// Handle one request. Returns false when the engine should exit.
    fn handle(&mut self, request: EngineRequest) -> bool {
        match request {
            EngineRequest::Init { data_path } => self.init(data_path),
            EngineRequest::AddFiletypeParser { descriptor } => {
                tracing::debug!("Registered filetype parser for {}", descriptor.filetype);
                self.resolved.remove(&descriptor.filetype);
                self.descriptors
                    .insert(descriptor.filetype.clone(), descriptor);
            }
            EngineRequest::PreloadParser {
                filetype,
                message_id,
            } => {
                let has_parser = self.resolve_filetype(&filetype).is_ok();
                self.reply(EngineReply::PreloadDone {
                    message_id,
                    has_parser,
                });
            }
            EngineRequest::InitializeParser {
                buffer_id,
                version,
                content,
                filetype,
                message_id,
            } => self.initialize_parser(buffer_id, version, content, &filetype, message_id),
            EngineRequest::HandleEdits {
                buffer_id,
                version,
                content,
                edits,
            } => self.handle_edits(buffer_id, version, content, &edits),
            EngineRequest::ResetBuffer {
                buffer_id,
                version,
                content,
            } => self.reset_buffer(buffer_id, version, content),
            EngineRequest::DisposeBuffer { buffer_id } => {
                if self.buffers.remove(&buffer_id).is_some() {
                    tracing::debug!("Disposed buffer {}", buffer_id);
                }
                // Reply even for unknown ids so the client never hangs on
                // a repeated removal.
                self.reply(EngineReply::BufferDisposed { buffer_id });
            }
            EngineRequest::GetPerformance { message_id } => {
                self.reply(EngineReply::Performance {
                    message_id,
                    stats: self.stats.snapshot(),
                });
            }
            EngineRequest::SetDataPath { path } => {
                tracing::info!("Data path changed to {}", path.display());
                self.data_path = path;
            }
            EngineRequest::Shutdown => return false,
        }
        true
    }

    fn init(&mut self, data_path: PathBuf) {
        self.data_path = data_path;
        let error = crate::data_paths::ensure_subdir(&self.data_path, LANGUAGES_SUBDIR)
            .and_then(|_| crate::data_paths::ensure_subdir(&self.data_path, QUERIES_SUBDIR))
            .err();
        if let Some(ref e) = error {
            tracing::error!("Engine init failed: {}", e);
        }
        self.reply(EngineReply::InitDone { error });
    }

    /// Resolve a filetype into a loaded grammar + compiled query.
    ///
    /// Successes are memoized for the engine lifetime (shared across all
    /// buffers of the filetype). Failures are not, so a transient fetch
    /// error stays retryable via `preload_parser`.
    fn resolve_filetype(&mut self, filetype: &str) -> Result<Arc<ResolvedFiletype>, String> {
        if let Some(resolved) = self.resolved.get(filetype) {
            return Ok(resolved.clone());
        }

        let descriptor = self
            .descriptors
            .get(filetype)
            .cloned()
            .ok_or_else(|| format!("no registered parser for filetype {}", filetype))?;

        let (grammar, builtin_query) = match &descriptor.grammar {
            GrammarSource::Builtin(name) => {
                let (language, query_text) = loader::builtin_grammar(name)
                    .ok_or_else(|| format!("unknown builtin grammar {}", name))?;
                (
                    loader::LoadedGrammar {
                        language,
                        library: None,
                    },
                    Some(query_text),
                )
            }
            GrammarSource::Artifact(source) => {
                let path = cache::ensure_cached(
                    source,
                    &self.data_path,
                    LANGUAGES_SUBDIR,
                    loader::shared_library_extension(),
                    true,
                    Some(filetype),
                )?;
                let symbol = descriptor
                    .symbol
                    .clone()
                    .unwrap_or_else(|| loader::default_symbol(filetype));
                (loader::load_grammar_library(&path, &symbol)?, None)
            }
        };

        let query_text = if descriptor.queries.is_empty() {
            builtin_query
                .ok_or_else(|| format!("no query sources registered for filetype {}", filetype))?
        } else {
            cache::fetch_highlight_queries(&descriptor.queries, &self.data_path, filetype)?
        };
        if query_text.trim().is_empty() {
            return Err(format!("all query sources empty for filetype {}", filetype));
        }

        let query = Query::new(&grammar.language, &query_text)
            .map_err(|e| format!("invalid highlight query for {}: {}", filetype, e))?;

        let resolved = Arc::new(ResolvedFiletype {
            language: grammar.language,
            query: Arc::new(query),
            _library: grammar.library,
        });
        self.resolved.insert(filetype.to_string(), resolved.clone());
        tracing::info!("Resolved parser for filetype {}", filetype);
        Ok(resolved)
    }

    fn initialize_parser(
        &mut self,
        buffer_id: u64,
        version: u64,
        content: String,
        filetype: &str,
        message_id: u64,
    ) {
        let resolved = match self.resolve_filetype(filetype) {
            Ok(resolved) => resolved,
            Err(reason) => {
                tracing::warn!("Parser resolution failed for {}: {}", filetype, reason);
                self.reply(EngineReply::ParserInit {
                    buffer_id,
                    message_id,
                    has_parser: false,
                    warning: Some(format!("No parser available for filetype {}", filetype)),
                    error: None,
                });
                return;
            }
        };

        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&resolved.language) {
            self.reply(EngineReply::ParserInit {
                buffer_id,
                message_id,
                has_parser: false,
                warning: None,
                error: Some(format!("Failed to bind grammar for {}: {}", filetype, e)),
            });
            return;
        }

        let started = Instant::now();
        let Some(tree) = parser.parse(&content, None) else {
            self.reply(EngineReply::ParserInit {
                buffer_id,
                message_id,
                has_parser: false,
                warning: None,
                error: Some(format!("Failed to parse buffer {}", buffer_id)),
            });
            return;
        };
        self.stats.record_parse(started.elapsed());

        let started = Instant::now();
        let lines = collect_lines(&resolved.query, tree.root_node(), None, &content);
        self.stats.record_query(started.elapsed());

        let highlights = SyntaxHighlights { lines, version };
        self.buffers.insert(
            buffer_id,
            BufferParser {
                parser,
                tree,
                source: content,
                resolved,
                highlights: highlights.clone(),
            },
        );

        self.reply(EngineReply::ParserInit {
            buffer_id,
            message_id,
            has_parser: true,
            warning: None,
            error: None,
        });
        self.reply(EngineReply::Highlights {
            buffer_id,
            version,
            highlights,
        });
    }

    fn handle_edits(
        &mut self,
        buffer_id: u64,
        version: u64,
        content: String,
        edits: &[crate::protocol::Edit],
    ) {
        let reply_tx = self.reply_tx.clone();
        let stats = &mut self.stats;
        let Some(state) = self.buffers.get_mut(&buffer_id) else {
            tracing::debug!("Edits for buffer {} without parser state", buffer_id);
            return;
        };

        for edit in edits {
            state.tree.edit(&edit.to_input_edit());
            state.highlights.shift_for_edit(edit);
        }

        let started = Instant::now();
        let Some(new_tree) = state.parser.parse(&content, Some(&state.tree)) else {
            let _ = reply_tx.send(EngineReply::Error {
                buffer_id,
                error: format!("Incremental parse failed for buffer {}", buffer_id),
            });
            return;
        };
        stats.record_parse(started.elapsed());

        let mut ranges: Vec<Range<usize>> = state
            .tree
            .changed_ranges(&new_tree)
            .map(|r| r.start_byte..r.end_byte)
            .collect();
        if ranges.is_empty() {
            // The changed-range computation comes back empty for some edit
            // shapes; fall back to the raw edit extents.
            ranges = edits
                .iter()
                .map(|e| e.start_byte..e.new_end_byte.max(e.start_byte + 1))
                .collect();
        }

        state.tree = new_tree;
        state.source = content;

        let started = Instant::now();
        for range in ranges {
            requery_range(state, range);
        }
        stats.record_query(started.elapsed());

        state.highlights.version = version;
        let _ = reply_tx.send(EngineReply::Highlights {
            buffer_id,
            version,
            highlights: state.highlights.clone(),
        });
    }

    fn reset_buffer(&mut self, buffer_id: u64, version: u64, content: String) {
        let reply_tx = self.reply_tx.clone();
        let stats = &mut self.stats;
        let Some(state) = self.buffers.get_mut(&buffer_id) else {
            tracing::debug!("Reset for buffer {} without parser state", buffer_id);
            return;
        };

        let started = Instant::now();
        let Some(tree) = state.parser.parse(&content, None) else {
            let _ = reply_tx.send(EngineReply::Error {
                buffer_id,
                error: format!("Full reparse failed for buffer {}", buffer_id),
            });
            return;
        };
        stats.record_parse(started.elapsed());

        state.tree = tree;
        state.source = content;

        let started = Instant::now();
        let lines = collect_lines(
            &state.resolved.query,
            state.tree.root_node(),
            None,
            &state.source,
        );
        stats.record_query(started.elapsed());

        state.highlights = SyntaxHighlights { lines, version };
        let _ = reply_tx.send(EngineReply::Highlights {
            buffer_id,
            version,
            highlights: state.highlights.clone(),
        });
    }
}

/// Convert a byte column to a character column on a given line.
/// Tree-sitter positions are in bytes, spans carry character indices.
fn byte_to_char_col(line: &str, byte_col: usize) -> usize {
    let byte_col = byte_col.min(line.len());
    let mut valid_byte = byte_col;
    while valid_byte > 0 && !line.is_char_boundary(valid_byte) {
        valid_byte -= 1;
    }
    line[..valid_byte].chars().count()
}

/// Row containing the given byte offset.
fn byte_to_row(source: &str, byte_offset: usize) -> usize {
    source.as_bytes()[..byte_offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// Byte offset of the first character of the line containing `offset`.
fn line_start_byte(source: &str, mut offset: usize) -> usize {
    offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    source[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Byte offset of the end of the line containing `offset`, exclusive of
/// the newline.
fn line_end_byte(source: &str, mut offset: usize) -> usize {
    offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset += 1;
    }
    source[offset..].find('\n').map_or(source.len(), |i| offset + i)
}

/// Re-run the highlight query for one changed byte range, patching the
/// stored per-line spans in place.
///
/// Descends to the smallest node fully containing the range (walking back
/// up when the initial descendant falls short). When that node is the
/// tree root, the scope is bounded to a padded byte window around the
/// range instead of running root-to-leaf over the whole document. The
/// query window is then widened to whole lines: the rows being replaced
/// can hold spans from sibling nodes outside the scope, and those only
/// come back if the window covers them.
fn requery_range(state: &mut BufferParser, range: Range<usize>) {
    let root = state.tree.root_node();
    let len = state.source.len();
    let start = range.start.min(len);
    let end = range.end.min(len).max(start);

    let mut node = root
        .descendant_for_byte_range(start, end)
        .unwrap_or(root);
    while node.start_byte() > start || node.end_byte() < end {
        match node.parent() {
            Some(parent) => node = parent,
            None => break,
        }
    }

    let (scope_start, scope_end) = if node.id() == root.id() {
        (
            start.saturating_sub(ROOT_QUERY_PAD),
            (end + ROOT_QUERY_PAD).min(len),
        )
    } else {
        (node.start_byte(), node.end_byte().min(len))
    };

    let window = line_start_byte(&state.source, scope_start)..line_end_byte(&state.source, scope_end);
    let rows = byte_to_row(&state.source, window.start)..=byte_to_row(&state.source, window.end);

    for row in rows.clone() {
        state.highlights.lines.remove(&row);
    }

    let patch = collect_lines(&state.resolved.query, root, Some(window), &state.source);
    for (row, line) in patch {
        // Captures intersecting the window can extend onto rows outside
        // it; those rows keep their existing spans.
        if rows.contains(&row) {
            state.highlights.lines.insert(row, line);
        }
    }
}

/// Run the highlight query over a node (optionally bounded to a byte
/// window) and group captures by line.
///
/// A capture spanning multiple lines becomes one span per covered line:
/// the first line keeps the true start column, later lines start at 0.
/// When two captures land on the same syntax node on a line, the earlier
/// span moves to that line's `dropped` list and the later one wins.
fn collect_lines(
    query: &Query,
    node: Node,
    byte_window: Option<Range<usize>>,
    source: &str,
) -> BTreeMap<usize, LineHighlights> {
    let mut cursor = QueryCursor::new();
    if let Some(window) = byte_window {
        cursor.set_byte_range(window);
    }

    let lines: Vec<&str> = source.lines().collect();
    let mut out: BTreeMap<usize, LineHighlights> = BTreeMap::new();
    // (row, node id) -> index into that row's spans, for override tracking
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();

    let mut captures = cursor.captures(query, node, source.as_bytes());
    while let Some((query_match, capture_idx)) = captures.next() {
        let capture = &query_match.captures[*capture_idx];
        let group = query.capture_names()[capture.index as usize];
        // Helper captures like `_parent` carry no highlight meaning
        if group.starts_with('_') {
            continue;
        }

        let captured = capture.node;
        let start = captured.start_position();
        let end = captured.end_position();

        for row in start.row..=end.row {
            let line = lines.get(row).copied().unwrap_or("");
            let line_char_len = line.chars().count();

            let (start_col, end_col) = if start.row == end.row {
                (
                    byte_to_char_col(line, start.column),
                    byte_to_char_col(line, end.column),
                )
            } else if row == start.row {
                (byte_to_char_col(line, start.column), line_char_len)
            } else if row == end.row {
                (0, byte_to_char_col(line, end.column))
            } else {
                (0, line_char_len)
            };

            if start_col >= end_col {
                continue;
            }

            let span = HighlightSpan {
                start_col,
                end_col,
                group: group.to_string(),
            };
            let entry = out.entry(row).or_default();
            match seen.entry((row, captured.id())) {
                std::collections::hash_map::Entry::Occupied(slot) => {
                    let idx = *slot.get();
                    let superseded = std::mem::replace(&mut entry.spans[idx], span);
                    entry.dropped.push(superseded);
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(entry.spans.len());
                    entry.spans.push(span);
                }
            }
        }
    }

    for line in out.values_mut() {
        line.spans.sort_by_key(|s| (s.start_col, s.end_col));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Edit, Position};
    use std::sync::mpsc;

    fn engine_with_javascript() -> (ParsingEngine, mpsc::Receiver<EngineReply>, tempfile::TempDir)
    {
        let (tx, rx) = mpsc::channel();
        let mut engine = ParsingEngine::new(tx);
        let tmp = tempfile::tempdir().unwrap();
        engine.handle(EngineRequest::Init {
            data_path: tmp.path().to_path_buf(),
        });
        let _ = rx.recv().unwrap(); // InitDone
        for descriptor in loader::default_descriptors() {
            engine.handle(EngineRequest::AddFiletypeParser { descriptor });
        }
        (engine, rx, tmp)
    }

    fn init_buffer(
        engine: &mut ParsingEngine,
        rx: &mpsc::Receiver<EngineReply>,
        buffer_id: u64,
        content: &str,
    ) -> SyntaxHighlights {
        engine.handle(EngineRequest::InitializeParser {
            buffer_id,
            version: 1,
            content: content.to_string(),
            filetype: "javascript".to_string(),
            message_id: 1,
        });
        match rx.recv().unwrap() {
            EngineReply::ParserInit { has_parser, .. } => assert!(has_parser),
            other => panic!("expected ParserInit, got {:?}", other),
        }
        match rx.recv().unwrap() {
            EngineReply::Highlights { highlights, .. } => highlights,
            other => panic!("expected Highlights, got {:?}", other),
        }
    }

    #[test]
    fn test_javascript_initial_highlights_contain_keyword() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        let highlights = init_buffer(&mut engine, &rx, 1, "const hello = \"world\";");

        assert!(highlights.contains_group("keyword"));
        assert!(highlights.contains_group("string"));
        assert_eq!(highlights.version, 1);

        // Spans stay within the line and do not overlap once sorted
        let spans = highlights.line_spans(0);
        assert!(!spans.is_empty());
        let line_len = "const hello = \"world\";".chars().count();
        for pair in spans.windows(2) {
            assert!(pair[0].end_col <= line_len);
            assert!(pair[0].start_col <= pair[1].start_col);
        }
    }

    #[test]
    fn test_unknown_filetype_reports_no_parser() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        engine.handle(EngineRequest::InitializeParser {
            buffer_id: 1,
            version: 1,
            content: "x".to_string(),
            filetype: "nonexistent-lang".to_string(),
            message_id: 7,
        });

        match rx.recv().unwrap() {
            EngineReply::ParserInit {
                has_parser,
                warning,
                message_id,
                ..
            } => {
                assert!(!has_parser);
                assert_eq!(message_id, 7);
                assert!(warning
                    .unwrap()
                    .contains("No parser available for filetype nonexistent-lang"));
            }
            other => panic!("expected ParserInit, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_updates_highlights() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        let source = "let x = 1;";
        init_buffer(&mut engine, &rx, 1, source);

        // Append a second statement: "let x = 1;\nlet y = 2;"
        let new_source = "let x = 1;\nlet y = 2;".to_string();
        engine.handle(EngineRequest::HandleEdits {
            buffer_id: 1,
            version: 2,
            content: new_source,
            edits: vec![Edit {
                start_byte: 10,
                old_end_byte: 10,
                new_end_byte: 21,
                start_position: Position::new(0, 10),
                old_end_position: Position::new(0, 10),
                new_end_position: Position::new(1, 10),
            }],
        });

        match rx.recv().unwrap() {
            EngineReply::Highlights {
                version,
                highlights,
                ..
            } => {
                assert_eq!(version, 2);
                assert!(!highlights.line_spans(0).is_empty());
                assert!(!highlights.line_spans(1).is_empty());
            }
            other => panic!("expected Highlights, got {:?}", other),
        }
    }

    #[test]
    fn test_small_edit_keeps_sibling_spans_on_line() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        let source = "let a = 1; let b = 2;";
        let before = init_buffer(&mut engine, &rx, 1, source);
        let keywords_before = before
            .line_spans(0)
            .iter()
            .filter(|s| s.group.starts_with("keyword"))
            .count();
        assert_eq!(keywords_before, 2, "spans: {:?}", before.line_spans(0));

        // Grow the second literal to "22": a one-byte insert whose changed
        // range stays inside the number node. The rest of the line must
        // survive the re-query.
        engine.handle(EngineRequest::HandleEdits {
            buffer_id: 1,
            version: 2,
            content: "let a = 1; let b = 22;".to_string(),
            edits: vec![Edit {
                start_byte: 20,
                old_end_byte: 20,
                new_end_byte: 21,
                start_position: Position::new(0, 20),
                old_end_position: Position::new(0, 20),
                new_end_position: Position::new(0, 21),
            }],
        });

        match rx.recv().unwrap() {
            EngineReply::Highlights { highlights, .. } => {
                let spans = highlights.line_spans(0);
                let keywords = spans
                    .iter()
                    .filter(|s| s.group.starts_with("keyword"))
                    .count();
                assert_eq!(keywords, 2, "spans: {:?}", spans);
                assert!(
                    spans
                        .iter()
                        .any(|s| s.group == "number" && s.start_col == 19 && s.end_col == 21),
                    "spans: {:?}",
                    spans
                );
            }
            other => panic!("expected Highlights, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_spanning_node_boundary() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        let source = "function a() {}\nfunction b() {}";
        init_buffer(&mut engine, &rx, 1, source);

        // Replace the gap between the two functions, deleting the first
        // function's closing brace: an edit shape that crosses node
        // boundaries and exercises the fallback scoping.
        let new_source = "function a() { function b() {} }".to_string();
        engine.handle(EngineRequest::HandleEdits {
            buffer_id: 1,
            version: 2,
            content: new_source.clone(),
            edits: vec![Edit {
                start_byte: 13,
                old_end_byte: 16,
                new_end_byte: 14,
                start_position: Position::new(0, 13),
                old_end_position: Position::new(1, 0),
                new_end_position: Position::new(0, 14),
            }],
        });

        match rx.recv().unwrap() {
            EngineReply::Highlights { highlights, .. } => {
                // Both `function` keywords are on line 0 now
                let spans = highlights.line_spans(0);
                let keyword_count = spans
                    .iter()
                    .filter(|s| s.group.starts_with("keyword"))
                    .count();
                assert!(keyword_count >= 2, "spans: {:?}", spans);
            }
            other => panic!("expected Highlights, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_buffer_reparses_from_scratch() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        init_buffer(&mut engine, &rx, 1, "let x = 1;");

        engine.handle(EngineRequest::ResetBuffer {
            buffer_id: 1,
            version: 5,
            content: "// nothing but a comment".to_string(),
        });

        match rx.recv().unwrap() {
            EngineReply::Highlights {
                version,
                highlights,
                ..
            } => {
                assert_eq!(version, 5);
                assert!(highlights.contains_group("comment"));
                assert!(!highlights.contains_group("number"));
            }
            other => panic!("expected Highlights, got {:?}", other),
        }
    }

    #[test]
    fn test_dispose_buffer_always_replies() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        init_buffer(&mut engine, &rx, 1, "let x = 1;");

        engine.handle(EngineRequest::DisposeBuffer { buffer_id: 1 });
        assert!(matches!(
            rx.recv().unwrap(),
            EngineReply::BufferDisposed { buffer_id: 1 }
        ));

        // Unknown id still gets a reply
        engine.handle(EngineRequest::DisposeBuffer { buffer_id: 99 });
        assert!(matches!(
            rx.recv().unwrap(),
            EngineReply::BufferDisposed { buffer_id: 99 }
        ));
    }

    #[test]
    fn test_performance_stats_roll_over() {
        let (mut engine, rx, _tmp) = engine_with_javascript();
        init_buffer(&mut engine, &rx, 1, "let x = 1;");

        for version in 2..20u64 {
            engine.handle(EngineRequest::ResetBuffer {
                buffer_id: 1,
                version,
                content: format!("let x = {};", version),
            });
            let _ = rx.recv().unwrap();
        }

        engine.handle(EngineRequest::GetPerformance { message_id: 42 });
        match rx.recv().unwrap() {
            EngineReply::Performance { message_id, stats } => {
                assert_eq!(message_id, 42);
                assert_eq!(stats.parse_samples, PERF_WINDOW);
                assert_eq!(stats.query_samples, PERF_WINDOW);
                assert!(stats.average_parse_ms >= 0.0);
            }
            other => panic!("expected Performance, got {:?}", other),
        }
    }

    #[test]
    fn test_preload_memoizes_successes_only() {
        let (mut engine, rx, _tmp) = engine_with_javascript();

        engine.handle(EngineRequest::PreloadParser {
            filetype: "javascript".to_string(),
            message_id: 1,
        });
        assert!(matches!(
            rx.recv().unwrap(),
            EngineReply::PreloadDone {
                has_parser: true,
                ..
            }
        ));
        assert!(engine.resolved.contains_key("javascript"));

        engine.handle(EngineRequest::PreloadParser {
            filetype: "nope".to_string(),
            message_id: 2,
        });
        assert!(matches!(
            rx.recv().unwrap(),
            EngineReply::PreloadDone {
                has_parser: false,
                ..
            }
        ));
        assert!(!engine.resolved.contains_key("nope"));
    }

    #[test]
    fn test_byte_to_char_col_multibyte() {
        // "é" is two bytes; byte col 3 lands after it plus one ASCII char
        let line = "éab";
        assert_eq!(byte_to_char_col(line, 0), 0);
        assert_eq!(byte_to_char_col(line, 2), 1);
        assert_eq!(byte_to_char_col(line, 3), 2);
        // Mid-codepoint byte offsets snap back to the boundary
        assert_eq!(byte_to_char_col(line, 1), 0);
    }

    #[test]
    fn test_byte_to_row() {
        let source = "ab\ncd\nef";
        assert_eq!(byte_to_row(source, 0), 0);
        assert_eq!(byte_to_row(source, 3), 1);
        assert_eq!(byte_to_row(source, 7), 2);
        assert_eq!(byte_to_row(source, 100), 2);
    }

    #[test]
    fn test_line_byte_bounds() {
        let source = "ab\ncd\nef";
        assert_eq!(line_start_byte(source, 4), 3);
        assert_eq!(line_end_byte(source, 4), 5);
        assert_eq!(line_start_byte(source, 0), 0);
        assert_eq!(line_end_byte(source, 7), 8);
        // Mid-codepoint offsets snap to boundaries instead of panicking
        let multibyte = "é\né";
        assert_eq!(line_start_byte(multibyte, 4), 3);
        assert_eq!(line_end_byte(multibyte, 4), 5);
    }
}
