//! Grammar loading
//!
//! Grammars come from two places: grammar crates statically linked into
//! this binary (the built-in default filetypes), or shared libraries
//! resolved through the resource cache and loaded with `libloading` via
//! their exported `tree_sitter_<name>` symbol.

use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tree_sitter::Language;

use crate::protocol::{FiletypeParserDescriptor, GrammarSource};

/// A grammar ready for use, together with the library that must stay
/// loaded for as long as the `Language` (and anything derived from it,
/// like compiled queries and parse trees) is alive.
pub struct LoadedGrammar {
    pub language: Language,
    /// Present for dynamically loaded grammars; dropping it would unload
    /// the code behind `language`.
    pub library: Option<Arc<Library>>,
}

/// Look up a statically linked grammar and its bundled highlight query.
pub fn builtin_grammar(name: &str) -> Option<(Language, String)> {
    match name {
        "javascript" => Some((
            tree_sitter_javascript::LANGUAGE.into(),
            tree_sitter_javascript::HIGHLIGHT_QUERY.to_string(),
        )),
        // The TypeScript query builds on the JavaScript captures, so the
        // two are concatenated (same layering the grammar repos use).
        "typescript" => Some((
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            [
                tree_sitter_javascript::HIGHLIGHT_QUERY,
                tree_sitter_typescript::HIGHLIGHTS_QUERY,
            ]
            .join("\n"),
        )),
        _ => None,
    }
}

/// Load a grammar from a shared library on disk.
///
/// # Safety considerations
///
/// Loading an arbitrary shared library runs its initialization code. The
/// library path always comes from a configured descriptor (local path or
/// a URL the embedder chose), mirroring how editors load user-installed
/// grammars.
pub fn load_grammar_library(path: &Path, symbol_name: &str) -> Result<LoadedGrammar, String> {
    let library = unsafe { Library::new(path) }
        .map_err(|e| format!("Failed to load grammar library {}: {}", path.display(), e))?;

    let language = unsafe {
        let func: Symbol<unsafe extern "C" fn() -> Language> = library
            .get(symbol_name.as_bytes())
            .map_err(|e| format!("Symbol {} not found in {}: {}", symbol_name, path.display(), e))?;
        func()
    };

    Ok(LoadedGrammar {
        language,
        library: Some(Arc::new(library)),
    })
}

/// The symbol a grammar library is expected to export for a filetype,
/// unless the descriptor overrides it.
pub fn default_symbol(filetype: &str) -> String {
    format!("tree_sitter_{}", filetype.replace('-', "_"))
}

/// File extension for grammar shared libraries on this platform.
pub fn shared_library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Built-in default filetype parsers, registered by the client after a
/// successful `initialize()`.
pub fn default_descriptors() -> Vec<FiletypeParserDescriptor> {
    ["javascript", "typescript"]
        .into_iter()
        .map(|filetype| FiletypeParserDescriptor {
            filetype: filetype.to_string(),
            grammar: GrammarSource::Builtin(filetype.to_string()),
            queries: Vec::new(),
            symbol: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_javascript_grammar_compiles_query() {
        let (language, query_text) = builtin_grammar("javascript").unwrap();
        let query = tree_sitter::Query::new(&language, &query_text).unwrap();
        assert!(query
            .capture_names()
            .iter()
            .any(|name| *name == "keyword" || name.starts_with("keyword")));
    }

    #[test]
    fn test_builtin_unknown_grammar() {
        assert!(builtin_grammar("nonexistent-lang").is_none());
    }

    #[test]
    fn test_default_symbol_name() {
        assert_eq!(default_symbol("javascript"), "tree_sitter_javascript");
        assert_eq!(default_symbol("some-lang"), "tree_sitter_some_lang");
    }

    #[test]
    fn test_default_descriptors_are_builtin() {
        let descriptors = default_descriptors();
        assert_eq!(descriptors.len(), 2);
        for descriptor in &descriptors {
            assert!(matches!(descriptor.grammar, GrammarSource::Builtin(_)));
            assert!(descriptor.queries.is_empty());
        }
    }
}
