//! The parsing facade.
//!
//! `Parser` runs the whole pipeline: front matter extraction, footnote
//! and abbreviation pre-extraction, the grammar engine, the tree mapper,
//! footnote aggregation and the abbreviation post-pass. `parse` gives
//! just the document; the `_with_diagnostics` variants also surface
//! warnings and errors. The `_cached` variants memoize results keyed by
//! a caller-supplied document key plus the exact input text.

use std::sync::Arc;

use log::warn;

use crate::abbreviations::{apply_abbreviations, extract_abbreviations};
use crate::cache::ParseCache;
use crate::diagnostics::{ParseError, ParseResult, ParseWarning};
use crate::document::{Block, Document, FootnoteDefinition};
use crate::footnotes::extract_footnote_definitions;
use crate::frontmatter::extract_front_matter;
use crate::mapper::{map_markdown, DepthLimitReporter};

/// Deepest block nesting mapped before a subtree is truncated.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;

/// Number of parse results the cache keeps.
pub const DEFAULT_PARSE_CACHE_SIZE: usize = 16;

/// Called at most once per parse, with the nesting depth the input
/// reached past the limit.
pub type DepthLimitCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Rejected `ParserOptions` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_tree_depth must be greater than zero")]
    ZeroMaxTreeDepth,
    #[error("cache_size must be greater than zero")]
    ZeroCacheSize,
}

/// Tuning knobs for [`Parser::with_options`].
#[derive(Clone)]
pub struct ParserOptions {
    /// Deepest block nesting to map; deeper subtrees are dropped with a
    /// warning. Must be non-zero.
    pub max_tree_depth: usize,
    /// Capacity of the parse result cache. Must be non-zero.
    pub cache_size: usize,
    /// Optional hook fired the first time a parse exceeds the depth
    /// limit.
    pub on_depth_limit_exceeded: Option<DepthLimitCallback>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            cache_size: DEFAULT_PARSE_CACHE_SIZE,
            on_depth_limit_exceeded: None,
        }
    }
}

impl std::fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserOptions")
            .field("max_tree_depth", &self.max_tree_depth)
            .field("cache_size", &self.cache_size)
            .field(
                "on_depth_limit_exceeded",
                &self.on_depth_limit_exceeded.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

/// Identifies the grammar engine and the settings that shape its
/// output, for callers who key external caches on parser identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParserCacheKey {
    pub engine: &'static str,
    pub max_tree_depth: usize,
}

pub struct Parser {
    max_tree_depth: usize,
    on_depth_limit_exceeded: Option<DepthLimitCallback>,
    cache: ParseCache<String>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Parser with default depth limit and cache size.
    pub fn new() -> Self {
        Self::from_validated(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Result<Self, ConfigError> {
        if options.max_tree_depth == 0 {
            return Err(ConfigError::ZeroMaxTreeDepth);
        }
        if options.cache_size == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        Ok(Self::from_validated(options))
    }

    fn from_validated(options: ParserOptions) -> Self {
        Self {
            max_tree_depth: options.max_tree_depth,
            on_depth_limit_exceeded: options.on_depth_limit_exceeded,
            cache: ParseCache::new(options.cache_size),
        }
    }

    /// Parse `input` into a document, discarding diagnostics.
    pub fn parse(&self, input: &str) -> Document {
        self.parse_with_diagnostics(input).document
    }

    /// Parse `input`, returning the document together with any warnings
    /// and errors. Failures yield an empty document plus an error entry
    /// rather than propagating.
    pub fn parse_with_diagnostics(&self, input: &str) -> ParseResult {
        match self.parse_pipeline(input) {
            Ok(result) => result,
            Err(error) => {
                warn!("parse failed: {error}");
                let mut result = ParseResult::new(Document::empty());
                result.diagnostics.errors.push(ParseError::ParserFailure {
                    message: error.to_string(),
                });
                result
            }
        }
    }

    /// Like [`Parser::parse`], backed by the result cache. `key` names
    /// the document; a cache hit requires both the key and the input
    /// text to match.
    pub fn parse_cached(&self, key: &str, input: &str) -> Document {
        self.parse_cached_with_diagnostics(key, input).document
    }

    /// Like [`Parser::parse_with_diagnostics`], backed by the result
    /// cache. Results with errors are never cached.
    pub fn parse_cached_with_diagnostics(&self, key: &str, input: &str) -> ParseResult {
        self.cache
            .get_or_put(key.to_string(), input, || self.parse_with_diagnostics(input))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Key describing this parser's engine and shaping configuration.
    pub fn cache_key(&self) -> ParserCacheKey {
        ParserCacheKey {
            engine: "pulldown-cmark",
            max_tree_depth: self.max_tree_depth,
        }
    }

    fn parse_pipeline(&self, input: &str) -> Result<ParseResult, regex::Error> {
        let front = extract_front_matter(input);
        let footnote_pass = extract_footnote_definitions(&front.body);
        let abbreviation_pass = extract_abbreviations(&footnote_pass.body);

        let mut reporter = DepthLimitReporter::new(self.on_depth_limit_exceeded.as_deref());

        let outcome = map_markdown(&abbreviation_pass.body, self.max_tree_depth, &mut reporter);
        let mut blocks = outcome.blocks;
        let mut inline_definitions = outcome.inline_footnotes;

        // Pre-extracted definition bodies go through the same mapper,
        // sharing the depth reporter so the warning stays single.
        let mut definitions: Vec<FootnoteDefinition> = Vec::new();
        for raw in footnote_pass.definitions {
            let mapped = map_markdown(&raw.markdown, self.max_tree_depth, &mut reporter);
            inline_definitions.extend(mapped.inline_footnotes);
            push_unique(
                &mut definitions,
                FootnoteDefinition {
                    label: raw.label,
                    blocks: mapped.blocks,
                },
            );
        }
        for definition in inline_definitions {
            push_unique(&mut definitions, definition);
        }
        if !definitions.is_empty() {
            blocks.push(Block::Footnotes { definitions });
        }

        let blocks = apply_abbreviations(blocks, &abbreviation_pass.abbreviations)?;

        let mut result = ParseResult::new(Document {
            blocks,
            front_matter: front.front_matter,
        });
        if let Some(exceeded_depth) = reporter.exceeded_depth() {
            warn!(
                "tree depth limit exceeded: reached {exceeded_depth}, limit {}",
                self.max_tree_depth
            );
            result
                .diagnostics
                .warnings
                .push(ParseWarning::DepthLimitExceeded {
                    max_tree_depth: self.max_tree_depth,
                    exceeded_depth,
                });
        }
        Ok(result)
    }
}

/// First definition of a label wins; later ones are dropped.
fn push_unique(definitions: &mut Vec<FootnoteDefinition>, candidate: FootnoteDefinition) {
    if definitions.iter().any(|d| d.label == candidate.label) {
        return;
    }
    definitions.push(candidate);
}
