pub mod cache;
pub mod diagnostics;
pub mod document;
pub mod parser;

mod abbreviations;
mod emoji;
mod footnotes;
mod frontmatter;
mod mapper;

// Re-export key types for easier usage
pub use cache::ParseCache;
pub use diagnostics::{ParseDiagnostics, ParseError, ParseResult, ParseWarning};
pub use document::*;
pub use parser::{
    ConfigError, DepthLimitCallback, Parser, ParserCacheKey, ParserOptions,
    DEFAULT_MAX_TREE_DEPTH, DEFAULT_PARSE_CACHE_SIZE,
};
