//! The closed document model produced by a parse.
//!
//! Everything here is plain immutable data: a parse builds a fresh
//! [`Document`] and never mutates it afterwards. Consumers match
//! exhaustively on [`Block`] and [`Inline`], so adding a variant is a
//! compile-time-checked change everywhere it matters.

use serde::{Deserialize, Serialize};

/// A fully parsed markdown document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub front_matter: Option<FrontMatter>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            front_matter: None,
        }
    }

    /// Document with no blocks and no front matter, used as the
    /// best-effort result when parsing fails.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Raw front matter payload stripped from the top of the source.
///
/// The payload is kept opaque; interpreting it (YAML, TOML, ...) is the
/// caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub raw: String,
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Heading {
        /// 1 through 6.
        level: u8,
        content: Vec<Inline>,
    },
    Paragraph {
        content: Vec<Inline>,
    },
    List {
        ordered: bool,
        /// Start number of an ordered list, `None` for bullet lists.
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Quote {
        blocks: Vec<Block>,
    },
    Admonition {
        kind: AdmonitionKind,
        title: Option<String>,
        blocks: Vec<Block>,
    },
    CodeBlock {
        code: String,
        language: Option<String>,
    },
    Table {
        header: Vec<TableCell>,
        /// Row-major. Rows need not be rectangular; treat missing cells
        /// as empty.
        rows: Vec<Vec<TableCell>>,
        alignments: Vec<Option<TableAlignment>>,
    },
    Image {
        source: String,
        alt: Option<String>,
    },
    ThematicBreak,
    /// Aggregated footnote definitions. At most one per document,
    /// always the last block.
    Footnotes {
        definitions: Vec<FootnoteDefinition>,
    },
    HtmlBlock {
        html: String,
    },
    DefinitionList {
        items: Vec<DefinitionItem>,
    },
}

/// Inline-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Superscript(Vec<Inline>),
    Subscript(Vec<Inline>),
    InlineCode(String),
    Link {
        destination: String,
        content: Vec<Inline>,
    },
    Image {
        source: String,
        alt: Option<String>,
    },
    FootnoteReference {
        label: String,
    },
    HtmlInline(String),
    /// A matched abbreviation with its recorded expansion.
    Abbreviation {
        text: String,
        title: String,
    },
}

/// One item of a [`Block::List`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub blocks: Vec<Block>,
    /// Task checkbox state: `None` for plain items, otherwise checked
    /// or unchecked.
    pub task: Option<bool>,
}

/// One cell of a [`Block::Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableAlignment {
    Left,
    Center,
    Right,
}

/// Callout kind recognized from a `[!KIND]` marker inside a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmonitionKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AdmonitionKind {
    /// Parse a `KIND` marker token, case-insensitively.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.to_ascii_uppercase().as_str() {
            "NOTE" => Some(Self::Note),
            "TIP" => Some(Self::Tip),
            "IMPORTANT" => Some(Self::Important),
            "WARNING" => Some(Self::Warning),
            "CAUTION" => Some(Self::Caution),
            _ => None,
        }
    }
}

/// A footnote definition with its mapped body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootnoteDefinition {
    pub label: String,
    pub blocks: Vec<Block>,
}

/// One term with its definitions inside a [`Block::DefinitionList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionItem {
    pub term: Vec<Inline>,
    pub definitions: Vec<Vec<Block>>,
}
