//! Abbreviation definitions (`*[ABBR]: Expansion`) and their
//! whole-word substitution over the mapped document.
//!
//! Extraction runs before the grammar engine so definition lines never
//! reach it. Application is a second, structure-preserving pass that
//! rebuilds only the trees it actually changes: plain text runs are split
//! around matches into `Abbreviation` nodes; code, images, raw HTML and
//! already-substituted nodes are never rescanned, which also makes the
//! pass idempotent.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::{Block, DefinitionItem, FootnoteDefinition, Inline, ListItem, TableCell};

/// Ordered abbreviation → expansion map with LinkedHashMap semantics:
/// insertion order is kept, redefining a key updates the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AbbreviationSet {
    entries: Vec<(String, String)>,
}

impl AbbreviationSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, abbr: String, title: String) {
        match self.entries.iter_mut().find(|(key, _)| *key == abbr) {
            Some((_, value)) => *value = title,
            None => self.entries.push((abbr, title)),
        }
    }

    fn get(&self, abbr: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == abbr)
            .map(|(_, value)| value.as_str())
    }

    /// Alternation over all keys, longest first so overlapping keys
    /// resolve to the longest match under leftmost-first semantics.
    /// Word boundaries are checked separately per match (`\b` would
    /// reject keys with non-word edges like `C++` or `.NET`).
    fn pattern(&self) -> Result<Regex, regex::Error> {
        let mut keys: Vec<&str> = self.entries.iter().map(|(key, _)| key.as_str()).collect();
        keys.sort_by_key(|key| std::cmp::Reverse(key.len()));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("({alternation})"))
    }
}

#[derive(Debug)]
pub(crate) struct AbbreviationExtraction {
    pub body: String,
    pub abbreviations: AbbreviationSet,
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*\[([^\]]+)\]:\s*(.+)$").expect("abbreviation regex"))
}

pub(crate) fn extract_abbreviations(input: &str) -> AbbreviationExtraction {
    let mut body_lines = Vec::new();
    let mut abbreviations = AbbreviationSet::default();

    for line in input.split('\n') {
        match definition_re().captures(line.trim()) {
            Some(caps) => {
                let abbr = caps.get(1).map_or("", |m| m.as_str());
                let title = caps.get(2).map_or("", |m| m.as_str()).trim();
                if !abbr.is_empty() && !title.is_empty() {
                    abbreviations.insert(abbr.to_string(), title.to_string());
                }
                // Matched lines are dropped even when discarded as empty.
            }
            None => body_lines.push(line),
        }
    }

    AbbreviationExtraction {
        body: body_lines.join("\n"),
        abbreviations,
    }
}

/// Substitute abbreviation occurrences inside plain text inline nodes,
/// rebuilding every container that can hold inline content.
///
/// An empty set returns the blocks untouched.
pub(crate) fn apply_abbreviations(
    blocks: Vec<Block>,
    abbreviations: &AbbreviationSet,
) -> Result<Vec<Block>, regex::Error> {
    if abbreviations.is_empty() {
        return Ok(blocks);
    }
    let pattern = abbreviations.pattern()?;
    Ok(apply_to_blocks(blocks, abbreviations, &pattern))
}

fn apply_to_blocks(blocks: Vec<Block>, abbrs: &AbbreviationSet, re: &Regex) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|block| apply_to_block(block, abbrs, re))
        .collect()
}

fn apply_to_block(block: Block, abbrs: &AbbreviationSet, re: &Regex) -> Block {
    match block {
        Block::Heading { level, content } => Block::Heading {
            level,
            content: apply_to_inlines(content, abbrs, re),
        },
        Block::Paragraph { content } => Block::Paragraph {
            content: apply_to_inlines(content, abbrs, re),
        },
        Block::List {
            ordered,
            start,
            items,
        } => Block::List {
            ordered,
            start,
            items: items
                .into_iter()
                .map(|item| ListItem {
                    blocks: apply_to_blocks(item.blocks, abbrs, re),
                    task: item.task,
                })
                .collect(),
        },
        Block::Quote { blocks } => Block::Quote {
            blocks: apply_to_blocks(blocks, abbrs, re),
        },
        Block::Admonition {
            kind,
            title,
            blocks,
        } => Block::Admonition {
            kind,
            title,
            blocks: apply_to_blocks(blocks, abbrs, re),
        },
        Block::Table {
            header,
            rows,
            alignments,
        } => Block::Table {
            header: apply_to_cells(header, abbrs, re),
            rows: rows
                .into_iter()
                .map(|row| apply_to_cells(row, abbrs, re))
                .collect(),
            alignments,
        },
        Block::Footnotes { definitions } => Block::Footnotes {
            definitions: definitions
                .into_iter()
                .map(|def| FootnoteDefinition {
                    label: def.label,
                    blocks: apply_to_blocks(def.blocks, abbrs, re),
                })
                .collect(),
        },
        Block::DefinitionList { items } => Block::DefinitionList {
            items: items
                .into_iter()
                .map(|item| DefinitionItem {
                    term: apply_to_inlines(item.term, abbrs, re),
                    definitions: item
                        .definitions
                        .into_iter()
                        .map(|blocks| apply_to_blocks(blocks, abbrs, re))
                        .collect(),
                })
                .collect(),
        },
        Block::CodeBlock { .. }
        | Block::Image { .. }
        | Block::ThematicBreak
        | Block::HtmlBlock { .. } => block,
    }
}

fn apply_to_cells(cells: Vec<TableCell>, abbrs: &AbbreviationSet, re: &Regex) -> Vec<TableCell> {
    cells
        .into_iter()
        .map(|cell| TableCell {
            content: apply_to_inlines(cell.content, abbrs, re),
        })
        .collect()
}

fn apply_to_inlines(inlines: Vec<Inline>, abbrs: &AbbreviationSet, re: &Regex) -> Vec<Inline> {
    inlines
        .into_iter()
        .flat_map(|inline| apply_to_inline(inline, abbrs, re))
        .collect()
}

fn apply_to_inline(inline: Inline, abbrs: &AbbreviationSet, re: &Regex) -> Vec<Inline> {
    match inline {
        Inline::Text(text) => split_text(&text, abbrs, re),
        Inline::Bold(content) => vec![Inline::Bold(apply_to_inlines(content, abbrs, re))],
        Inline::Italic(content) => vec![Inline::Italic(apply_to_inlines(content, abbrs, re))],
        Inline::Strikethrough(content) => {
            vec![Inline::Strikethrough(apply_to_inlines(content, abbrs, re))]
        }
        Inline::Superscript(content) => {
            vec![Inline::Superscript(apply_to_inlines(content, abbrs, re))]
        }
        Inline::Subscript(content) => {
            vec![Inline::Subscript(apply_to_inlines(content, abbrs, re))]
        }
        Inline::Link {
            destination,
            content,
        } => vec![Inline::Link {
            destination,
            content: apply_to_inlines(content, abbrs, re),
        }],
        Inline::InlineCode(_)
        | Inline::Image { .. }
        | Inline::FootnoteReference { .. }
        | Inline::HtmlInline(_)
        | Inline::Abbreviation { .. } => vec![inline],
    }
}

fn split_text(text: &str, abbrs: &AbbreviationSet, re: &Regex) -> Vec<Inline> {
    if text.is_empty() {
        return vec![Inline::Text(String::new())];
    }

    let mut result = Vec::new();
    let mut last_end = 0;
    for found in re.find_iter(text) {
        // A match embedded in a longer word is left as plain text.
        if !standalone(text, found.start(), found.end()) {
            continue;
        }
        if found.start() > last_end {
            result.push(Inline::Text(text[last_end..found.start()].to_string()));
        }
        match abbrs.get(found.as_str()) {
            Some(title) => result.push(Inline::Abbreviation {
                text: found.as_str().to_string(),
                title: title.to_string(),
            }),
            None => result.push(Inline::Text(found.as_str().to_string())),
        }
        last_end = found.end();
    }
    if last_end < text.len() {
        result.push(Inline::Text(text[last_end..].to_string()));
    }

    if result.is_empty() {
        vec![Inline::Text(text.to_string())]
    } else {
        result
    }
}

/// A match counts only when not flanked by word characters on either
/// side, whatever characters the key itself starts or ends with.
fn standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(entries: &[(&str, &str)]) -> AbbreviationSet {
        let mut abbrs = AbbreviationSet::default();
        for (abbr, title) in entries {
            abbrs.insert((*abbr).to_string(), (*title).to_string());
        }
        abbrs
    }

    #[test]
    fn definition_lines_are_removed_from_body() {
        let result = extract_abbreviations("*[HTML]: Hyper Text Markup Language\n\nThe HTML spec.");
        assert_eq!(result.body, "\nThe HTML spec.");
        assert_eq!(result.abbreviations.len(), 1);
        assert_eq!(
            result.abbreviations.get("HTML"),
            Some("Hyper Text Markup Language")
        );
    }

    #[test]
    fn empty_abbreviation_or_expansion_is_discarded() {
        let result = extract_abbreviations("*[X]:   \n*[]: expansion\nbody");
        assert!(result.abbreviations.is_empty());
    }

    #[test]
    fn insertion_order_is_preserved_and_redefinition_updates_in_place() {
        let result = extract_abbreviations("*[A]: one\n*[B]: two\n*[A]: three");
        let abbrs = result.abbreviations;
        assert_eq!(abbrs.len(), 2);
        assert_eq!(abbrs.get("A"), Some("three"));
        let keys: Vec<&str> = abbrs.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn whole_word_matches_become_abbreviation_nodes() {
        let abbrs = set(&[("HTML", "Hyper Text Markup Language")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("The HTML spec.".to_string())],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        assert_eq!(
            result,
            vec![Block::Paragraph {
                content: vec![
                    Inline::Text("The ".to_string()),
                    Inline::Abbreviation {
                        text: "HTML".to_string(),
                        title: "Hyper Text Markup Language".to_string(),
                    },
                    Inline::Text(" spec.".to_string()),
                ],
            }]
        );
    }

    #[test]
    fn partial_words_are_not_matched() {
        let abbrs = set(&[("JS", "JavaScript")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("JSFOO is not JS-ish enough".to_string())],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        let Block::Paragraph { content } = &result[0] else {
            panic!("expected paragraph");
        };
        let matches = content
            .iter()
            .filter(|i| matches!(i, Inline::Abbreviation { .. }))
            .count();
        // "JS-ish" has a word boundary after JS; "JSFOO" does not.
        assert_eq!(matches, 1);
    }

    #[test]
    fn keys_with_non_word_edges_are_matched() {
        let abbrs = set(&[("C++", "C plus plus"), (".NET", "dotnet framework")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("Ship C++ on .NET today".to_string())],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        assert_eq!(
            result,
            vec![Block::Paragraph {
                content: vec![
                    Inline::Text("Ship ".to_string()),
                    Inline::Abbreviation {
                        text: "C++".to_string(),
                        title: "C plus plus".to_string(),
                    },
                    Inline::Text(" on ".to_string()),
                    Inline::Abbreviation {
                        text: ".NET".to_string(),
                        title: "dotnet framework".to_string(),
                    },
                    Inline::Text(" today".to_string()),
                ],
            }]
        );
    }

    #[test]
    fn non_word_edge_key_still_needs_word_boundaries() {
        let abbrs = set(&[(".NET", "dotnet framework")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("file.NETWORK stays literal".to_string())],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        let Block::Paragraph { content } = &result[0] else {
            panic!("expected paragraph");
        };
        assert!(!content.iter().any(|i| matches!(i, Inline::Abbreviation { .. })));
    }

    #[test]
    fn longest_key_wins_on_overlap() {
        let abbrs = set(&[("HTTP", "Hypertext Transfer Protocol"), ("HTTPS", "HTTP Secure")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("Use HTTPS here.".to_string())],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        let Block::Paragraph { content } = &result[0] else {
            panic!("expected paragraph");
        };
        assert!(content.iter().any(|i| matches!(
            i,
            Inline::Abbreviation { text, .. } if text == "HTTPS"
        )));
    }

    #[test]
    fn empty_set_returns_blocks_unchanged() {
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("No changes.".to_string())],
        }];
        let result = apply_abbreviations(blocks.clone(), &AbbreviationSet::default()).unwrap();
        assert_eq!(result, blocks);
    }

    #[test]
    fn application_is_idempotent() {
        let abbrs = set(&[("CSS", "Cascading Style Sheets")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Text("CSS rules".to_string())],
        }];
        let once = apply_abbreviations(blocks, &abbrs).unwrap();
        let twice = apply_abbreviations(once.clone(), &abbrs).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn code_spans_and_code_blocks_are_untouched() {
        let abbrs = set(&[("API", "Application Programming Interface")]);
        let blocks = vec![
            Block::Paragraph {
                content: vec![Inline::InlineCode("API".to_string())],
            },
            Block::CodeBlock {
                code: "API".to_string(),
                language: None,
            },
        ];
        let result = apply_abbreviations(blocks.clone(), &abbrs).unwrap();
        assert_eq!(result, blocks);
    }

    #[test]
    fn substitution_recurses_into_nested_inline_content() {
        let abbrs = set(&[("API", "Application Programming Interface")]);
        let blocks = vec![Block::Paragraph {
            content: vec![Inline::Bold(vec![Inline::Text("API".to_string())])],
        }];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        assert_eq!(
            result,
            vec![Block::Paragraph {
                content: vec![Inline::Bold(vec![Inline::Abbreviation {
                    text: "API".to_string(),
                    title: "Application Programming Interface".to_string(),
                }])],
            }]
        );
    }

    #[test]
    fn substitution_recurses_into_footnote_bodies_and_table_cells() {
        let abbrs = set(&[("W3C", "World Wide Web Consortium")]);
        let blocks = vec![
            Block::Table {
                header: vec![TableCell {
                    content: vec![Inline::Text("W3C".to_string())],
                }],
                rows: vec![],
                alignments: vec![None],
            },
            Block::Footnotes {
                definitions: vec![FootnoteDefinition {
                    label: "n".to_string(),
                    blocks: vec![Block::Paragraph {
                        content: vec![Inline::Text("By W3C.".to_string())],
                    }],
                }],
            },
        ];
        let result = apply_abbreviations(blocks, &abbrs).unwrap();
        let Block::Table { header, .. } = &result[0] else {
            panic!("expected table");
        };
        assert!(matches!(&header[0].content[0], Inline::Abbreviation { .. }));
        let Block::Footnotes { definitions } = &result[1] else {
            panic!("expected footnotes");
        };
        let Block::Paragraph { content } = &definitions[0].blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(content.iter().any(|i| matches!(i, Inline::Abbreviation { .. })));
    }
}
