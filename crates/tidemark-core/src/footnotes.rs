//! Footnote definition pre-extraction.
//!
//! Definitions are pulled out of the body before the grammar engine runs
//! so they can be mapped as standalone block lists and aggregated into a
//! single trailing `Footnotes` block. A definition opens with
//! `[^label]: content` at column zero and continues over lines indented
//! by at least four spaces or one tab; a blank line is consumed only when
//! it is directly followed by such an indented line.

use std::sync::OnceLock;

use regex::Regex;

/// A definition as found in the source, body not yet mapped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawFootnoteDefinition {
    pub label: String,
    pub markdown: String,
}

#[derive(Debug)]
pub(crate) struct FootnoteExtraction {
    pub body: String,
    pub definitions: Vec<RawFootnoteDefinition>,
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\^([^\]]+)\]:\s*(.*)$").expect("footnote regex"))
}

pub(crate) fn extract_footnote_definitions(input: &str) -> FootnoteExtraction {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut definitions = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let opened = definition_re().captures(line).and_then(|caps| {
            let label = caps.get(1).map_or("", |m| m.as_str()).trim();
            (!label.is_empty()).then(|| (label.to_string(), caps.get(2).map_or("", |m| m.as_str())))
        });

        let Some((label, first)) = opened else {
            body_lines.push(line);
            i += 1;
            continue;
        };

        let mut content_lines: Vec<&str> = vec![first];
        let mut j = i + 1;
        while j < lines.len() {
            if let Some(stripped) = continuation(lines[j]) {
                content_lines.push(stripped);
                j += 1;
            } else if lines[j].trim().is_empty()
                && lines.get(j + 1).is_some_and(|next| continuation(next).is_some())
            {
                // Blank line inside the definition; consumed, not re-emitted.
                content_lines.push("");
                j += 1;
            } else {
                break;
            }
        }

        definitions.push(RawFootnoteDefinition {
            label,
            markdown: content_lines.join("\n").trim_end().to_string(),
        });
        i = j;
    }

    let mut body = body_lines.join("\n");
    // Keep a stable block boundary where the trailing definition was.
    if !definitions.is_empty() && !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }

    FootnoteExtraction { body, definitions }
}

/// Continuation lines carry at least one tab or four spaces of indent;
/// the indent is stripped from the definition text.
fn continuation(line: &str) -> Option<&str> {
    if line.trim().is_empty() {
        return None;
    }
    line.strip_prefix('\t').or_else(|| line.strip_prefix("    "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_footnotes_returns_body_unchanged_and_empty_definitions() {
        let result = extract_footnote_definitions("# Heading\n\nSome paragraph.");
        assert_eq!(result.body, "# Heading\n\nSome paragraph.");
        assert!(result.definitions.is_empty());
    }

    #[test]
    fn single_footnote_definition_is_extracted() {
        let result = extract_footnote_definitions("Body text.\n\n[^note]: This is the footnote.");
        assert_eq!(result.body, "Body text.\n");
        assert_eq!(
            result.definitions,
            vec![RawFootnoteDefinition {
                label: "note".to_string(),
                markdown: "This is the footnote.".to_string(),
            }]
        );
    }

    #[test]
    fn multiple_footnote_definitions_preserve_order() {
        let result = extract_footnote_definitions("[^a]: First\n[^b]: Second\n[^c]: Third");
        assert!(result.body.trim().is_empty());
        let labels: Vec<&str> = result.definitions.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(result.definitions[0].markdown, "First");
        assert_eq!(result.definitions[2].markdown, "Third");
    }

    #[test]
    fn four_space_indented_continuation_lines_are_consumed() {
        let result =
            extract_footnote_definitions("[^note]: First line\n    continuation line\n    another line");
        let def = &result.definitions[0];
        assert_eq!(def.markdown, "First line\ncontinuation line\nanother line");
        assert!(!result.body.contains("continuation"));
    }

    #[test]
    fn tab_indented_continuation_lines_are_consumed() {
        let result = extract_footnote_definitions("[^note]: First line\n\tcontinuation");
        assert_eq!(result.definitions[0].markdown, "First line\ncontinuation");
    }

    #[test]
    fn blank_line_followed_by_indented_content_stays_in_definition() {
        let result = extract_footnote_definitions("[^note]: First line\n\n    second paragraph");
        assert_eq!(result.definitions[0].markdown, "First line\n\nsecond paragraph");
    }

    #[test]
    fn footnote_at_end_of_file_without_trailing_newline() {
        let result = extract_footnote_definitions("Body.\n[^end]: End note");
        assert_eq!(result.body, "Body.\n");
        assert_eq!(result.definitions[0].label, "end");
        assert_eq!(result.definitions[0].markdown, "End note");
    }

    #[test]
    fn body_text_before_and_after_definition_is_preserved() {
        let result = extract_footnote_definitions("Before.\n\n[^note]: The note.\n\nAfter.");
        assert!(result.body.contains("Before."));
        assert!(result.body.contains("After."));
        assert_eq!(result.definitions.len(), 1);
    }

    #[test]
    fn definition_with_empty_content_yields_empty_string() {
        let result = extract_footnote_definitions("[^empty]:");
        assert_eq!(result.definitions[0].label, "empty");
        assert_eq!(result.definitions[0].markdown, "");
    }

    #[test]
    fn label_is_trimmed() {
        let result = extract_footnote_definitions("[^ spaced ]: Content");
        assert_eq!(result.definitions[0].label, "spaced");
    }

    #[test]
    fn label_that_trims_to_empty_is_not_a_definition() {
        let result = extract_footnote_definitions("[^ ]: Content");
        assert!(result.definitions.is_empty());
        assert_eq!(result.body, "[^ ]: Content");
    }

    #[test]
    fn definition_text_is_trimmed_of_trailing_whitespace_only() {
        let result = extract_footnote_definitions("[^note]: Content   \n    more   ");
        assert_eq!(result.definitions[0].markdown, "Content   \nmore");
    }

    #[test]
    fn non_indented_line_closes_the_definition() {
        let result = extract_footnote_definitions("Line 1\nLine 2\n[^n]: Note\nLine 3");
        let body_lines: Vec<&str> = result.body.split('\n').collect();
        assert!(body_lines.contains(&"Line 1"));
        assert!(body_lines.contains(&"Line 2"));
        assert!(body_lines.contains(&"Line 3"));
        assert_eq!(result.definitions[0].markdown, "Note");
    }

    #[test]
    fn duplicate_labels_are_both_extracted() {
        // Dedup policy (first definition wins) is applied when the facade
        // merges definitions, not here.
        let result = extract_footnote_definitions("[^x]: one\n[^x]: two");
        assert_eq!(result.definitions.len(), 2);
    }
}
