//! Front matter extraction.
//!
//! A metadata block is recognized only when the source starts with a
//! `---` fence line at offset 0, closed by the next `---` line. The body
//! after the block is returned byte-for-byte; the payload stays opaque.

use crate::document::FrontMatter;

const FENCE: &str = "---";

#[derive(Debug)]
pub(crate) struct FrontMatterExtraction {
    pub body: String,
    pub front_matter: Option<FrontMatter>,
}

pub(crate) fn extract_front_matter(input: &str) -> FrontMatterExtraction {
    let Some(payload_start) = opening_fence_end(input) else {
        return FrontMatterExtraction {
            body: input.to_string(),
            front_matter: None,
        };
    };

    // Find the closing fence, scanning line by line from the payload.
    let mut offset = payload_start;
    while offset <= input.len() {
        let rest = &input[offset..];
        let line_end = rest.find('\n').map_or(input.len(), |i| offset + i);
        let line = input[offset..line_end].trim_end_matches('\r');
        if line == FENCE {
            let raw = input[payload_start..offset].to_string();
            let body_start = if line_end < input.len() {
                line_end + 1
            } else {
                input.len()
            };
            return FrontMatterExtraction {
                body: input[body_start..].to_string(),
                front_matter: Some(FrontMatter { raw }),
            };
        }
        if line_end == input.len() {
            break;
        }
        offset = line_end + 1;
    }

    // Unterminated fence: not front matter.
    FrontMatterExtraction {
        body: input.to_string(),
        front_matter: None,
    }
}

/// Byte offset just past the opening fence line, if the input starts
/// with one.
fn opening_fence_end(input: &str) -> Option<usize> {
    let line_end = input.find('\n')?;
    let first_line = input[..line_end].trim_end_matches('\r');
    (first_line == FENCE).then_some(line_end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_front_matter_returns_input_verbatim() {
        let input = "# Heading\n\nBody text.";
        let result = extract_front_matter(input);
        assert_eq!(result.body, input);
        assert!(result.front_matter.is_none());
    }

    #[test]
    fn front_matter_is_stripped_and_payload_returned() {
        let input = "---\ntitle: Hello\ntags: [a, b]\n---\n# Heading\n";
        let result = extract_front_matter(input);
        assert_eq!(result.body, "# Heading\n");
        assert_eq!(
            result.front_matter,
            Some(FrontMatter {
                raw: "title: Hello\ntags: [a, b]\n".to_string()
            })
        );
    }

    #[test]
    fn fence_must_start_at_offset_zero() {
        let input = "\n---\ntitle: x\n---\nbody";
        let result = extract_front_matter(input);
        assert_eq!(result.body, input);
        assert!(result.front_matter.is_none());
    }

    #[test]
    fn unterminated_fence_is_not_front_matter() {
        let input = "---\ntitle: x\nbody without closing fence";
        let result = extract_front_matter(input);
        assert_eq!(result.body, input);
        assert!(result.front_matter.is_none());
    }

    #[test]
    fn empty_payload_between_fences() {
        let input = "---\n---\nbody";
        let result = extract_front_matter(input);
        assert_eq!(result.body, "body");
        assert_eq!(result.front_matter, Some(FrontMatter { raw: String::new() }));
    }

    #[test]
    fn closing_fence_at_end_of_input_leaves_empty_body() {
        let input = "---\ntitle: x\n---";
        let result = extract_front_matter(input);
        assert_eq!(result.body, "");
        assert_eq!(
            result.front_matter,
            Some(FrontMatter {
                raw: "title: x\n".to_string()
            })
        );
    }

    #[test]
    fn crlf_fences_are_recognized() {
        let input = "---\r\ntitle: x\r\n---\r\nbody";
        let result = extract_front_matter(input);
        assert_eq!(result.body, "body");
        assert!(result.front_matter.is_some());
    }

    #[test]
    fn body_round_trip_is_lossless() {
        let body = "para one\n\n  indented\n\tline\n";
        let input = format!("---\nk: v\n---\n{body}");
        let result = extract_front_matter(&input);
        assert_eq!(result.body, body);
    }
}
