//! Emoji shortcode substitution on plain text runs.
//!
//! Applied during mapping to text runs only, so code spans, code blocks
//! and raw HTML keep their shortcodes literal.

use std::sync::OnceLock;

use regex::Regex;

fn shortcode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([a-zA-Z0-9_+-]+):").expect("shortcode regex"))
}

/// Replace `:name:` emoji shortcodes with their unicode emoji.
/// Unknown shortcodes stay literal.
pub(crate) fn replace_emoji_shortcodes(text: &str) -> String {
    if !text.contains(':') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in shortcode_re().captures_iter(text) {
        let whole = caps.get(0).expect("match");
        let name = caps.get(1).map_or("", |m| m.as_str());
        if let Some(emoji) = emojis::get_by_shortcode(name) {
            out.push_str(&text[last_end..whole.start()]);
            out.push_str(emoji.as_str());
            last_end = whole.end();
        }
        // Unknown shortcodes keep their literal text, colons included.
    }
    out.push_str(&text[last_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_shortcode_is_replaced() {
        assert_eq!(replace_emoji_shortcodes("Hello :smile:"), "Hello 😄");
    }

    #[test]
    fn unknown_shortcode_is_left_literal() {
        assert_eq!(
            replace_emoji_shortcodes("Hello :nonexistent_emoji:"),
            "Hello :nonexistent_emoji:"
        );
    }

    #[test]
    fn multiple_shortcodes_in_one_run() {
        assert_eq!(replace_emoji_shortcodes(":fire: and :rocket:"), "🔥 and 🚀");
    }

    #[test]
    fn known_after_unknown_shortcode() {
        assert_eq!(
            replace_emoji_shortcodes(":not_an_emoji: then :fire:"),
            ":not_an_emoji: then 🔥"
        );
    }

    #[test]
    fn text_without_colons_is_returned_as_is() {
        assert_eq!(replace_emoji_shortcodes("plain"), "plain");
    }

    #[test]
    fn lone_colons_are_untouched() {
        assert_eq!(replace_emoji_shortcodes("ratio 1:2 and 3:4"), "ratio 1:2 and 3:4");
    }
}
