use std::sync::OnceLock;

use regex::Regex;

use super::config::RecalcConfig;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid regex"))
}

fn ruby_reading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Bracketed furigana annotations inside plain expression fields.
    RE.get_or_init(|| Regex::new(r"\[[^\[\]]*\]").expect("valid regex"))
}

/// Clean an expression field before it reaches a morphemizer: drop HTML
/// markup and inline furigana annotations, collapse whitespace, and
/// optionally lower-case the result.
pub fn preprocess_text(config: &RecalcConfig, text: &str) -> String {
    let without_tags = html_tag_re().replace_all(text, " ");
    let without_ruby = ruby_reading_re().replace_all(&without_tags, "");

    let collapsed: Vec<&str> = without_ruby.split_whitespace().collect();
    let joined = collapsed.join(" ");

    if config.preprocess_lowercase {
        joined.to_lowercase()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_collapses_whitespace() {
        let config = RecalcConfig::default();
        assert_eq!(preprocess_text(&config, "<b>食べる</b>  よ"), "食べる よ");
        assert_eq!(preprocess_text(&config, "食[た]べる"), "食べる");
    }

    #[test]
    fn lowercases_when_configured() {
        let mut config = RecalcConfig::default();
        assert_eq!(preprocess_text(&config, "The Cat"), "the cat");

        config.preprocess_lowercase = false;
        assert_eq!(preprocess_text(&config, "The Cat"), "The Cat");
    }
}
