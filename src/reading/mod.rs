//! Furigana and reading normalization.
//!
//! Readings flow through here before they are stored or compared anywhere
//! else; the rest of the crate assumes katakana has already been folded to
//! hiragana.

use wana_kana::utils::is_char_kanji;

/// Fold full-width katakana (U+30A1..=U+30FA) to hiragana. Other
/// characters, including half-width katakana and Latin text, pass
/// through untouched. `None` becomes the empty string.
pub fn normalize_reading(reading: Option<&str>) -> String {
    let Some(reading) = reading else {
        return String::new();
    };

    reading
        .chars()
        .map(|ch| {
            let code = ch as u32;
            if (0x30A1..=0x30FA).contains(&code) {
                char::from_u32(code - 0x60).unwrap_or(ch)
            } else {
                ch
            }
        })
        .collect()
}

fn is_hiragana(ch: char) -> bool {
    ('\u{3041}'..='\u{309f}').contains(&ch)
}

fn is_katakana(ch: char) -> bool {
    ('\u{30a0}'..='\u{30ff}').contains(&ch) || ('\u{ff66}'..='\u{ff9f}').contains(&ch)
}

fn is_kanji(ch: char) -> bool {
    is_char_kanji(ch) || ('\u{3400}'..='\u{4dbf}').contains(&ch) || ch == '々'
}

fn is_word_char(ch: char) -> bool {
    is_hiragana(ch) || is_katakana(ch) || is_kanji(ch) || ch == 'ー'
}

fn only_hiragana(text: &str) -> String {
    text.chars().filter(|&ch| is_hiragana(ch) || ch == 'ー').collect()
}

/// Split the text before a `[` into (kept prefix, replaced base).
///
/// The base is the maximal trailing run of word characters; if that run
/// contains kanji, only the part from the first kanji onward is replaced
/// (so `入[い]` and `浮かび上[あ]がる` both work).
fn split_prefix(prefix: &str) -> (String, String) {
    if prefix.is_empty() {
        return (String::new(), String::new());
    }

    let chars: Vec<char> = prefix.chars().collect();
    let mut start = chars.len();
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }

    let chunk = &chars[start..];
    if chunk.is_empty() {
        return (prefix.to_string(), String::new());
    }

    let first_kanji = chunk.iter().position(|&ch| is_kanji(ch));

    match first_kanji {
        Some(idx) => {
            let keep: String = chars[..start + idx].iter().collect();
            let base: String = chunk[idx..].iter().collect();
            (keep, base)
        }
        None => {
            // No kanji boundary: the whole run of word characters is the base.
            let keep: String = chars[..start].iter().collect();
            let base: String = chunk.iter().collect();
            (keep, base)
        }
    }
}

/// Collapse every `base[reading]` pair in a token to its reading.
///
/// An empty bracket keeps the base text; a whitespace-only bracket keeps
/// the base and leaves the whitespace in place so the caller can split
/// the result into separate readings.
pub fn strip_furigana_token(token: &str) -> String {
    let mut result = String::new();
    let mut rest = token;

    loop {
        let Some(left) = rest.find('[') else {
            result.push_str(rest);
            break;
        };

        let Some(right_rel) = rest[left + 1..].find(']') else {
            result.push_str(rest);
            break;
        };
        let right = left + 1 + right_rel;

        let prefix = &rest[..left];
        let (keep, base) = split_prefix(prefix);
        result.push_str(&keep);

        let raw_reading = &rest[left + 1..right];
        let reading = raw_reading.trim();

        if !reading.is_empty() {
            result.push_str(reading);
        } else {
            result.push_str(&base);
            if !raw_reading.is_empty() {
                // Whitespace-only bracket: acts as a reading separator.
                result.push_str(raw_reading);
            }
        }

        rest = &rest[right + ']'.len_utf8()..];
    }

    result
}

/// Parse a furigana-annotated field into its ordered phonetic readings.
///
/// Tokens split on whitespace at bracket depth zero. Output readings are
/// restricted to hiragana and the prolonged sound mark; anything else
/// that survives normalization is dropped rather than substituted.
pub fn parse_furigana_field(field_text: &str) -> Vec<String> {
    let stripped_text = field_text.trim();
    if stripped_text.is_empty() {
        return Vec::new();
    }

    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;

    for ch in stripped_text.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            _ if ch.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut readings: Vec<String> = Vec::new();
    for token in tokens {
        for piece in strip_furigana_token(&token).split_whitespace() {
            let normalized = only_hiragana(&normalize_reading(Some(piece)));
            if !normalized.is_empty() {
                readings.push(normalized);
            }
        }
    }

    readings
}
