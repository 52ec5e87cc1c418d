//! Abbreviation derivation for Saturn Codes.
//!
//! The tag is built from the template's display name: punctuation is dropped, then
//! a single word contributes its first three characters (padded with `X`), while a
//! multi-word name contributes the first character of the first word and the last
//! character of the last word. Existing codes depend on this exact shape, including
//! the two-character result for multi-word names.

/// Tag used when the display name has no usable characters.
pub const EMPTY_ABBREVIATION: &str = "XXX";

const ABBREVIATION_LEN: usize = 3;
const PAD_CHAR: char = 'X';

/// Derives the code abbreviation from a display name.
///
/// Upper-casing is ASCII-only, so non-ASCII letters pass through unchanged.
#[must_use]
pub fn derive_abbreviation(display_name: &str) -> String {
    let cleaned: String = display_name
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    match words.as_slice() {
        [] => EMPTY_ABBREVIATION.to_string(),
        [word] => {
            let mut tag: String = word
                .chars()
                .take(ABBREVIATION_LEN)
                .map(|c| c.to_ascii_uppercase())
                .collect();
            while tag.chars().count() < ABBREVIATION_LEN {
                tag.push(PAD_CHAR);
            }
            tag
        }
        [first, .., last] => {
            let mut tag = String::with_capacity(2);
            tag.push(first_char(first));
            tag.push(last_char(last));
            tag
        }
    }
}

/// Word characters: letters, digits and underscore.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn first_char(word: &str) -> char {
    word.chars()
        .next()
        .map_or(PAD_CHAR, |c| c.to_ascii_uppercase())
}

fn last_char(word: &str) -> char {
    word.chars()
        .next_back()
        .map_or(PAD_CHAR, |c| c.to_ascii_uppercase())
}
