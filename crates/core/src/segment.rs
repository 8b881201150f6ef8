use regex::Regex;
use std::sync::OnceLock;

const SENTENCE_PATTERN: &str = r"[^.!?]+[.!?]+";

fn sentence_regex() -> &'static Regex {
    static SENTENCE: OnceLock<Regex> = OnceLock::new();
    SENTENCE.get_or_init(|| Regex::new(SENTENCE_PATTERN).expect("sentence pattern is valid"))
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Leading whitespace is kept and trailing text without a terminator is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_regex()
        .find_iter(text)
        .map(|found| found.as_str())
        .collect()
}

pub fn fixed_chunks(text: &str, width: usize) -> Vec<&str> {
    if width == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut taken = 0;
    for (offset, _) in text.char_indices() {
        if taken == width {
            chunks.push(&text[start..offset]);
            start = offset;
            taken = 0;
        }
        taken += 1;
    }
    chunks.push(&text[start..]);
    chunks
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

pub fn first_long_word(sentence: &str) -> Option<&str> {
    sentence.split(' ').find(|word| char_len(word) > 6)
}

pub fn letters_only(word: &str) -> String {
    word.chars().filter(|ch| ch.is_ascii_alphabetic()).collect()
}
