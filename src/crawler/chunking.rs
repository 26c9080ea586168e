// src/crawler/chunking.rs
//! Token-bounded chunking of page text.
//!
//! Tokens are estimated from whitespace-separated words at
//! [`WORDS_PER_TOKEN`]. Paragraphs are packed greedily; a paragraph that is
//! larger than the budget on its own is split on word boundaries.

pub const WORDS_PER_TOKEN: f64 = 0.75;

pub fn estimate_tokens(text: &str) -> usize {
    words_to_tokens(text.split_whitespace().count())
}

fn words_to_tokens(words: usize) -> usize {
    (words as f64 / WORDS_PER_TOKEN).ceil() as usize
}

/// Largest word count whose estimate stays within `threshold` tokens.
fn word_budget(threshold: usize) -> usize {
    ((threshold as f64 * WORDS_PER_TOKEN).floor() as usize).max(1)
}

/// Split `text` into chunks of at most `threshold` estimated tokens.
pub fn chunk_by_tokens(text: &str, threshold: usize) -> Vec<String> {
    let budget = word_budget(threshold);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let words = paragraph.split_whitespace().count();

        if words > budget {
            flush(&mut chunks, &mut current, &mut current_words);
            let all: Vec<&str> = paragraph.split_whitespace().collect();
            chunks.extend(all.chunks(budget).map(|part| part.join(" ")));
            continue;
        }

        if current_words + words > budget {
            flush(&mut chunks, &mut current, &mut current_words);
        }
        current.push(paragraph);
        current_words += words;
    }
    flush(&mut chunks, &mut current, &mut current_words);
    chunks
}

fn flush<'a>(chunks: &mut Vec<String>, current: &mut Vec<&'a str>, words: &mut usize) {
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
        current.clear();
        *words = 0;
    }
}
