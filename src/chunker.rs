use crate::config::Chunking;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub word_budget: usize,
    pub total_words: usize,
    pub chunks: Vec<Chunk>,
}

/// A contiguous slice of the normalized document text.
///
/// `text` is taken verbatim from the source, including the whitespace that
/// separates it from the next chunk, so concatenating every chunk in index order
/// reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    pub start_offset: usize, // byte offset into the normalized text
    pub boundary: Boundary,
}

/// Why a chunk ended where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    Paragraph,
    Sentence,
    HardCut,
    EndOfText,
}

#[derive(Debug, Clone, Copy)]
struct Word {
    // Byte offset where the whitespace after this word ends (next word start,
    // or the end of the text).
    gap_end: usize,
    paragraph_end: bool,
    sentence_end: bool,
}

impl ChunkPlan {
    pub fn from_text(cfg: &Chunking, text: &str) -> ChunkPlan {
        Self::split(text, cfg.words_per_chunk, cfg.lookback_words)
    }

    /// Split `text` into chunks of at most `word_budget` words. When a chunk has
    /// to be closed early, the cut goes at the last paragraph break within
    /// `lookback` words of the limit, else the last sentence end in that window,
    /// else exactly at the limit.
    pub fn split(text: &str, word_budget: usize, lookback: usize) -> ChunkPlan {
        let budget = word_budget.max(1);
        let window = lookback.min(budget - 1);
        let words = scan_words(text);

        let mut chunks = Vec::new();
        let mut start = 0usize; // word index
        let mut byte_start = 0usize;

        while start < words.len() {
            let remaining = words.len() - start;
            let (end, boundary) = if remaining <= budget {
                (words.len(), Boundary::EndOfText)
            } else {
                choose_cut(&words, start, budget, window)
            };

            let byte_end = if end == words.len() {
                text.len()
            } else {
                words[end - 1].gap_end
            };

            chunks.push(Chunk {
                index: chunks.len(),
                text: text[byte_start..byte_end].to_string(),
                word_count: end - start,
                start_offset: byte_start,
                boundary,
            });

            start = end;
            byte_start = byte_end;
        }

        ChunkPlan {
            word_budget: budget,
            total_words: words.len(),
            chunks,
        }
    }
}

// Returns the exclusive word index to cut at. `words[start..start + budget]`
// is the largest allowed chunk; candidates are scanned from the limit back
// through `window` words.
fn choose_cut(words: &[Word], start: usize, budget: usize, window: usize) -> (usize, Boundary) {
    let limit = start + budget;
    let earliest = limit - window;

    if let Some(end) = (earliest..=limit).rev().find(|&e| words[e - 1].paragraph_end) {
        return (end, Boundary::Paragraph);
    }
    if let Some(end) = (earliest..=limit).rev().find(|&e| words[e - 1].sentence_end) {
        return (end, Boundary::Sentence);
    }
    (limit, Boundary::HardCut)
}

fn scan_words(text: &str) -> Vec<Word> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = word_start.take() {
                spans.push((s, i));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(s) = word_start {
        spans.push((s, text.len()));
    }

    spans
        .iter()
        .enumerate()
        .map(|(i, &(s, e))| {
            let gap_end = spans.get(i + 1).map(|n| n.0).unwrap_or(text.len());
            let gap = &text[e..gap_end];
            Word {
                gap_end,
                paragraph_end: gap.matches('\n').count() >= 2,
                sentence_end: ends_sentence(&text[s..e]),
            }
        })
        .collect()
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '}', '»', '”', '’']);
    trimmed.ends_with(['.', '!', '?'])
}
