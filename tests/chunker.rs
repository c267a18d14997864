use proptest::prelude::*;
use report_digest::{
    chunker::{Boundary, ChunkPlan},
    config::Chunking,
};

fn words(n: usize) -> String {
    (1..=n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn empty_text_has_no_chunks() {
    let plan = ChunkPlan::split("", 10, 3);
    assert!(plan.chunks.is_empty());
    assert_eq!(plan.total_words, 0);

    assert!(ChunkPlan::split(" \n\n\t ", 10, 3).chunks.is_empty());
}

#[test]
fn short_text_is_one_chunk() {
    let text = "Net sales rose 8% to USD 50.3 billion.";
    let plan = ChunkPlan::split(text, 2500, 250);
    assert_eq!(plan.chunks.len(), 1);
    assert_eq!(plan.chunks[0].text, text);
    assert_eq!(plan.chunks[0].word_count, 8);
    assert_eq!(plan.chunks[0].boundary, Boundary::EndOfText);
}

#[test]
fn exact_budget_is_one_chunk() {
    let plan = ChunkPlan::split(&words(2500), 2500, 250);
    assert_eq!(plan.chunks.len(), 1);
    assert_eq!(plan.chunks[0].word_count, 2500);
}

#[test]
fn one_word_over_budget_splits() {
    let plan = ChunkPlan::split(&words(2501), 2500, 250);
    assert_eq!(plan.chunks.len(), 2);
    assert_eq!(plan.chunks[0].word_count, 2500);
    assert_eq!(plan.chunks[0].boundary, Boundary::HardCut);
    assert_eq!(plan.chunks[1].word_count, 1);
}

#[test]
fn prefers_paragraph_break_near_limit() {
    // paragraph break after word 7, sentence end after word 9, budget 10
    let text = "a b c d e f g.\n\nh i. j k l m n o p";
    let plan = ChunkPlan::split(text, 10, 5);
    assert_eq!(plan.chunks[0].boundary, Boundary::Paragraph);
    assert_eq!(plan.chunks[0].word_count, 7);
    assert!(plan.chunks[1].text.starts_with("h i."));
}

#[test]
fn falls_back_to_sentence_end() {
    let text = "a b c d e f g h. i j k l m";
    let plan = ChunkPlan::split(text, 10, 5);
    assert_eq!(plan.chunks[0].boundary, Boundary::Sentence);
    assert_eq!(plan.chunks[0].word_count, 8);
    assert_eq!(plan.chunks[0].text, "a b c d e f g h. ");
}

#[test]
fn breaks_outside_lookback_are_ignored() {
    // the only sentence end is after word 2; window reaches back to word 8
    let text = "a b. c d e f g h i j k l";
    let plan = ChunkPlan::split(text, 10, 2);
    assert_eq!(plan.chunks[0].boundary, Boundary::HardCut);
    assert_eq!(plan.chunks[0].word_count, 10);
}

#[test]
fn closing_quote_still_ends_sentence() {
    let text = "one two three \"four.\" five six seven";
    let plan = ChunkPlan::split(text, 5, 3);
    assert_eq!(plan.chunks[0].boundary, Boundary::Sentence);
    assert_eq!(plan.chunks[0].word_count, 4);
}

#[test]
fn offsets_and_indices_line_up() {
    let text = "alpha beta.\n\ngamma delta.\n\nepsilon zeta.";
    let plan = ChunkPlan::split(text, 2, 1);
    assert_eq!(plan.chunks.len(), 3);
    for (i, c) in plan.chunks.iter().enumerate() {
        assert_eq!(c.index, i);
        assert!(text[c.start_offset..].starts_with(&c.text));
    }
}

#[test]
fn zero_budget_is_treated_as_one() {
    let plan = ChunkPlan::split("a b c", 0, 10);
    assert_eq!(plan.word_budget, 1);
    assert_eq!(plan.chunks.len(), 3);
}

#[test]
fn from_text_uses_configured_budget() {
    let cfg = Chunking {
        words_per_chunk: 100,
        lookback_words: 10,
    };
    let plan = ChunkPlan::from_text(&cfg, &words(250));
    assert_eq!(plan.word_budget, 100);
    assert_eq!(plan.total_words, 250);
    assert_eq!(plan.chunks.len(), 3);
}

fn document() -> impl Strategy<Value = String> {
    let word = "[A-Za-z0-9$%]{1,8}[.!?,]?";
    let sep = prop_oneof![
        6 => Just(" ".to_string()),
        1 => Just("\n".to_string()),
        1 => Just("\n\n".to_string()),
    ];
    prop::collection::vec((word, sep), 0..400).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(w, s)| format!("{w}{s}"))
            .collect::<String>()
    })
}

proptest! {
    #[test]
    fn chunks_reassemble_the_input(text in document(), budget in 1usize..60, lookback in 0usize..30) {
        let plan = ChunkPlan::split(&text, budget, lookback);
        let joined: String = plan.chunks.iter().map(|c| c.text.as_str()).collect();
        if plan.total_words == 0 {
            prop_assert!(plan.chunks.is_empty());
        } else {
            prop_assert_eq!(joined, text);
        }
    }

    #[test]
    fn chunks_respect_the_budget(text in document(), budget in 1usize..60, lookback in 0usize..30) {
        let plan = ChunkPlan::split(&text, budget, lookback);
        let mut total = 0;
        for c in &plan.chunks {
            prop_assert!(c.word_count >= 1);
            prop_assert!(c.word_count <= budget);
            prop_assert_eq!(c.word_count, c.text.split_whitespace().count());
            total += c.word_count;
        }
        prop_assert_eq!(total, plan.total_words);
        prop_assert_eq!(total, text.split_whitespace().count());
    }

    #[test]
    fn only_the_last_chunk_reaches_end_of_text(text in document(), budget in 1usize..60) {
        let plan = ChunkPlan::split(&text, budget, budget / 10);
        if let Some((last, rest)) = plan.chunks.split_last() {
            prop_assert_eq!(last.boundary, Boundary::EndOfText);
            prop_assert!(rest.iter().all(|c| c.boundary != Boundary::EndOfText));
        }
    }
}
