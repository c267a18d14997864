//! Cleanup of extracted PDF text before chunking.

use crate::{config::Normalize, error::ConfigError};
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Normalization rules with their line patterns compiled once.
pub struct Normalizer {
    cfg: Normalize,
    patterns: Vec<Regex>,
}

impl Normalizer {
    pub fn new(cfg: &Normalize) -> Result<Self, ConfigError> {
        let patterns = cfg
            .regex
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            cfg: cfg.clone(),
            patterns,
        })
    }

    /// Returns normalized text: paragraphs separated by exactly one blank line,
    /// no leading or trailing whitespace. Empty when nothing survives.
    pub fn normalize(&self, raw: &str) -> String {
        let mut s = if self.cfg.normalize_newlines {
            raw.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            raw.to_string()
        };

        // Page breaks become paragraph breaks.
        s = s.replace('\u{000C}', "\n\n");

        if self.cfg.normalize_unicode {
            s = s.nfkc().collect::<String>();
        }

        s = sanitize_control_chars(&s, &self.cfg.control_chars_to_sanitize);

        let mut lines: Vec<String> = s
            .lines()
            .map(|l| {
                let l = if self.cfg.trim_trailing_whitespace {
                    l.trim_end()
                } else {
                    l
                };
                if self.cfg.collapse_inline_whitespace {
                    l.split_whitespace().collect::<Vec<_>>().join(" ")
                } else {
                    l.to_string()
                }
            })
            .collect();

        if self.cfg.remove_repeated_lines {
            lines = remove_repeated_lines(&self.cfg, lines);
        }

        if self.cfg.remove_by_regex && !self.patterns.is_empty() {
            lines.retain(|l| {
                let t = l.trim();
                t.is_empty() || !self.patterns.iter().any(|r| r.is_match(t))
            });
        }

        collapse_blank_lines(&lines)
    }
}

fn sanitize_control_chars(s: &str, codes: &[u8]) -> String {
    let mut mask = [false; 128];
    for &code in codes {
        if (code as usize) < mask.len() {
            mask[code as usize] = true;
        }
    }

    s.chars()
        .filter(|&ch| {
            if ch == '\n' || ch == '\t' {
                return true;
            }
            let cp = ch as u32;
            // C1 controls are always dropped.
            if cp < 128 {
                !mask[cp as usize]
            } else {
                !(0x80..=0x9F).contains(&cp)
            }
        })
        .collect()
}

// Running headers and footers repeat on every page; drop short lines that
// occur at least `repeated_line_min_occurrences` times.
fn remove_repeated_lines(cfg: &Normalize, lines: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for l in &lines {
        let t = l.trim();
        if t.is_empty() || t.len() > cfg.repeated_line_max_length as usize {
            continue;
        }
        *counts.entry(t).or_insert(0) += 1;
    }

    let min = cfg.repeated_line_min_occurrences.max(2);
    let drop: Vec<bool> = lines
        .iter()
        .map(|l| {
            let t = l.trim();
            !t.is_empty() && counts.get(t).copied().unwrap_or(0) >= min
        })
        .collect();

    lines
        .into_iter()
        .zip(drop)
        .filter_map(|(l, d)| if d { None } else { Some(l) })
        .collect()
}

fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out = String::new();
    let mut blank_run = false;
    for l in lines {
        if l.trim().is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(l);
        blank_run = false;
    }
    out
}
