//! Indel-based string similarity on a 0-100 scale.
//!
//! `ratio` is `200 * lcs / (len_a + len_b)` over chars. `partial_ratio`
//! slides the shorter string over the longer one (including the partial
//! overlaps at both ends) and keeps the best `ratio`. LCS lengths are
//! computed with the bit-parallel recurrence, 64 pattern chars per word.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const MAX_SCORE: f64 = 100.0;

/// Lowercases, collapses every run of non-alphanumeric chars to one space
/// and trims.
pub fn default_process(text: &str) -> String {
    static SEPARATORS: OnceLock<Option<Regex>> = OnceLock::new();
    let lowered = text.to_lowercase();
    match SEPARATORS.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").ok()) {
        Some(separators) => separators.replace_all(&lowered, " ").trim().to_string(),
        None => lowered.trim().to_string(),
    }
}

struct PatternMask {
    len: usize,
    words: usize,
    masks: HashMap<char, Vec<u64>>,
}

impl PatternMask {
    fn new(pattern: &[char]) -> Self {
        let words = pattern.len().div_ceil(64).max(1);
        let mut masks: HashMap<char, Vec<u64>> = HashMap::new();
        for (index, ch) in pattern.iter().enumerate() {
            let mask = masks.entry(*ch).or_insert_with(|| vec![0; words]);
            mask[index / 64] |= 1u64 << (index % 64);
        }
        Self {
            len: pattern.len(),
            words,
            masks,
        }
    }

    fn lcs_len(&self, text: &[char]) -> usize {
        let mut state = vec![u64::MAX; self.words];
        for ch in text {
            let Some(mask) = self.masks.get(ch) else {
                continue;
            };

            let mut carry = false;
            for (word, matches) in state.iter_mut().zip(mask) {
                let matched = *word & matches;
                let (sum, overflow_a) = word.overflowing_add(matched);
                let (sum, overflow_b) = sum.overflowing_add(u64::from(carry));
                carry = overflow_a || overflow_b;
                *word = sum | (*word & !matched);
            }
        }

        let mut lcs = 0usize;
        for (index, word) in state.iter().enumerate() {
            let bits = (self.len - index * 64).min(64);
            let valid = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            lcs += (!word & valid).count_ones() as usize;
        }
        lcs
    }

    fn ratio_against(&self, text: &[char]) -> f64 {
        let total = self.len + text.len();
        if total == 0 {
            return MAX_SCORE;
        }
        MAX_SCORE * (2 * self.lcs_len(text)) as f64 / total as f64
    }
}

pub fn ratio(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    PatternMask::new(&left).ratio_against(&right)
}

/// Best alignment of the shorter string inside the longer one. Scores 0
/// when either side is empty.
pub fn partial_ratio(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let (short, long) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };

    if short.is_empty() {
        return 0.0;
    }

    let pattern = PatternMask::new(&short);
    let width = short.len();
    let mut best = 0.0f64;

    let windows = (1..width)
        .map(|end| &long[..end])
        .chain((0..=long.len() - width).map(|start| &long[start..start + width]))
        .chain((long.len() - width + 1..long.len()).map(|start| &long[start..]));

    for window in windows {
        let score = pattern.ratio_against(window);
        if score > best {
            best = score;
            if best >= MAX_SCORE {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 0.01
    }

    #[test]
    fn ratio_matches_indel_similarity() {
        assert!(close(ratio("this is a test", "this is a test!"), 96.55));
        assert!(close(ratio("abc", "abc"), 100.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
        assert!(close(ratio("", ""), 100.0));
    }

    #[test]
    fn partial_ratio_finds_embedded_substring() {
        assert!(close(partial_ratio("this is a test", "this is a test!"), 100.0));
        assert!(close(partial_ratio("aktion", "wie lege ich eine aktion an"), 100.0));
        assert!(close(partial_ratio("wie lege ich eine aktion an", "aktion"), 100.0));
    }

    #[test]
    fn partial_ratio_tolerates_typos() {
        let score = partial_ratio("aktoin anlegen", "so wird eine aktion anlegen im wws");
        assert!(score > 80.0 && score < 100.0, "score was {score}");
    }

    #[test]
    fn partial_ratio_uses_edge_overlaps() {
        // Only "cd" overlaps, at the very end of the text.
        let score = partial_ratio("cdxy", "aaaaaaaabcd");
        assert!(close(score, 100.0 * 4.0 / 6.0), "score was {score}");
    }

    #[test]
    fn disjoint_or_empty_inputs_score_zero() {
        assert_eq!(partial_ratio("abc", "xyz uvw"), 0.0);
        assert_eq!(partial_ratio("", "anything"), 0.0);
        assert_eq!(partial_ratio("anything", ""), 0.0);
    }

    #[test]
    fn lcs_spans_multiple_words() {
        let pattern: String = "ab".repeat(80);
        let text = format!("zz{pattern}zz");
        assert!(close(partial_ratio(&pattern, &text), 100.0));
        let pattern_chars: Vec<char> = pattern.chars().collect();
        let text_chars: Vec<char> = text.chars().collect();
        assert_eq!(PatternMask::new(&pattern_chars).lcs_len(&text_chars), 160);
    }

    #[test]
    fn processing_lowercases_and_collapses_punctuation() {
        assert_eq!(default_process("  Wie lege ich -- eine Aktion an?  "), "wie lege ich eine aktion an");
        assert_eq!(default_process("Größe: 5 mm"), "größe 5 mm");
        assert_eq!(default_process("???"), "");
    }
}
