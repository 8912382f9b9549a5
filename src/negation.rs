//! Negation check for a single keyword mention.
//!
//! Negation is local to the mention: the windows around the first occurrence
//! of the keyword stop at sentence ends and contrastive words, so "no fever
//! but a cough" negates fever and leaves cough alone. Commas do not end the
//! window before the keyword ("no fever, cough or headache" negates all
//! three) but do end the one after it. Three probes run in order:
//! 1. negation cues in the (up to) 50 characters before the keyword,
//! 2. a direct "no <keyword>" anywhere in the text,
//! 3. a standalone "not"/"no" in the 20 characters after the keyword.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters inspected on each side of the keyword.
pub const CONTEXT_CHARS: usize = 50;
/// Characters after the keyword probed for a trailing "not"/"no".
pub const AFTER_TOKEN_CHARS: usize = 20;

static NEGATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bno\s+",
        r"(?i)\bnot\s+",
        r"(?i)\bwithout\s+",
        r"(?i)\bdon['’]?t\s+have",
        r"(?i)\bdoesn['’]?t\s+have",
        r"(?i)\bhaven['’]?t\s+had",
        r"(?i)\bhasn['’]?t\s+had",
        r"(?i)\bdon['’]?t\s+feel",
        r"(?i)\bdoesn['’]?t\s+feel",
        r"(?i)\bno\s+signs?\s+of",
        r"(?i)\bno\s+indication\s+of",
        r"(?i)\bexclud",
        r"(?i)\babsent",
        r"(?i)\bden(?:y|ies)\s+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("negation regex"))
    .collect()
});

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[.;!?\n]|\b(?:but|however|although|though|except)\b")
        .expect("sentence boundary regex")
});

static CLAUSE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[.,;!?\n]|\b(?:but|however|although|though|except)\b")
        .expect("clause boundary regex")
});

static TRAILING_NEGATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:not|no)\b").expect("trailing negator regex"));

/// True when the first case-insensitive occurrence of `keyword` in `text` is negated.
/// Returns false when the keyword does not occur at all.
pub fn is_negated(text: &str, keyword: &str) -> bool {
    let lower_text = text.to_lowercase();
    let lower_keyword = keyword.to_lowercase();
    if lower_keyword.is_empty() {
        return false;
    }
    let Some(kw_start) = lower_text.find(&lower_keyword) else {
        return false;
    };
    let kw_end = kw_start + lower_keyword.len();

    let win_start = back_chars(&lower_text, kw_start, CONTEXT_CHARS);
    let win_end = forward_chars(&lower_text, kw_end, CONTEXT_CHARS);

    // 1) cues before the mention, within its sentence
    let before = sentence_tail(&lower_text[win_start..kw_start]);
    if NEGATION_PATTERNS.iter().any(|re| re.is_match(before)) {
        return true;
    }

    // 2) "no <keyword>" anywhere
    if direct_negation(&lower_text, &lower_keyword) {
        return true;
    }

    // 3) "<keyword> not ..." / "<keyword> no ..."
    let after = clause_head(&lower_text[kw_end..win_end]);
    TRAILING_NEGATOR.is_match(take_chars(after, AFTER_TOKEN_CHARS))
}

fn direct_negation(lower_text: &str, lower_keyword: &str) -> bool {
    let pattern = format!(r"(?i)\bno\s+{}\b", regex::escape(lower_keyword));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(lower_text),
        Err(_) => false,
    }
}

/// Portion of `before` after its last sentence boundary.
fn sentence_tail(before: &str) -> &str {
    match SENTENCE_BOUNDARY.find_iter(before).last() {
        Some(m) => &before[m.end()..],
        None => before,
    }
}

/// Portion of `after` before its first clause boundary.
fn clause_head(after: &str) -> &str {
    match CLAUSE_BOUNDARY.find(after) {
        Some(m) => &after[..m.start()],
        None => after,
    }
}

/// Byte index `n` characters before `from` (or 0).
fn back_chars(s: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    s[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte index `n` characters after `from` (or the end of `s`).
fn forward_chars(s: &str, from: usize, n: usize) -> usize {
    s[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(s.len())
}

fn take_chars(s: &str, n: usize) -> &str {
    &s[..forward_chars(s, 0, n)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_precedors_negate() {
        assert!(is_negated("I have no fever today", "fever"));
        assert!(is_negated("I am not nauseous at all", "nauseous"));
        assert!(is_negated("Came in without chest pain", "chest pain"));
        assert!(!is_negated("I have a fever today", "fever"));
    }

    #[test]
    fn phrase_cues_negate() {
        assert!(is_negated("I don't have a headache", "headache"));
        assert!(is_negated("She doesnt feel dizzy", "dizzy"));
        assert!(is_negated("I haven't had any cough this week", "cough"));
        assert!(is_negated("Patient denies chest pain", "chest pain"));
        assert!(is_negated("I deny any rash", "rash"));
        assert!(is_negated("Fever was excluded, cough remains", "cough"));
        assert!(!is_negated("Fever was excluded. Cough remains", "cough"));
        assert!(is_negated("Excluding fever, I'm fine", "fever"));
        assert!(is_negated("There are no signs of infection", "infection"));
    }

    #[test]
    fn case_insensitive() {
        assert!(is_negated("NO FEVER here", "fever"));
        assert!(is_negated("no fever here", "FEVER"));
    }

    #[test]
    fn missing_keyword_is_not_negated() {
        assert!(!is_negated("I have a cough", "fever"));
        assert!(!is_negated("anything", ""));
    }

    #[test]
    fn negation_stays_in_its_clause() {
        let text = "I have no fever but I have a cough";
        assert!(is_negated(text, "fever"));
        assert!(!is_negated(text, "cough"));

        let text = "I have a bad headache but no nausea";
        assert!(!is_negated(text, "headache"));
        assert!(is_negated(text, "nausea"));
    }

    #[test]
    fn negation_spans_a_comma_separated_list() {
        let text = "I have no fever, cough or headache";
        assert!(is_negated(text, "fever"));
        assert!(is_negated(text, "cough"));
        assert!(is_negated(text, "headache"));
        // The trailing probe still stops at the comma.
        assert!(!is_negated("fever, no cough", "fever"));
    }

    #[test]
    fn cue_outside_window_is_ignored() {
        let text = format!("no {} fever", "x".repeat(60));
        assert!(!is_negated(&text, "fever"));
    }

    #[test]
    fn trailing_not_negates() {
        assert!(is_negated("fever not present", "fever"));
        assert!(!is_negated("Rash? No.", "rash"));
        assert!(is_negated("rash no longer there", "rash"));
    }

    #[test]
    fn trailing_probe_is_limited_to_twenty_chars() {
        assert!(!is_negated("fever and some more words then not", "fever"));
    }

    #[test]
    fn direct_negation_checks_later_mentions() {
        let text = "I had fever yesterday, but no fever today";
        assert!(is_negated(text, "fever"));
    }

    #[test]
    fn keyword_metacharacters_are_escaped() {
        assert!(is_negated("earlier a.b, now no a.b", "a.b"));
        assert!(!is_negated("earlier a.b, now no axb", "a.b"));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "Ünwell 😷😷😷 — I have a fever and feel très fatigué";
        assert!(!is_negated(text, "fever"));
        assert!(!is_negated(text, "fatigué"));
        assert!(is_negated("pas de fièvre, no fièvre", "fièvre"));
    }
}
