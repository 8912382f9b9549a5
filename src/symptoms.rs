//! Symptom detection: keyword/alias scan over free text with negation filtering.

use serde::Serialize;

use crate::dialogue_map::DialogueMap;
use crate::negation::is_negated;

/// Confidence for a term longer than [`SPECIFIC_TERM_CHARS`] characters.
pub const CONFIDENCE_SPECIFIC: f64 = 1.0;
/// Confidence for short, more ambiguous terms.
pub const CONFIDENCE_SHORT: f64 = 0.8;
pub const SPECIFIC_TERM_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedSymptom {
    pub symptom_key: String,
    pub confidence: f64,
    /// The keyword or alias that produced the hit.
    pub matched_term: String,
}

/// Scan `text` against the dictionary, in dictionary order.
///
/// For each symptom the first non-negated keyword/alias wins; negated terms are
/// skipped so a later synonym can still match. A key appears at most once.
pub fn detect_symptoms(text: &str, map: &DialogueMap) -> Vec<DetectedSymptom> {
    let lower_text = text.to_lowercase();
    let mut detected = Vec::new();

    for entry in &map.symptoms {
        for term in entry.terms() {
            let lower_term = term.to_lowercase();
            if lower_term.is_empty() || !lower_text.contains(&lower_term) {
                continue;
            }
            if is_negated(text, term) {
                continue;
            }
            detected.push(DetectedSymptom {
                symptom_key: entry.key.clone(),
                confidence: confidence_for(term),
                matched_term: term.to_string(),
            });
            break;
        }
    }

    detected
}

/// Coarse specificity proxy: longer terms are less ambiguous.
pub fn confidence_for(term: &str) -> f64 {
    if term.chars().count() > SPECIFIC_TERM_CHARS {
        CONFIDENCE_SPECIFIC
    } else {
        CONFIDENCE_SHORT
    }
}
