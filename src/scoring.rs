//! Doctor scoring: weighted sum of detected symptoms per reference doctor.
//!
//! score(doctor) = Σ weight(doctor, symptom) × confidence(symptom)
//!
//! Only non-zero weights count as a match. Results are ordered by score
//! descending; the sort is stable so ties keep configuration order.

use serde::Serialize;

use crate::dialogue_map::DoctorProfile;
use crate::symptoms::DetectedSymptom;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorScore<'a> {
    pub doctor: &'a DoctorProfile,
    pub score: f64,
    pub matched_symptoms: Vec<String>,
}

pub fn calculate_doctor_scores<'a>(
    symptoms: &[DetectedSymptom],
    doctors: &'a [DoctorProfile],
) -> Vec<DoctorScore<'a>> {
    let mut scores = Vec::new();

    for doctor in doctors {
        let mut score = 0.0f64;
        let mut matched_symptoms = Vec::new();

        for s in symptoms {
            let weight = doctor.weight_for(&s.symptom_key);
            if weight != 0.0 {
                score += weight * s.confidence;
                matched_symptoms.push(s.symptom_key.clone());
            }
        }

        // Kept when any symptom matched, even at a zero score.
        if score > 0.0 || !matched_symptoms.is_empty() {
            scores.push(DoctorScore {
                doctor,
                score,
                matched_symptoms,
            });
        }
    }

    // `sort_by` is stable.
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}
