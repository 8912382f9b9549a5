//! # Dialogue Map
//!
//! Static reference data the triage core reads from:
//! - the symptom dictionary (keywords, aliases, one follow-up question each),
//! - the reference doctor table (specialty + per-symptom weights),
//! - the pool of general follow-up questions.
//!
//! The JSON keeps both tables as arrays so iteration order is explicit:
//! "first non-negated match wins" and the stable score sort depend on it.
//!
//! ```json
//! {
//!   "doctors":  [{ "id": "cardio", "name": "...", "specialty": "Cardiologist",
//!                  "description": "...", "weights": { "chest_pain": 3.0 } }],
//!   "symptoms": [{ "key": "chest_pain", "keywords": ["chest pain"],
//!                  "aliases": ["tight chest"], "follow_up": "..." }],
//!   "follow_up_questions": { "general": ["How long has this been going on?"] }
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

static BUNDLED: Lazy<DialogueMap> = Lazy::new(|| {
    let raw = include_str!("../data/dialogue_map.json");
    DialogueMap::from_json_str(raw).expect("valid bundled dialogue map")
});

/// One symptom concept and the surface forms that identify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymptomEntry {
    pub key: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Question asked right after the symptom is first mentioned; may be empty.
    #[serde(default)]
    pub follow_up: String,
}

impl SymptomEntry {
    /// Keywords first, then aliases, in configuration order.
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.keywords
            .iter()
            .chain(self.aliases.iter())
            .map(String::as_str)
    }
}

/// Reference specialty record (not a real practitioner account).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfile {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub description: String,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

impl DoctorProfile {
    /// Weight for a symptom key, 0.0 when the doctor has no entry for it.
    pub fn weight_for(&self, symptom_key: &str) -> f64 {
        self.weights.get(symptom_key).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FollowUpQuestions {
    #[serde(default)]
    pub general: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogueMap {
    #[serde(default)]
    pub doctors: Vec<DoctorProfile>,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    pub follow_up_questions: FollowUpQuestions,
}

impl DialogueMap {
    /// The map compiled into the binary from `data/dialogue_map.json`.
    pub fn bundled() -> Self {
        BUNDLED.clone()
    }

    /// Parse and validate a map from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let map: DialogueMap =
            serde_json::from_str(raw).map_err(|e| anyhow!("dialogue map JSON error: {e}"))?;
        map.validate()?;
        Ok(map)
    }

    /// Load from a JSON file on disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading dialogue map from {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("loading {}", path.display()))
    }

    pub fn symptom(&self, key: &str) -> Option<&SymptomEntry> {
        self.symptoms.iter().find(|s| s.key == key)
    }

    pub fn general_questions(&self) -> &[String] {
        &self.follow_up_questions.general
    }

    fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for s in &self.symptoms {
            if s.key.trim().is_empty() {
                bail!("symptom with empty key");
            }
            if !keys.insert(s.key.as_str()) {
                bail!("duplicate symptom key `{}`", s.key);
            }
            if s.terms().any(|t| t.trim().is_empty()) {
                bail!("symptom `{}` has an empty keyword or alias", s.key);
            }
            if !s.follow_up.is_empty() && s.follow_up.trim().is_empty() {
                bail!("symptom `{}` has a blank follow-up question", s.key);
            }
        }

        let mut ids = HashSet::new();
        for d in &self.doctors {
            if !ids.insert(d.id.as_str()) {
                bail!("duplicate doctor id `{}`", d.id);
            }
            for (key, w) in &d.weights {
                if !w.is_finite() || *w < 0.0 {
                    bail!("doctor `{}` has invalid weight {w} for `{key}`", d.id);
                }
                if !keys.contains(key.as_str()) {
                    bail!("doctor `{}` weights unknown symptom `{key}`", d.id);
                }
            }
        }
        Ok(())
    }
}

/// Render a symptom key for users: `chest_pain` -> `chest pain`.
pub fn humanize_key(key: &str) -> String {
    key.replace('_', " ")
}
