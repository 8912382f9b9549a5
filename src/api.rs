// src/api.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::dialogue_map::DialogueMap;
use crate::error::ApiError;
use crate::policy::{
    plan_turn, resolve_plan, AssistantReply, ConversationContext, ConversationTurn, TurnPlan,
};
use crate::practitioner::{build_resolver, DynResolver};
use crate::scoring::calculate_doctor_scores;
use crate::symptoms::{detect_symptoms, DetectedSymptom};

const MESSAGES_REQUIRED: &str = "Messages array is required";
const TEXT_REQUIRED: &str = "Text is required";

#[derive(Clone)]
pub struct AppState {
    pub map: Arc<DialogueMap>,
    pub resolver: DynResolver,
}

impl AppState {
    pub fn new(map: DialogueMap, resolver: DynResolver) -> Self {
        Self {
            map: Arc::new(map),
            resolver,
        }
    }

    /// Dialogue map and resolver as described by `cfg`.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let map = cfg.load_dialogue_map()?;
        let resolver = build_resolver(&cfg.resolver)?;
        info!(
            doctors = map.doctors.len(),
            symptoms = map.symptoms.len(),
            resolver = resolver.name(),
            "triage state ready"
        );
        Ok(Self::new(map, resolver))
    }
}

/// Public router used by the binary and the integration tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/chat", post(chat))
        .route("/debug/analyze", post(debug_analyze))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Build the router straight from `AppConfig::load()`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    Ok(router(AppState::from_config(&cfg)?))
}

/// Extract `messages` from a raw request body. Anything that is not a JSON
/// object with an array of `{role, content}` turns is rejected.
fn parse_messages(body: &[u8]) -> Result<Vec<ConversationTurn>, ApiError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ApiError::BadRequest(MESSAGES_REQUIRED))?;
    match value.get("messages") {
        Some(messages @ Value::Array(_)) => serde_json::from_value(messages.clone())
            .map_err(|_| ApiError::BadRequest(MESSAGES_REQUIRED)),
        _ => Err(ApiError::BadRequest(MESSAGES_REQUIRED)),
    }
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<AssistantReply>, ApiError> {
    let turns = parse_messages(&body)?;

    // The RNG lives only for planning, never across an await.
    let plan = {
        let mut rng = StdRng::from_os_rng();
        plan_turn(&turns, &state.map, &mut rng)
    };
    log_turn(&turns, &plan);
    counter!("triage_replies_total", "branch" => plan.branch().as_str()).increment(1);

    let reply = resolve_plan(plan, state.resolver.as_ref()).await?;
    Ok(Json(reply))
}

fn log_turn(turns: &[ConversationTurn], plan: &TurnPlan<'_>) {
    let id = anon_hash(&ConversationContext::from_turns(turns).all_user_text);
    let keys: Vec<&str> = plan
        .detected
        .iter()
        .map(|d| d.symptom_key.as_str())
        .collect();
    // Never log raw text. Only hashed id + symptom keys.
    info!(
        %id,
        branch = plan.branch().as_str(),
        user_turns = plan.user_turns,
        symptoms = ?keys,
        "chat turn"
    );
}

/// Short stable id for a conversation: first 6 bytes of SHA-256, hex.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Serialize)]
struct ScoreOut {
    doctor_id: String,
    name: String,
    specialty: String,
    score: f64,
    matched_symptoms: Vec<String>,
}

#[derive(Serialize)]
struct AnalyzeOut {
    symptoms: Vec<DetectedSymptom>,
    scores: Vec<ScoreOut>,
}

/// Detection and ranking for a single text, without any practitioner lookup.
async fn debug_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalyzeOut>, ApiError> {
    let value: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest(TEXT_REQUIRED))?;
    let text = value
        .get("text")
        .and_then(Value::as_str)
        .ok_or(ApiError::BadRequest(TEXT_REQUIRED))?;

    let symptoms = detect_symptoms(text, &state.map);
    let scores = calculate_doctor_scores(&symptoms, &state.map.doctors)
        .into_iter()
        .map(|s| ScoreOut {
            doctor_id: s.doctor.id.clone(),
            name: s.doctor.name.clone(),
            specialty: s.doctor.specialty.clone(),
            score: s.score,
            matched_symptoms: s.matched_symptoms,
        })
        .collect();

    Ok(Json(AnalyzeOut { symptoms, scores }))
}
