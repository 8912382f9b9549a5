// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /chat (greeting, follow-up, recommendation payload, 400s, 500)
// - POST /debug/analyze
// - api::app() wiring from a config file

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use symptom_triage::dialogue_map::DialogueMap;
use symptom_triage::error::{ResolverError, GENERIC_FAILURE_MESSAGE};
use symptom_triage::practitioner::{
    DisabledResolver, DynResolver, Practitioner, PractitionerResolver, StaticResolver,
};
use symptom_triage::{api, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn router_with(resolver: DynResolver) -> Router {
    api::router(AppState::new(DialogueMap::bundled(), resolver))
}

fn test_router() -> Router {
    router_with(Arc::new(DisabledResolver))
}

struct FailingResolver;

#[async_trait]
impl PractitionerResolver for FailingResolver {
    async fn search(&self, _specialty: &str) -> Result<Vec<Practitioner>, ResolverError> {
        Err(ResolverError::Status(503))
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

async fn post(app: Router, uri: &str, body: String) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("build POST");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let v: Json = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "OK", "health body should be 'OK'");
}

#[tokio::test]
async fn chat_with_empty_history_greets_without_practitioner() {
    let (status, v) = post(test_router(), "/chat", json!({ "messages": [] }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["message"].as_str().unwrap().starts_with("Hello! I'm your health assistant."));
    assert!(v.get("practitioner").is_none(), "no practitioner key on plain replies");
}

#[tokio::test]
async fn chat_asks_follow_up_for_new_symptom() {
    let payload = json!({ "messages": [
        { "role": "assistant", "content": "What brings you here today?" },
        { "role": "user", "content": "I've had a headache since Monday" }
    ]});
    let (status, v) = post(test_router(), "/chat", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        v["message"],
        "I understand you're experiencing headache. Where is the headache located, and how long does it usually last?"
    );
}

#[tokio::test]
async fn chat_recommendation_carries_practitioner_payload() {
    let resolver: DynResolver = Arc::new(StaticResolver::new(vec![Practitioner {
        id: "pr-1002".into(),
        name: "Dr. Samuel Ortiz".into(),
        specialty: "Cardiologist".into(),
    }]));
    let payload = json!({ "messages": [
        { "role": "user", "content": "I have chest pain" },
        { "role": "assistant", "content": "Does the pain spread?" },
        { "role": "user", "content": "It gets worse when I climb stairs" }
    ]});
    let (status, v) = post(router_with(resolver), "/chat", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        v["practitioner"],
        json!({
            "id": "pr-1002",
            "name": "Dr. Samuel Ortiz",
            "specialty": "Cardiologist",
            "hospital": "Available"
        })
    );
}

#[tokio::test]
async fn chat_rejects_missing_or_malformed_messages() {
    for body in [
        json!({}).to_string(),
        json!({ "messages": "I have a cough" }).to_string(),
        json!({ "messages": [{ "role": "user" }] }).to_string(),
        "definitely not json".to_string(),
    ] {
        let (status, v) = post(test_router(), "/chat", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v, json!({ "error": "Messages array is required" }));
    }
}

#[tokio::test]
async fn chat_resolver_failure_is_a_generic_500() {
    let payload = json!({ "messages": [
        { "role": "user", "content": "I have chest pain" },
        { "role": "user", "content": "It gets worse when I climb stairs" }
    ]});
    let (status, v) = post(router_with(Arc::new(FailingResolver)), "/chat", payload.to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v, json!({ "error": GENERIC_FAILURE_MESSAGE }));
}

#[tokio::test]
async fn chat_replies_before_recommendation_do_not_hit_resolver() {
    let payload = json!({ "messages": [
        { "role": "user", "content": "I have chest pain" }
    ]});
    let (status, _) = post(router_with(Arc::new(FailingResolver)), "/chat", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn debug_analyze_lists_symptoms_and_ranked_doctors() {
    let payload = json!({ "text": "Bad headache but no nausea" });
    let (status, v) = post(test_router(), "/debug/analyze", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    let symptoms = v["symptoms"].as_array().unwrap();
    assert_eq!(symptoms.len(), 1);
    assert_eq!(symptoms[0]["symptom_key"], "headache");

    let scores = v["scores"].as_array().unwrap();
    assert_eq!(scores[0]["specialty"], "Neurologist");
    assert_eq!(scores[0]["matched_symptoms"], json!(["headache"]));
    assert_eq!(scores[1]["specialty"], "General Practitioner");
}

#[serial_test::serial]
#[tokio::test]
async fn app_builds_router_from_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let practitioners = dir.path().join("practitioners.json");
    std::fs::write(
        &practitioners,
        r#"[{ "id": "pr-7", "name": "Dr. File Heart", "specialty": "Cardiologist" }]"#,
    )
    .expect("write practitioners");
    let config = dir.path().join("triage.toml");
    std::fs::write(
        &config,
        format!(
            "[resolver]\nkind = \"static\"\nstatic_path = {:?}\n",
            practitioners.display().to_string()
        ),
    )
    .expect("write config");
    std::env::set_var("TRIAGE_CONFIG_PATH", &config);

    let app = api::app().await.expect("app() should build Router");
    std::env::remove_var("TRIAGE_CONFIG_PATH");

    let payload = json!({ "messages": [
        { "role": "user", "content": "I have chest pain" },
        { "role": "user", "content": "It gets worse when I climb stairs" }
    ]});
    let (status, v) = post(app, "/chat", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["practitioner"]["id"], "pr-7");
}

#[tokio::test]
async fn debug_analyze_requires_text() {
    let (status, v) = post(test_router(), "/debug/analyze", json!({}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v, json!({ "error": "Text is required" }));
}
