use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use hb_predictor::{
    blob::{ImageBlob, ImageMime},
    config::GeminiConfig,
    prediction::{GeminiPredictor, HbPredictor, PredictionError, VALIDATION_PROMPT},
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
struct Recorded {
    call: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    reply: Value,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

struct FakeGemini {
    base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeGemini {
    fn predictor(&self) -> GeminiPredictor {
        GeminiPredictor::new(&config(&self.base)).unwrap()
    }

    fn last_request(&self) -> Recorded {
        self.requests.lock().last().cloned().expect("no request recorded")
    }
}

fn config(api_base: &str) -> GeminiConfig {
    GeminiConfig {
        api_base: api_base.to_string(),
        model: "gemini-2.5-flash".into(),
        api_key: API_KEY.into(),
        request_timeout_secs: 5,
    }
}

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

async fn generate(
    State(state): State<FakeState>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().push(Recorded {
        call,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });
    (state.status, Json(state.reply.clone()))
}

async fn spawn_fake(status: StatusCode, reply: Value) -> FakeGemini {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = FakeState {
        status,
        reply,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/v1beta/models/:call", post(generate))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeGemini {
        base: format!("http://{}/v1beta", addr),
        requests,
    }
}

fn image() -> ImageBlob {
    ImageBlob::new(PNG.to_vec(), ImageMime::Png).unwrap()
}

#[tokio::test]
async fn test_validate_sends_image_and_prompt() {
    let fake = spawn_fake(StatusCode::OK, text_reply("Yes")).await;

    assert!(fake.predictor().validate(&image()).await.unwrap());

    let request = fake.last_request();
    assert_eq!(request.call, "gemini-2.5-flash:generateContent");
    assert_eq!(request.api_key.as_deref(), Some(API_KEY));

    let parts = &request.body["contents"][0]["parts"];
    assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
    assert_eq!(parts[0]["inline_data"]["data"], image().to_base64());
    assert_eq!(parts[1]["text"], VALIDATION_PROMPT);
    assert!(request.body.get("generationConfig").is_none());
}

#[tokio::test]
async fn test_validate_rejects_negative_answer() {
    let fake = spawn_fake(StatusCode::OK, text_reply("No, this is a cat.")).await;
    assert!(!fake.predictor().validate(&image()).await.unwrap());
}

#[tokio::test]
async fn test_validate_fails_closed_on_server_error() {
    let fake = spawn_fake(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "code": 500, "message": "internal" } }),
    )
    .await;
    assert!(!fake.predictor().validate(&image()).await.unwrap());
}

#[tokio::test]
async fn test_validate_fails_closed_when_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let predictor = GeminiPredictor::new(&config(&format!("http://{}/v1beta", addr))).unwrap();
    assert!(!predictor.validate(&image()).await.unwrap());
}

#[tokio::test]
async fn test_validate_fails_closed_without_candidates() {
    let fake = spawn_fake(
        StatusCode::OK,
        json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
    )
    .await;
    assert!(!fake.predictor().validate(&image()).await.unwrap());
}

#[tokio::test]
async fn test_predict_parses_structured_reply() {
    let fake = spawn_fake(
        StatusCode::OK,
        text_reply(r#"{"hbValue": 13.2, "confidence": 0.8, "analysis": "The nailbed has a healthy pink hue."}"#),
    )
    .await;

    let result = fake.predictor().predict(&image()).await.unwrap();
    assert_eq!(result.hb_value, 13.2);
    assert_eq!(result.confidence, 0.8);
    assert_eq!(result.analysis, "The nailbed has a healthy pink hue.");

    let request = fake.last_request();
    let config = &request.body["generationConfig"];
    assert_eq!(config["responseMimeType"], "application/json");
    assert_eq!(config["responseSchema"]["type"], "OBJECT");
    assert_eq!(
        config["responseSchema"]["properties"]["hbValue"]["type"],
        "NUMBER"
    );
}

#[tokio::test]
async fn test_predict_missing_confidence_is_malformed() {
    let fake = spawn_fake(
        StatusCode::OK,
        text_reply(r#"{"hbValue": 13.2, "analysis": "Pale."}"#),
    )
    .await;

    let err = fake.predictor().predict(&image()).await.unwrap_err();
    assert!(matches!(err, PredictionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_predict_free_text_is_malformed() {
    let fake = spawn_fake(StatusCode::OK, text_reply("Hb looks to be around 13 g/dL.")).await;

    let err = fake.predictor().predict(&image()).await.unwrap_err();
    assert!(matches!(err, PredictionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_predict_surfaces_api_errors() {
    let fake = spawn_fake(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "code": 503, "message": "overloaded" } }),
    )
    .await;

    let err = fake.predictor().predict(&image()).await.unwrap_err();
    assert!(matches!(err, PredictionError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_predict_without_text_is_empty() {
    let fake = spawn_fake(StatusCode::OK, json!({ "candidates": [] })).await;

    let err = fake.predictor().predict(&image()).await.unwrap_err();
    assert!(matches!(err, PredictionError::EmptyResponse));
}
