
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use app_support::{client, serve, spawn_app};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use essay_grader::{
    GeneratorEnv, OpenAiGenerator, TextGenerator,
    grade::GenerateError,
};
use serde_json::{Value, json};

const REPORT: &str = r#"{"total":2,"outOf":2,"breakdown":[{"point":"Mentions equal magnitude","score":1,"max":1},{"point":"Mentions opposite direction","score":1,"max":1}],"feedback":"Complete answer."}"#;

/// What the fake chat-completions endpoint answers and what it received.
#[derive(Clone)]
struct Upstream {
    status:   StatusCode,
    body:     Value,
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl Upstream {
    fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn replying_with(content: &str) -> Self {
        Self::new(
            StatusCode::OK,
            json!({
                "id": "chatcmpl-test",
                "object": "chat.completion",
                "created": 1_700_000_000,
                "model": "gemini-1.5-flash",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
            }),
        )
    }

    /// Starts the fake and returns an API base to point the generator at.
    async fn start(&self) -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(self.clone());
        format!("{}/v1", serve(app).await)
    }

    /// A 429 of the kind clients normally back off and retry on.
    fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "error": {
                    "message": "Resource has been exhausted",
                    "type": "rate_limit_exceeded",
                    "param": null,
                    "code": null
                }
            }),
        )
    }

    fn requests(&self) -> Vec<(HeaderMap, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.requests.lock().unwrap().push((headers, request));
    (upstream.status, Json(upstream.body.clone()))
}

fn generator(api_base: String) -> OpenAiGenerator {
    let env = GeneratorEnv::builder()
        .api_base(api_base)
        .api_key("test-key")
        .model("gemini-1.5-flash")
        .build();
    OpenAiGenerator::new(&env, client())
}

#[tokio::test]
async fn sends_one_user_message_with_the_prompt() {
    let upstream = Upstream::replying_with("hello");
    let generator = generator(upstream.start().await);

    let text = generator.generate("Grade this").await.expect("generate");

    assert_eq!(text, "hello");
    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];
    assert_eq!(headers["authorization"], "Bearer test-key");
    assert_eq!(body["model"], "gemini-1.5-flash");
    assert_eq!(body["n"], 1);
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "Grade this" }]));
}

#[tokio::test]
async fn rejected_request_is_an_error() {
    let upstream = Upstream::new(
        StatusCode::UNAUTHORIZED,
        json!({
            "error": {
                "message": "API key not valid",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        }),
    );
    let generator = generator(upstream.start().await);

    let err = generator.generate("Grade this").await.unwrap_err();

    assert!(matches!(err, GenerateError::Request(_)));
}

#[tokio::test]
async fn rate_limit_fails_after_a_single_attempt() {
    let upstream = Upstream::rate_limited();
    let generator = generator(upstream.start().await);

    let result = tokio::time::timeout(Duration::from_secs(5), generator.generate("Grade this"))
        .await
        .expect("a 429 must not be retried");

    assert!(matches!(result, Err(GenerateError::Request(_))));
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn reply_without_choices_is_empty() {
    let mut upstream = Upstream::replying_with("unused");
    upstream.body["choices"] = json!([]);
    let generator = generator(upstream.start().await);

    let err = generator.generate("Grade this").await.unwrap_err();

    assert!(matches!(err, GenerateError::EmptyResponse));
}

#[tokio::test]
async fn grades_end_to_end_through_the_api() {
    let upstream = Upstream::replying_with(&format!("```json\n{REPORT}\n```"));
    let base = spawn_app(generator(upstream.start().await)).await;

    let resp = client()
        .post(format!("{base}/grade-essay"))
        .json(&json!({
            "question": "State Newton's third law",
            "rubric": ["Mentions equal magnitude", "Mentions opposite direction"],
            "answer": "Forces are equal in size and opposite in direction",
        }))
        .send()
        .await
        .expect("send");

    assert_eq!(resp.status(), StatusCode::OK.as_u16());
    assert_eq!(resp.text().await.unwrap(), REPORT);

    let requests = upstream.requests();
    let prompt = requests[0].1["messages"][0]["content"].as_str().unwrap().to_owned();
    assert!(prompt.contains("Question: State Newton's third law"));
    assert!(prompt.contains("- Mentions equal magnitude\n- Mentions opposite direction"));
}

#[tokio::test]
async fn upstream_rejection_becomes_a_500() {
    let upstream = Upstream::new(
        StatusCode::FORBIDDEN,
        json!({ "error": { "message": "quota exhausted", "type": null, "param": null, "code": null } }),
    );
    let base = spawn_app(generator(upstream.start().await)).await;

    let resp = client()
        .post(format!("{base}/grade-essay"))
        .json(&json!({ "question": "q", "rubric": ["p"], "answer": "a" }))
        .send()
        .await
        .expect("send");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Something went wrong while grading" }));
}

#[tokio::test]
async fn rate_limited_grading_is_an_immediate_500() {
    let upstream = Upstream::rate_limited();
    let base = spawn_app(generator(upstream.start().await)).await;

    let send = client()
        .post(format!("{base}/grade-essay"))
        .json(&json!({ "question": "q", "rubric": ["p"], "answer": "a" }))
        .send();
    let resp = tokio::time::timeout(Duration::from_secs(5), send)
        .await
        .expect("grading must not wait on retries")
        .expect("send");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Something went wrong while grading" }));
    assert_eq!(upstream.requests().len(), 1);
}
