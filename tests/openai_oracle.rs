use report_digest::oracle::{
    Oracle, OpenAiOracle, OracleError, OracleRequest, openai::classify_status,
};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn request(model: &str) -> OracleRequest {
    OracleRequest {
        model: model.into(),
        system: "You are a financial analyst.".into(),
        prompt: "Summarize: revenue grew.".into(),
        temperature: 0.3,
        max_tokens: 1000,
    }
}

async fn oracle_for(server: &MockServer) -> OpenAiOracle {
    OpenAiOracle::new("test-key", Duration::from_secs(5))
        .unwrap()
        .with_base_url(format!("{}/", server.uri()))
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn returns_trimmed_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 1000,
            "messages": [
                { "role": "system", "content": "You are a financial analyst." },
                { "role": "user", "content": "Summarize: revenue grew." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("\n Revenue up 12%. \n")))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = oracle_for(&server).await;
    let text = oracle.analyze(&request("gpt-4o-mini")).await.unwrap();
    assert_eq!(text, "Revenue up 12%.");
}

#[tokio::test]
async fn reasoning_models_send_max_completion_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "max_completion_tokens": 1000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = oracle_for(&server).await;
    assert_eq!(oracle.analyze(&request("o3-mini")).await.unwrap(), "ok");
}

async fn error_for(status: u16, body: serde_json::Value) -> OracleError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    oracle_for(&server)
        .await
        .analyze(&request("gpt-4o-mini"))
        .await
        .unwrap_err()
}

#[tokio::test]
async fn maps_http_failures_onto_kinds() {
    let quota = error_for(
        429,
        json!({ "error": { "type": "insufficient_quota", "code": "insufficient_quota" } }),
    )
    .await;
    assert!(matches!(quota, OracleError::QuotaExceeded(_)));

    let throttled = error_for(429, json!({ "error": { "code": "rate_limit_exceeded" } })).await;
    assert!(matches!(throttled, OracleError::Transient(_)));

    let unavailable = error_for(503, json!({ "error": "overloaded" })).await;
    assert!(matches!(unavailable, OracleError::Transient(_)));

    let unauthorized = error_for(401, json!({ "error": { "code": "invalid_api_key" } })).await;
    assert!(matches!(unauthorized, OracleError::Rejected(_)));
}

#[tokio::test]
async fn missing_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = oracle_for(&server)
        .await
        .analyze(&request("gpt-4o-mini"))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::InvalidResponse(_)));
}

#[tokio::test]
async fn malformed_body_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = oracle_for(&server)
        .await
        .analyze(&request("gpt-4o-mini"))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::InvalidResponse(_)));
}

#[test]
fn status_classification() {
    assert!(matches!(
        classify_status(StatusCode::REQUEST_TIMEOUT, ""),
        OracleError::Transient(_)
    ));
    assert!(matches!(
        classify_status(StatusCode::BAD_REQUEST, "model not found"),
        OracleError::Rejected(_)
    ));
    assert!(matches!(
        classify_status(StatusCode::TOO_MANY_REQUESTS, "insufficient_quota"),
        OracleError::QuotaExceeded(_)
    ));
}

#[test]
fn base_url_drops_trailing_slash() {
    let oracle = OpenAiOracle::new("k", Duration::from_secs(1))
        .unwrap()
        .with_base_url("http://localhost:8080/v1/");
    assert_eq!(oracle.base_url(), "http://localhost:8080/v1");
}
