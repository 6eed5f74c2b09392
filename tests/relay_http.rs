//! HTTP surface tests: every route driven in-process, with a recording client
//! standing in for Slack and Jenkins.

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use bmi_relay::config::{FileConfig, RelayConfig};
use bmi_relay::error::{Upstream, UpstreamError, UpstreamResult};
use bmi_relay::form::ModalView;
use bmi_relay::jenkins::JobParameters;
use bmi_relay::relay::RelayClient;
use bmi_relay::{AppState, build_router, signature};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tower::ServiceExt;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SIGNING_SECRET: &str = "test-signing-secret";

#[derive(Debug, PartialEq)]
enum OutboundCall {
    OpenForm { trigger_id: String, view: ModalView },
    TriggerJob(JobParameters),
    PostMessage { user_id: String, text: String },
}

struct RecordingClient {
    calls: UnboundedSender<OutboundCall>,
    fail: bool,
}

#[async_trait]
impl RelayClient for RecordingClient {
    async fn open_form(&self, trigger_id: &str, view: &ModalView) -> UpstreamResult<()> {
        let _ = self.calls.send(OutboundCall::OpenForm {
            trigger_id: trigger_id.to_string(),
            view: view.clone(),
        });
        self.outcome()
    }

    async fn trigger_job(&self, params: &JobParameters) -> UpstreamResult<()> {
        let _ = self.calls.send(OutboundCall::TriggerJob(params.clone()));
        if self.fail {
            return Err(UpstreamError::JobTriggerFailed {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn post_message(&self, user_id: &str, text: &str) -> UpstreamResult<()> {
        let _ = self.calls.send(OutboundCall::PostMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        self.outcome()
    }
}

impl RecordingClient {
    fn outcome(&self) -> UpstreamResult<()> {
        if self.fail {
            return Err(UpstreamError::Rejected {
                service: Upstream::Slack,
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn test_config(signing_secret: Option<&str>) -> RelayConfig {
    let secret = signing_secret.map(String::from);
    RelayConfig::from_sources(FileConfig::default(), move |key: &str| match key {
        "SLACK_BOT_TOKEN" => Some("xoxb-test".to_string()),
        "JENKINS_URL" => Some("http://jenkins.invalid/job/bmi/buildWithParameters".to_string()),
        "JENKINS_USER" => Some("relay".to_string()),
        "JENKINS_TOKEN" => Some("token".to_string()),
        "SLACK_SIGNING_SECRET" => secret.clone(),
        _ => None,
    })
    .expect("test config")
}

fn app_with(signing_secret: Option<&str>, fail: bool) -> (Router, UnboundedReceiver<OutboundCall>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Arc::new(RecordingClient { calls: tx, fail });
    let state = Arc::new(AppState::new(test_config(signing_secret), client));
    (build_router(state), rx)
}

fn app() -> (Router, UnboundedReceiver<OutboundCall>) {
    app_with(None, false)
}

fn form_encode(pairs: &[(&str, &str)]) -> String {
    fn encode(raw: &str) -> String {
        raw.bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                _ => format!("%{:02X}", b),
            })
            .collect()
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_post(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", FORM_CONTENT_TYPE)
        .body(Body::from(body))
        .unwrap()
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn submission_payload(height: &str, weight: &str, user: &str) -> Value {
    json!({
        "type": "view_submission",
        "user": { "id": user, "username": "jdoe" },
        "view": {
            "id": "V123",
            "callback_id": "bmi_form",
            "state": { "values": {
                "height": { "height_input": { "type": "plain_text_input", "value": height } },
                "weight": { "weight_input": { "type": "plain_text_input", "value": weight } },
            } },
        },
    })
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn next_call(rx: &mut UnboundedReceiver<OutboundCall>) -> OutboundCall {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("outbound call within timeout")
        .expect("channel open")
}

async fn assert_no_more_calls(rx: &mut UnboundedReceiver<OutboundCall>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected outbound call");
}

#[tokio::test]
async fn bmi_without_trigger_id_returns_400_and_makes_no_call() {
    let (app, mut rx) = app();

    let response = app
        .oneshot(form_post(
            "/bmi",
            form_encode(&[("command", "/bmi"), ("user_id", "U1")]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"Missing trigger_id");
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn bmi_with_blank_trigger_id_returns_400() {
    let (app, mut rx) = app();

    let response = app
        .oneshot(form_post("/bmi", form_encode(&[("trigger_id", "  ")])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn bmi_opens_form_and_returns_empty_200() {
    let (app, mut rx) = app();

    let response = app
        .oneshot(form_post(
            "/bmi",
            form_encode(&[("trigger_id", "13345224609.738474920.8088930838d88f008e0"), ("user_id", "U1")]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    match next_call(&mut rx).await {
        OutboundCall::OpenForm { trigger_id, view } => {
            assert_eq!(trigger_id, "13345224609.738474920.8088930838d88f008e0");
            assert_eq!(view.callback_id, "bmi_form");
            assert_eq!(view.blocks.len(), 2);
        }
        other => panic!("unexpected call: {other:?}"),
    }
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn bmi_returns_200_even_when_slack_rejects_the_form() {
    let (app, mut rx) = app_with(None, true);

    let response = app
        .oneshot(form_post("/bmi", form_encode(&[("trigger_id", "T1")])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(next_call(&mut rx).await, OutboundCall::OpenForm { .. }));
}

#[tokio::test]
async fn submission_clears_form_and_dispatches_one_job() {
    let (app, mut rx) = app();
    let payload = submission_payload("180", "81", "U123").to_string();

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.as_str())]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({ "response_action": "clear" }));

    assert_eq!(
        next_call(&mut rx).await,
        OutboundCall::TriggerJob(JobParameters {
            height: "180".to_string(),
            weight: "81".to_string(),
            user: "U123".to_string(),
        })
    );
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn submission_still_clears_when_job_trigger_fails() {
    let (app, mut rx) = app_with(None, true);
    let payload = submission_payload("170", "65.5", "U9").to_string();

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.as_str())]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["response_action"], "clear");
    assert!(matches!(next_call(&mut rx).await, OutboundCall::TriggerJob(_)));
}

#[tokio::test]
async fn other_interaction_types_are_accepted_without_action() {
    let (app, mut rx) = app();
    let payload = json!({ "type": "block_actions", "user": { "id": "U1" }, "actions": [] })
        .to_string();

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.as_str())]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn malformed_or_missing_payload_returns_400() {
    let (app, mut rx) = app();

    let response = app
        .clone()
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", "{not json")]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("token", "abc")]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "Missing required field: payload");

    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn submission_missing_weight_returns_structured_400() {
    let (app, mut rx) = app();
    let mut payload = submission_payload("180", "80", "U1");
    payload["view"]["state"]["values"]
        .as_object_mut()
        .unwrap()
        .remove("weight");

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.to_string().as_str())]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        body["error"],
        "Missing required field: view.state.values.weight.weight_input.value"
    );
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn non_numeric_values_keep_form_open_with_errors() {
    let (app, mut rx) = app();
    let payload = submission_payload("tall", "80", "U1").to_string();

    let response = app
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.as_str())]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["response_action"], "errors");
    assert_eq!(body["errors"]["height"], "Height (cm) must be a number");
    assert!(body["errors"].get("weight").is_none());
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn out_of_range_numbers_are_dispatched_unchanged() {
    for (height, weight) in [("0", "70"), ("-180", "70"), (" 175 ", "68")] {
        let (app, mut rx) = app();
        let payload = submission_payload(height, weight, "U7").to_string();

        let response = app
            .oneshot(form_post(
                "/slack/interactions",
                form_encode(&[("payload", payload.as_str())]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({ "response_action": "clear" }));
        assert_eq!(
            next_call(&mut rx).await,
            OutboundCall::TriggerJob(JobParameters {
                height: height.to_string(),
                weight: weight.to_string(),
                user: "U7".to_string(),
            })
        );
        assert_no_more_calls(&mut rx).await;
    }
}

#[tokio::test]
async fn jenkins_result_value_is_posted_verbatim() {
    let (app, mut rx) = app();

    let response = app
        .oneshot(json_post("/jenkins/result", json!({ "user": "U123", "bmi": " 22.5 " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        next_call(&mut rx).await,
        OutboundCall::PostMessage {
            user_id: "U123".to_string(),
            text: "Your BMI is * 22.5 *".to_string(),
        }
    );
}

#[tokio::test]
async fn jenkins_result_posts_message_to_user() {
    let (app, mut rx) = app();

    let response = app
        .oneshot(json_post("/jenkins/result", json!({ "user": "U123", "bmi": "22.5" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
    match next_call(&mut rx).await {
        OutboundCall::PostMessage { user_id, text } => {
            assert_eq!(user_id, "U123");
            assert!(text.contains("22.5"));
        }
        other => panic!("unexpected call: {other:?}"),
    }
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn jenkins_result_returns_200_when_post_fails() {
    let (app, mut rx) = app_with(None, true);

    let response = app
        .oneshot(json_post("/jenkins/result", json!({ "user": "U1", "bmi": 19.2 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(
        next_call(&mut rx).await,
        OutboundCall::PostMessage { text, .. } if text.contains("19.2")
    ));
}

#[tokio::test]
async fn jenkins_result_missing_fields_returns_400() {
    let (app, mut rx) = app();

    for body in [
        json!({ "user": "U123" }),
        json!({ "bmi": "22.5" }),
        json!({}),
    ] {
        let response = app
            .clone()
            .oneshot(json_post("/jenkins/result", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(
            Request::post("/jenkins/result")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn repeated_jenkins_result_posts_twice() {
    let (app, mut rx) = app();
    let body = json!({ "user": "U123", "bmi": "22.5" });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_post("/jenkins/result", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(matches!(next_call(&mut rx).await, OutboundCall::PostMessage { .. }));
    assert!(matches!(next_call(&mut rx).await, OutboundCall::PostMessage { .. }));
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn health_endpoints_return_static_text() {
    let (app, mut rx) = app_with(None, true);

    for uri in ["/", "/health"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_bytes(response).await,
            "Slack ↔ Jenkins BMI integration is running!".as_bytes()
        );
    }
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn status_reports_dispatch_count() {
    let (app, mut rx) = app();
    let payload = submission_payload("180", "81", "U1").to_string();

    app.clone()
        .oneshot(form_post(
            "/slack/interactions",
            form_encode(&[("payload", payload.as_str())]),
        ))
        .await
        .unwrap();
    next_call(&mut rx).await;

    let response = app
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["name"], "bmi_relay");
    assert_eq!(body["dispatched_jobs"], 1);
    assert_eq!(body["signature_verification"], false);
    assert!(body["started_at"].is_string());
}

#[tokio::test]
async fn unsigned_slack_requests_are_rejected_when_secret_is_configured() {
    let (app, mut rx) = app_with(Some(SIGNING_SECRET), false);

    let response = app
        .oneshot(form_post("/bmi", form_encode(&[("trigger_id", "T1")])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_no_more_calls(&mut rx).await;
}

#[tokio::test]
async fn signed_slack_requests_are_accepted() {
    let (app, mut rx) = app_with(Some(SIGNING_SECRET), false);
    let body = form_encode(&[("trigger_id", "T1")]);
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signed = signature::sign(SIGNING_SECRET, &timestamp, body.as_bytes()).unwrap();

    let response = app
        .oneshot(
            Request::post("/bmi")
                .header("content-type", FORM_CONTENT_TYPE)
                .header(signature::TIMESTAMP_HEADER, timestamp)
                .header(signature::SIGNATURE_HEADER, signed)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(next_call(&mut rx).await, OutboundCall::OpenForm { .. }));
}

#[tokio::test]
async fn jenkins_callback_is_not_signature_checked() {
    let (app, mut rx) = app_with(Some(SIGNING_SECRET), false);

    let response = app
        .oneshot(json_post("/jenkins/result", json!({ "user": "U1", "bmi": "20" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(next_call(&mut rx).await, OutboundCall::PostMessage { .. }));
}
