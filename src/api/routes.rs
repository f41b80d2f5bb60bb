//! REST endpoints of the recorder
//!
//! Session ids may come as query parameters or in the JSON body; the query
//! parameter wins when both are present.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{RecorderError, Result};
use crate::quality::{QualityResult, QualityRule};
use crate::recorder::{
    EventRequest, LocatorContext, PingStatus, RecorderService, RecordingSummary, StartedSession,
    StepTemplate,
};

pub type AppState = Arc<RecorderService>;

/// Session identifiers as sent by clients
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionIds {
    pub session_id: Option<String>,
    pub browser_id: Option<String>,
}

impl SessionIds {
    /// Query parameters override body fields
    fn merge(self, body: Option<SessionIds>) -> Result<(String, String)> {
        let body = body.unwrap_or_default();
        let pick = |param: Option<String>, field: Option<String>| {
            param
                .filter(|s| !s.is_empty())
                .or(field.filter(|s| !s.is_empty()))
        };
        match (
            pick(self.session_id, body.session_id),
            pick(self.browser_id, body.browser_id),
        ) {
            (Some(session_id), Some(browser_id)) => Ok((session_id, browser_id)),
            _ => Err(RecorderError::SessionNotFound(
                "missing sessionId or browserId".to_string(),
            )),
        }
    }
}

/// Query params for the event endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventQuery {
    pub project: Option<String>,
    pub group: Option<String>,
    pub session_id: Option<String>,
    pub browser_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub message: &'static str,
    pub step: String,
}

#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub content: String,
}

impl IntoResponse for RecorderError {
    fn into_response(self) -> Response {
        let status = match self {
            RecorderError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            RecorderError::SessionMismatch(_) => StatusCode::FORBIDDEN,
            RecorderError::DuplicateSession(_) => StatusCode::CONFLICT,
            RecorderError::SessionUnavailable(_) => StatusCode::GONE,
            RecorderError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            RecorderError::BrowserFailure(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("{}", self);
        }

        let body = json!({
            "status": status.as_u16(),
            "error": self.kind(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build API router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/recorder/start", post(start))
        .route("/api/recorder/event", post(record_event))
        .route("/api/recorder/ping", get(ping).post(ping))
        .route("/api/recorder/steps", get(steps))
        .route("/api/recorder/stop", post(stop))
        .route("/api/recorder/catalog", get(catalog))
        .route("/api/quality/rules", get(quality_rules))
        .route("/api/quality/analyze", post(analyze))
}

/// POST /api/recorder/start - Open a browser and begin recording
async fn start(State(service): State<AppState>) -> Result<Json<StartedSession>> {
    Ok(Json(service.start().await?))
}

/// POST /api/recorder/event?project=..&group=.. - Record one captured interaction
async fn record_event(
    State(service): State<AppState>,
    Query(query): Query<EventQuery>,
    Json(mut event): Json<EventRequest>,
) -> Result<Json<EventResponse>> {
    let ids = SessionIds {
        session_id: query.session_id,
        browser_id: query.browser_id,
    };
    let body_ids = SessionIds {
        session_id: Some(std::mem::take(&mut event.session_id)),
        browser_id: Some(std::mem::take(&mut event.browser_id)),
    };
    (event.session_id, event.browser_id) = ids.merge(Some(body_ids))?;

    let ctx = LocatorContext::new(query.project, query.group);
    let step = service.record_event(&ctx, event).await?;
    Ok(Json(EventResponse {
        message: "Event processed",
        step,
    }))
}

/// GET|POST /api/recorder/ping - Keep the session alive
async fn ping(
    State(service): State<AppState>,
    Query(query): Query<SessionIds>,
    body: Option<Json<SessionIds>>,
) -> Result<Json<PingStatus>> {
    let (session_id, browser_id) = query.merge(body.map(|Json(b)| b))?;
    Ok(Json(service.ping(&session_id, &browser_id).await?))
}

/// GET /api/recorder/steps - Steps recorded so far
async fn steps(
    State(service): State<AppState>,
    Query(query): Query<SessionIds>,
) -> Result<Json<StepsResponse>> {
    let (session_id, browser_id) = query.merge(None)?;
    let steps = service.steps(&session_id, &browser_id).await?;
    Ok(Json(StepsResponse { steps }))
}

/// POST /api/recorder/stop - Close the browser and score the recording
async fn stop(
    State(service): State<AppState>,
    Query(query): Query<SessionIds>,
    body: Option<Json<SessionIds>>,
) -> Result<Json<RecordingSummary>> {
    let (session_id, browser_id) = query.merge(body.map(|Json(b)| b))?;
    Ok(Json(service.stop(&session_id, &browser_id).await?))
}

/// GET /api/recorder/catalog - Step shapes the recorder produces
async fn catalog(State(service): State<AppState>) -> Json<&'static [StepTemplate]> {
    Json(service.step_catalog())
}

/// GET /api/quality/rules - Active quality rules
async fn quality_rules(State(service): State<AppState>) -> Result<Json<Vec<QualityRule>>> {
    let rules = service.analyzer().rules().await?;
    Ok(Json(rules.rules().iter().map(|r| r.rule.clone()).collect()))
}

/// POST /api/quality/analyze - Score arbitrary scenario text
async fn analyze(
    State(service): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<QualityResult>> {
    Ok(Json(service.analyzer().analyze(&request.content).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FakeBrowserDriver;
    use crate::quality::{QualityAnalyzer, RuleSource};
    use crate::recorder::{CaptureScript, StepMapper};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = Arc::new(RecorderService::new(
            Arc::new(FakeBrowserDriver::new()),
            StepMapper::literal(),
            Arc::new(QualityAnalyzer::new(RuleSource::Builtin)),
            CaptureScript::new("http://localhost:9090"),
            Duration::from_secs(3600),
        ));
        api_router().with_state(service)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_recording_over_http() {
        let app = app();
        let (status, started) = call(&app, Method::POST, "/api/recorder/start", None).await;
        assert_eq!(status, StatusCode::OK);
        let sid = started["sessionId"].as_str().unwrap().to_string();
        let bid = started["browserId"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/recorder/event",
            Some(json!({"sessionId": sid, "browserId": bid, "action": "click", "selector": "css=#submit"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "When I click \"css=#submit\"");

        let uri = format!("/api/recorder/ping?sessionId={}&browserId={}", sid, bid);
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");

        let uri = format!("/api/recorder/steps?sessionId={}&browserId={}", sid, bid);
        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["steps"].as_array().unwrap().len(), 1);

        let (status, summary) = call(
            &app,
            Method::POST,
            "/api/recorder/stop",
            Some(json!({"sessionId": sid, "browserId": bid})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["locators"]["selectorsUsed"], json!(["css=#submit"]));
        assert!(summary["quality"]["score"].is_number());
        assert!(summary["quality"]["ruleDetails"]["R5"].is_string());

        let (status, error) = call(
            &app,
            Method::POST,
            "/api/recorder/stop",
            Some(json!({"sessionId": sid, "browserId": bid})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "SessionNotFound");
    }

    #[tokio::test]
    async fn test_query_ids_override_body() {
        let app = app();
        let (_, started) = call(&app, Method::POST, "/api/recorder/start", None).await;
        let sid = started["sessionId"].as_str().unwrap();
        let bid = started["browserId"].as_str().unwrap();

        // Body carries a wrong browser id, the query parameter wins
        let uri = format!("/api/recorder/stop?browserId={}", bid);
        let (status, _) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({"sessionId": sid, "browserId": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mismatch_and_missing_ids() {
        let app = app();
        let (_, started) = call(&app, Method::POST, "/api/recorder/start", None).await;
        let sid = started["sessionId"].as_str().unwrap();

        let uri = format!("/api/recorder/steps?sessionId={}&browserId=other", sid);
        let (status, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "SessionMismatch");

        let (status, _) = call(&app, Method::GET, "/api/recorder/steps", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog_and_quality() {
        let app = app();
        let (status, catalog) = call(&app, Method::GET, "/api/recorder/catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(catalog.as_array().unwrap().len(), 6);
        assert_eq!(catalog[0]["type"], "GIVEN");

        let (_, rules) = call(&app, Method::GET, "/api/quality/rules", None).await;
        assert_eq!(rules.as_array().unwrap().len(), 5);

        let (status, result) = call(
            &app,
            Method::POST,
            "/api/quality/analyze",
            Some(json!({"content": "Scenario: Search for boots\nGiven a\nWhen b\nThen c"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["score"], 1.0);
    }
}
