//! Web server for the 1RM calculator.
//!
//! Provides a JSON API over the calculator state, a WebSocket that tells
//! clients when the estimate was recomputed, and static file serving for the
//! frontend.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tower_http::services::ServeDir;

use crate::calculator::{CalculatorState, StateUpdate};
use crate::domain::{Estimate, HypertrophyEntry, PercentageEntry, format_kg};
use crate::error::CalcError;
use crate::formulas::{
    Formula, compute_hypertrophy_table, compute_one_rm, compute_percentage_table,
};
use crate::mailer::EmailSender;

/// Message types for WebSocket broadcast.
#[derive(Clone, Debug)]
pub enum WsMessage {
    /// The estimate has been recomputed.
    Recalculated,
    /// An update was rejected.
    Error(String),
}

/// Shared application state.
pub struct AppState<S> {
    /// The calculator form, protected by RwLock for concurrent reads.
    pub calculator: RwLock<CalculatorState>,
    /// Delivers results by email.
    pub sender: S,
    /// Broadcast channel for WebSocket notifications.
    pub ws_broadcast: broadcast::Sender<WsMessage>,
}

impl<S: EmailSender> AppState<S> {
    pub fn new(calculator: CalculatorState, sender: S) -> Self {
        let (ws_broadcast, _) = broadcast::channel(16);

        Self {
            calculator: RwLock::new(calculator),
            sender,
            ws_broadcast,
        }
    }
}

// === JSON Request Types ===

#[derive(Deserialize)]
pub struct CalculateRequest {
    pub weight: f64,
    pub reps: u32,
    pub formula: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub name: String,
    pub email: String,
}

// === JSON Response Types ===

#[derive(Serialize)]
pub struct EntryJson {
    pub weight: f64,
    pub display: String,
}

#[derive(Serialize)]
pub struct PercentageJson {
    pub percentage: u32,
    #[serde(flatten)]
    pub entry: EntryJson,
}

#[derive(Serialize)]
pub struct HypertrophyJson {
    pub reps: u32,
    #[serde(flatten)]
    pub entry: EntryJson,
}

#[derive(Serialize)]
pub struct EstimateResponse {
    pub weight: f64,
    pub reps: u32,
    pub formula: String,
    pub one_rm: f64,
    pub one_rm_display: String,
    pub percentages: Vec<PercentageJson>,
    pub hypertrophy: Vec<HypertrophyJson>,
}

#[derive(Serialize)]
pub struct StateResponse {
    pub title: String,
    pub exercise: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub estimate: EstimateResponse,
}

#[derive(Serialize)]
pub struct MessageJson {
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorJson {
    pub error: String,
}

impl EstimateResponse {
    fn new(
        weight: f64,
        reps: u32,
        formula: &str,
        one_rm: f64,
        percentages: &[PercentageEntry],
        hypertrophy: &[HypertrophyEntry],
    ) -> Self {
        Self {
            weight,
            reps,
            formula: formula.to_string(),
            one_rm,
            one_rm_display: format_kg(one_rm),
            percentages: percentages
                .iter()
                .map(|p| PercentageJson {
                    percentage: p.percentage,
                    entry: entry_json(p.weight),
                })
                .collect(),
            hypertrophy: hypertrophy
                .iter()
                .map(|h| HypertrophyJson {
                    reps: h.reps,
                    entry: entry_json(h.weight),
                })
                .collect(),
        }
    }
}

impl From<&Estimate> for EstimateResponse {
    fn from(estimate: &Estimate) -> Self {
        Self::new(
            estimate.input.weight_kg(),
            estimate.input.reps(),
            estimate.input.formula().name(),
            estimate.one_rm,
            &estimate.percentages,
            &estimate.hypertrophy,
        )
    }
}

impl From<&CalculatorState> for StateResponse {
    fn from(state: &CalculatorState) -> Self {
        Self {
            title: state.title(),
            exercise: state.exercise().to_string(),
            updated_at: state.updated_at().to_rfc3339(),
            estimate: state.estimate().into(),
        }
    }
}

/// Error returned by API handlers.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorJson { error: self.1 })).into_response()
    }
}

impl From<CalcError> for ApiError {
    fn from(err: CalcError) -> Self {
        let status = match err {
            CalcError::Input(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CalcError::Formula(_) => StatusCode::BAD_REQUEST,
        };
        ApiError(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(rejection.status(), rejection.body_text())
    }
}

// === Router Setup ===

/// Creates the application router.
pub fn create_router<S: EmailSender>(state: Arc<AppState<S>>, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/formulas", get(get_formulas))
        .route("/api/state", get(get_state::<S>).patch(update_state::<S>))
        .route("/api/calculate", post(calculate))
        .route("/api/email", post(send_email::<S>))
        .route("/ws", get(ws_handler::<S>))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .with_state(state)
}

// === WebSocket Handler ===

/// WebSocket upgrade handler for live updates.
async fn ws_handler<S: EmailSender>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let rx = state.ws_broadcast.subscribe();
    ws.on_upgrade(|socket| handle_ws_connection(socket, rx))
}

/// Handles an individual WebSocket connection.
async fn handle_ws_connection(mut socket: WebSocket, mut rx: broadcast::Receiver<WsMessage>) {
    log::info!("WebSocket client connected");

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let text = match msg {
                    Ok(WsMessage::Recalculated) => "recalculated".to_string(),
                    Ok(WsMessage::Error(err)) => format!("error:{}", err),
                    // Missed some messages, the latest state is all that matters
                    Err(broadcast::error::RecvError::Lagged(_)) => "recalculated".to_string(),
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    log::info!("WebSocket client disconnected");
}

/// Runs the web server.
pub async fn run_server<S: EmailSender>(
    state: Arc<AppState<S>>,
    port: u16,
    static_dir: PathBuf,
) -> anyhow::Result<()> {
    let app = create_router(state, static_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("Server running at http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// === API Handlers ===

/// GET /api/formulas - Names of the available formulas.
async fn get_formulas() -> Json<Vec<&'static str>> {
    Json(Formula::all().iter().map(|f| f.name()).collect())
}

/// GET /api/state - Current form values and estimate.
async fn get_state<S: EmailSender>(State(state): State<Arc<AppState<S>>>) -> Json<StateResponse> {
    let calculator = state.calculator.read().await;
    Json(StateResponse::from(&*calculator))
}

/// PATCH /api/state - Apply a partial form update and recompute.
async fn update_state<S: EmailSender>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<StateUpdate>, JsonRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Json(update) = payload?;
    let mut calculator = state.calculator.write().await;

    if let Err(err) = calculator.apply(update) {
        log::warn!("Rejected update: {}", err);
        let _ = state.ws_broadcast.send(WsMessage::Error(err.to_string()));
        return Err(err.into());
    }

    let response = StateResponse::from(&*calculator);
    drop(calculator);

    let _ = state.ws_broadcast.send(WsMessage::Recalculated);
    Ok(Json(response))
}

/// POST /api/calculate - Stateless estimate for one input.
async fn calculate(
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let Json(req) = payload?;
    let one_rm = compute_one_rm(req.weight, req.reps, &req.formula)?;

    Ok(Json(EstimateResponse::new(
        req.weight,
        req.reps,
        req.formula.trim(),
        one_rm,
        &compute_percentage_table(one_rm),
        &compute_hypertrophy_table(one_rm),
    )))
}

/// POST /api/email - Send the current estimate to the mail endpoint.
async fn send_email<S: EmailSender>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<MessageJson>, ApiError> {
    let Json(req) = payload?;
    let payload = state
        .calculator
        .read()
        .await
        .email_payload(&req.name, &req.email);

    match state.sender.send(&payload).await {
        Ok(()) => Ok(Json(MessageJson {
            message: "Email sent successfully!".to_string(),
        })),
        Err(err) => {
            log::error!("Email delivery failed: {}", err);
            Err(ApiError(
                StatusCode::BAD_GATEWAY,
                "Failed to send email.".to_string(),
            ))
        }
    }
}

// === Helper Functions ===

fn entry_json(weight: f64) -> EntryJson {
    EntryJson {
        weight,
        display: format_kg(weight),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::mailer::fake::RecordingSender;

    fn test_state(sender: RecordingSender) -> Arc<AppState<RecordingSender>> {
        Arc::new(AppState::new(CalculatorState::default(), sender))
    }

    fn test_router(state: Arc<AppState<RecordingSender>>) -> Router {
        create_router(state, PathBuf::from("static"))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_formulas() {
        let app = test_router(test_state(RecordingSender::default()));
        let response = app
            .oneshot(Request::get("/api/formulas").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body, serde_json::json!(["Epley", "Brzycki", "Lombardi"]));
    }

    #[tokio::test]
    async fn test_get_default_state() {
        let app = test_router(test_state(RecordingSender::default()));
        let response = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["formula"], "Epley");
        assert_eq!(body["one_rm_display"], "116.7 kg");
        assert_eq!(body["percentages"][0]["percentage"], 90);
        assert_eq!(body["percentages"][0]["display"], "105.0 kg");
        assert_eq!(body["hypertrophy"].as_array().unwrap().len(), 4);
        assert_eq!(body["title"], "Your 1RM (One rep max for the exercise)");
    }

    #[tokio::test]
    async fn test_patch_state_recomputes_and_notifies() {
        let state = test_state(RecordingSender::default());
        let mut rx = state.ws_broadcast.subscribe();
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/state",
                serde_json::json!({"formula": "Brzycki", "exercise": "Squat"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["one_rm"], 112.5);
        assert_eq!(body["title"], "Your 1RM for Squat");
        assert!(matches!(rx.try_recv(), Ok(WsMessage::Recalculated)));
    }

    #[tokio::test]
    async fn test_patch_state_rejects_reps_out_of_range() {
        let state = test_state(RecordingSender::default());
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/state",
                serde_json::json!({"reps": 21}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let calculator = state.calculator.read().await;
        assert_eq!(calculator.reps(), 5);
        assert_eq!(calculator.estimate().display_one_rm(), "116.7");
    }

    #[tokio::test]
    async fn test_patch_state_rejects_unknown_formula() {
        let state = test_state(RecordingSender::default());
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/state",
                serde_json::json!({"formula": "Unknown"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "unknown formula: Unknown");
        assert_eq!(state.calculator.read().await.formula(), Formula::Epley);
    }

    #[tokio::test]
    async fn test_patch_state_rejects_fractional_reps() {
        let state = test_state(RecordingSender::default());
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/state",
                serde_json::json!({"reps": 2.5}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
        assert_eq!(state.calculator.read().await.reps(), 5);
    }

    #[tokio::test]
    async fn test_patch_state_rejects_malformed_json() {
        let app = test_router(test_state(RecordingSender::default()));
        let request = Request::builder()
            .method("PATCH")
            .uri("/api/state")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"reps\":"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_calculate_stateless() {
        let state = test_state(RecordingSender::default());
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/calculate",
                serde_json::json!({"weight": 100.0, "reps": 5, "formula": "Lombardi"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["formula"], "Lombardi");
        assert_eq!(body["percentages"].as_array().unwrap().len(), 8);
        assert_eq!(body["one_rm_display"], "117.5 kg");
        // Shared form state untouched
        assert_eq!(state.calculator.read().await.formula(), Formula::Epley);
    }

    #[tokio::test]
    async fn test_calculate_negative_weight() {
        let app = test_router(test_state(RecordingSender::default()));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/calculate",
                serde_json::json!({"weight": -1.0, "reps": 5, "formula": "Epley"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_calculate_negative_reps() {
        let app = test_router(test_state(RecordingSender::default()));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/calculate",
                serde_json::json!({"weight": 100.0, "reps": -1, "formula": "Epley"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_calculate_unknown_formula() {
        let app = test_router(test_state(RecordingSender::default()));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/calculate",
                serde_json::json!({"weight": 100.0, "reps": 5, "formula": "Unknown"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_email_success() {
        let state = test_state(RecordingSender::default());
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/email",
                serde_json::json!({"name": "Sam", "email": "sam@example.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["message"], "Email sent successfully!");

        let sent = state.sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].email, "sam@example.com");
        assert_eq!(sent[0].one_rm, "116.7");
    }

    #[tokio::test]
    async fn test_send_email_failure() {
        let state = test_state(RecordingSender {
            reject_with: Some(500),
            ..Default::default()
        });
        let app = test_router(state.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/email",
                serde_json::json!({"name": "Sam", "email": "sam@example.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Failed to send email.");
        // Estimate unaffected by the failed delivery
        assert_eq!(state.calculator.read().await.estimate().display_one_rm(), "116.7");
    }
}
