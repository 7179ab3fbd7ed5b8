//! Axum-based chat gateway: HTTP boundary over `ChatEngine`. Config-driven via CoreConfig.
//!
//! Routes: `POST /chat`, `GET /health`, `GET /v1/status`.
//! Flags: `--verify` (pre-flight check), `--export-training <dir>` (write classifier training data).

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use helpdesk_core::{training, ChatEngine, CoreConfig, KnowledgeBase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path as StdPath;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pre-flight check: knowledge base readable, audit log writable, port available.
fn run_verify() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;

    print!("Checking knowledge base {}... ", config.knowledge_base_path);
    let kb = KnowledgeBase::load(&config.knowledge_base_path).map_err(|e| e.to_string())?;
    if kb.is_empty() {
        return Err("knowledge base has no intents".to_string());
    }
    if let Some(entry) = kb.entries().find(|e| e.responses.is_empty()) {
        return Err(format!("intent '{}' has no responses", entry.intent_id));
    }
    println!("OK ({} intents)", kb.len());

    if config.audit_enabled() {
        print!("Checking audit log {}... ", config.audit_log_path);
        let path = StdPath::new(&config.audit_log_path);
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("audit log {} not writable: {}", path.display(), e))?;
        println!("OK");
    }

    let port = config.port;
    print!("Checking port {}... ", port);
    let addr = format!("{}:{}", config.host, port);
    match std::net::TcpListener::bind(&addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", port, e));
        }
    }

    println!("\nSUCCESS: All systems GO. Ready to start gateway.");
    Ok(())
}

/// Generates augmented `{text, label}` rows from the knowledge base and writes a train/validation split.
fn run_export_training(dir: &str) -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;
    let kb = KnowledgeBase::load(&config.knowledge_base_path).map_err(|e| e.to_string())?;
    let mut rng = match config.response_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let examples = training::generate_examples(&kb, &mut rng);
    let total = examples.len();
    let (train, validation) = training::split_examples(examples, training::DEFAULT_TRAIN_RATIO, &mut rng);
    training::save_dataset(StdPath::new(dir), &train, &validation).map_err(|e| e.to_string())?;
    println!(
        "Generated {} examples from {} intents: {} train, {} validation -> {}",
        total,
        kb.len(),
        train.len(),
        validation.len(),
        dir
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[helpdesk-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }
    if let Some(pos) = args.iter().position(|a| a == "--export-training") {
        let dir = args.get(pos + 1).map(String::as_str).unwrap_or("data");
        match run_export_training(dir) {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("EXPORT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(target: "helpdesk::gateway", "Config load failed ({}); using defaults", e);
            CoreConfig::default()
        }
    };
    let config = Arc::new(config);

    let engine = Arc::new(ChatEngine::bootstrap(&config).await);
    Arc::clone(&engine).spawn_session_sweeper(Duration::from_secs(config.sweep_interval_secs));

    let app = build_app(AppState {
        config: Arc::clone(&config),
        engine: Arc::clone(&engine),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(target: "helpdesk::gateway", "Cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(target: "helpdesk::gateway", "{} listening on {}", config.app_name, addr);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(target: "helpdesk::gateway", "Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!(target: "helpdesk::gateway", "Server error: {}", e);
    }
    engine.flush_audit().await;
    tracing::info!(target: "helpdesk::gateway", "Shut down");
}

fn build_app(state: AppState) -> Router {
    // CORS: local development frontends only.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            let host = s
                .split("://")
                .nth(1)
                .unwrap_or("")
                .split(':')
                .next()
                .unwrap_or("");
            host == "localhost" || host == "127.0.0.1"
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/v1/status", get(status))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) engine: Arc<ChatEngine>,
}

/// GET /health – liveness check.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "healthy" }))
}

/// GET /v1/status – app identity and engine state.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let engine = state.engine.status();
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "intents": engine.intents,
        "classifier_loaded": engine.classifier_loaded,
        "active_sessions": engine.active_sessions,
    }))
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /chat – validates the message, then resolves, answers and audits the turn.
/// Without a `session_id` the message is answered statelessly.
async fn chat(State(state): State<AppState>, payload: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(target: "helpdesk::gateway", "Rejected chat body: {}", rejection.body_text());
            return bad_request(format!("Invalid request body: {}", rejection.body_text()));
        }
    };
    let message = req.message.unwrap_or_default();
    if message.trim().is_empty() {
        return bad_request("No message provided".to_string());
    }
    let max = state.config.max_message_chars;
    let chars = message.chars().count();
    if chars > max {
        return bad_request(format!("Message too long. Maximum {} characters allowed.", max));
    }
    let session_id = req.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let reply = match session_id {
        Some(id) => state.engine.handle(id, &message).await,
        None => state.engine.handle_anonymous(&message).await,
    };
    tracing::info!(
        target: "helpdesk::gateway",
        session_id = session_id.unwrap_or("-"),
        intent = %reply.intent,
        chars,
        "Chat request handled"
    );

    let mut body = serde_json::json!({
        "response": reply.response,
        "intent": reply.intent,
    });
    if let Some(confidence) = reply.confidence_label() {
        body["confidence"] = serde_json::Value::String(confidence);
    }
    axum::Json(body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use helpdesk_core::{
        IntentResolver, JsonFileAuditLog, KnowledgeBase, ResponseComposer, SessionStore,
        CLARIFICATION_MESSAGE,
    };
    use tower::ServiceExt;

    const KB_JSON: &str = r#"{
        "greeting": { "patterns": ["hello", "hi"], "responses": ["Hello! How can I help you today?"] },
        "order_status": { "patterns": ["where is my order"], "responses": ["Let me look that up."] }
    }"#;

    fn test_config() -> CoreConfig {
        CoreConfig {
            app_name: "Test Helpdesk".to_string(),
            port: 5055,
            audit_log_path: String::new(),
            ..CoreConfig::default()
        }
    }

    fn test_engine(config: &CoreConfig) -> ChatEngine {
        let kb = Arc::new(KnowledgeBase::from_json_str(KB_JSON).unwrap());
        ChatEngine::new(
            Arc::clone(&kb),
            IntentResolver::new(kb, config.resolver_policy()),
            ResponseComposer::seeded(17),
            SessionStore::new(config.session_policy()),
        )
    }

    fn test_app() -> (Router, Arc<ChatEngine>) {
        let config = test_config();
        let engine = Arc::new(test_engine(&config));
        let app = build_app(AppState {
            config: Arc::new(config),
            engine: Arc::clone(&engine),
        });
        (app, engine)
    }

    async fn post_chat(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_resolves_greeting() {
        let (app, engine) = test_app();
        let (status, json) = post_chat(
            app,
            serde_json::json!({ "message": "Hello", "session_id": "abc" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["intent"], "greeting");
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("Hello! How can I help you today?"));
        assert!(json.get("confidence").is_none());
        assert_eq!(engine.sessions().session_len("abc"), 1);
    }

    #[tokio::test]
    async fn test_chat_unknown_gets_clarification() {
        let (app, _) = test_app();
        let (status, json) = post_chat(app, serde_json::json!({ "message": "xyz999 qqq" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["intent"], "unknown");
        assert_eq!(json["response"], CLARIFICATION_MESSAGE);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let (app, engine) = test_app();
        let (status, json) = post_chat(app, serde_json::json!({ "message": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No message provided");
        assert_eq!(engine.status().active_sessions, 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_oversized_message() {
        let (app, _) = test_app();
        let (status, json) = post_chat(app, serde_json::json!({ "message": "a".repeat(501) })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Message too long. Maximum 500 characters allowed.");
    }

    #[tokio::test]
    async fn test_chat_accepts_exactly_max_chars() {
        let (app, _) = test_app();
        let (status, _) = post_chat(app, serde_json::json!({ "message": "é".repeat(500) })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_session_is_answered_without_history() {
        let (app, engine) = test_app();
        for _ in 0..3 {
            let (status, json) = post_chat(app.clone(), serde_json::json!({ "message": "hi" })).await;
            assert_eq!(status, StatusCode::OK);
            // No shared session means no rephrasing of the repeated greeting.
            assert!(json["response"]
                .as_str()
                .unwrap()
                .starts_with("Hello! How can I help you today?"));
        }
        assert_eq!(engine.status().active_sessions, 0);
    }

    async fn post_raw(app: Router, content_type: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_400() {
        let cases = [
            ("application/json", "{ not json"),
            ("text/plain", r#"{"message":"hi"}"#),
            ("application/json", r#"{"message": 42}"#),
        ];
        for (content_type, body) in cases {
            let (app, _) = test_app();
            let (status, json) = post_raw(app, content_type, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{content_type} {body}");
            assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
        }
    }

    #[tokio::test]
    async fn test_null_message_is_reported_as_missing() {
        let (app, _) = test_app();
        let (status, json) = post_raw(app, "application/json", r#"{"message": null}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No message provided");
    }

    #[tokio::test]
    async fn test_status_reports_engine_state() {
        let (app, _) = test_app();
        let req = Request::builder().uri("/v1/status").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["app_name"], "Test Helpdesk");
        assert_eq!(json["intents"], 2);
        assert_eq!(json["classifier_loaded"], false);
        assert_eq!(json["active_sessions"], 0);
    }

    #[tokio::test]
    async fn test_chat_turn_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(JsonFileAuditLog::new(dir.path().join("conversation_logs.json")));
        let config = test_config();
        let engine = Arc::new(test_engine(&config).with_logger(log.clone()));
        let app = build_app(AppState {
            config: Arc::new(config),
            engine: Arc::clone(&engine),
        });
        let (_, first) = post_chat(
            app.clone(),
            serde_json::json!({ "message": "where is my order", "session_id": "a" }),
        )
        .await;
        let (_, second) = post_chat(app, serde_json::json!({ "message": "hello", "session_id": "a" })).await;
        engine.flush_audit().await;

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].intent, first["intent"].as_str().unwrap());
        assert_eq!(records[0].bot_response, first["response"].as_str().unwrap());
        assert_eq!(records[1].user_message, "hello");
        assert_eq!(records[1].bot_response, second["response"].as_str().unwrap());
    }
}
