use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use calldesk_common::{AgentError, ApiResponse, CallStage};
use calldesk_core::{AgentCore, CoreConfig, OpenSessionRequest};
use calldesk_notify::TwilioConfig;
use calldesk_store::StoreConfig;
use calldesk_telephony::TelephonyConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct InvokeResponse {
    spoken: String,
}

#[derive(Debug, Deserialize)]
struct StageRequest {
    stage: CallStage,
}

#[derive(Debug, Deserialize)]
struct CollectInfoRequest {
    info: serde_json::Value,
}

// Application state
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AgentCore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calldesk=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting calldesk agent backend...");

    // Load environment variables
    dotenv::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./data/calldesk.db".to_string());
    let transfer_target =
        std::env::var("TRANSFER_TARGET").unwrap_or_else(|_| "+916355703851".to_string());

    let config = CoreConfig {
        store_config: StoreConfig {
            database_url,
            ..Default::default()
        },
        twilio_config: TwilioConfig::from_env()?,
        telephony_config: TelephonyConfig::from_env()?,
        transfer_target,
    };

    let core = AgentCore::new(config).await?;
    let state = Arc::new(AppState {
        core: Arc::new(core),
    });

    // Build the router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Driver-facing session and tool surface
        .route("/api/v1/sessions", post(open_session_handler))
        .route("/api/v1/sessions/:id", get(session_state_handler))
        .route("/api/v1/sessions/:id/stage", post(mark_stage_handler))
        .route("/api/v1/sessions/:id/tools/:name", post(invoke_tool_handler))
        .route("/api/v1/tools", get(list_tools_handler))
        // Direct collection endpoint
        .route("/api/v1/collect-info", post(collect_info_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        );

    let port = std::env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let addr = format!("0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::NotFound(_) => StatusCode::NOT_FOUND,
        AgentError::Validation(_) => StatusCode::BAD_REQUEST,
        AgentError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "calldesk".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn open_session_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OpenSessionRequest>,
) -> impl IntoResponse {
    let start = state.core.open_session(payload).await;
    Json(ApiResponse::success(start))
}

async fn session_state_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.core.session_state(id).await {
        Ok(session) => (StatusCode::OK, Json(ApiResponse::success(session))).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
    }
}

async fn mark_stage_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StageRequest>,
) -> impl IntoResponse {
    match state.core.mark_stage(id, payload.stage).await {
        Ok(session) => (StatusCode::OK, Json(ApiResponse::success(session))).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
    }
}

async fn invoke_tool_handler(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
    Json(args): Json<serde_json::Value>,
) -> impl IntoResponse {
    match state.core.invoke_tool(id, &name, &args).await {
        Ok(spoken) => (
            StatusCode::OK,
            Json(ApiResponse::success(InvokeResponse { spoken })),
        )
            .into_response(),
        Err(e) => {
            error!("Tool invocation {} failed: {}", name, e);
            (
                error_status(&e),
                Json(ApiResponse::<()>::error(e.to_string())),
            )
                .into_response()
        }
    }
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(state.core.registry.descriptors()))
}

// Direct info collection, kept for parity with the old collection server
async fn collect_info_handler(Json(payload): Json<CollectInfoRequest>) -> impl IntoResponse {
    info!("Collected info: {}", payload.info);
    Json(serde_json::json!({
        "message": "Info collected successfully"
    }))
}
