use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        body::Body,
        extract::{Request, State},
        http::{StatusCode, Uri, header},
        middleware::{self, Next},
        response::{IntoResponse, Response},
        routing::get,
    },
    tower_http::catch_panic::CatchPanicLayer,
    tracing::{info, warn},
};

use {
    doorman_config::{AuthMode, BindMode, DoormanConfig},
    doorman_extensions::{Extension, ExtensionHost, RouteRequest, RouteResponse},
    doorman_google_auth::GoogleAuthExtension,
};

use crate::{auth, headers::security_headers, state::GatewayState};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
///
/// Layer order matters: security headers are outermost so every response
/// carries them, then panic catching, then the auth gate — rejection happens
/// before any route or extension handler runs.
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let app_state = AppState { gateway: state };

    Router::new()
        .route("/health", get(health_handler))
        .fallback(extension_route_handler)
        .layer(middleware::from_fn_with_state(app_state.clone(), auth_gate))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(security_headers))
        .with_state(app_state)
}

/// Start the gateway HTTP server with the Google access gate loaded.
pub async fn start_gateway(config: DoormanConfig) -> anyhow::Result<()> {
    let resolved_auth = auth::resolve_auth(&config.gateway);
    if config.gateway.bind_mode == BindMode::Public && resolved_auth.mode == AuthMode::None {
        warn!("auth mode 'none' on a public bind: every reachable client gets full access");
    }

    let host = Arc::new(ExtensionHost::new());

    // A failing extension is skipped, never fatal.
    let google = GoogleAuthExtension::new(config.google_auth.clone());
    if let Err(e) = host.load(&google).await {
        warn!(extension = google.name(), error = %e, "extension setup failed, skipping");
    }

    let state = GatewayState::new(resolved_auth, Arc::clone(&host));
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr =
        format!("{}:{}", config.gateway.bind_address(), config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("doorman gateway v{}", state.version),
        format!("listening on {addr}"),
        format!("auth: {:?}, bind: {:?}", config.gateway.auth_mode, config.gateway.bind_mode),
        format!("{} commands registered", host.commands().len()),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Gateway auth gate. Uniform 401 with no detail on why (no oracle on
/// whether a presented token was "close").
async fn auth_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = extract_token(&req);
    let result = auth::authorize_request(&state.gateway.auth, provided.as_deref());
    if !result.ok {
        warn!(
            reason = result.reason.as_deref().unwrap_or("unknown"),
            path = req.uri().path(),
            "request rejected by auth gate"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Credential extraction: `Authorization: Bearer <token>` preferred, `?token=`
/// accepted for browser-initiated flows.
fn extract_token(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION)
        && let Ok(s) = value.to_str()
        && let Some(token) = s.strip_prefix("Bearer ")
    {
        return Some(token.to_string());
    }
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "commands": state.gateway.host.commands().len(),
    }))
}

/// Fallback: exact-path dispatch into the extension route registry.
async fn extension_route_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let mut query = HashMap::new();
    if let Some(q) = uri.query() {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            query.insert(k.into_owned(), v.into_owned());
        }
    }
    let req = RouteRequest {
        path: uri.path().to_string(),
        query,
    };

    match state.gateway.host.dispatch_route(req).await {
        Some(res) => into_http_response(res),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "not found" })),
        )
            .into_response(),
    }
}

fn into_http_response(res: RouteResponse) -> Response {
    let status =
        StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, res.content_type);
    for (name, value) in res.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(res.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
