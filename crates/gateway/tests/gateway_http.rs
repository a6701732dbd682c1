//! HTTP-level tests against a real listening gateway.

use std::sync::Arc;

use {
    doorman_config::AuthMode,
    doorman_extensions::{ExtensionHost, RouteResponse},
    doorman_gateway::{
        auth::ResolvedAuth,
        server::build_gateway_app,
        state::GatewayState,
    },
};

/// Bind the app on an ephemeral loopback port and return its base URL.
async fn serve(auth: ResolvedAuth, host: ExtensionHost) -> String {
    let state = GatewayState::new(auth, Arc::new(host));
    let app = build_gateway_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn token_auth(token: &str) -> ResolvedAuth {
    ResolvedAuth {
        mode: AuthMode::Token,
        token: Some(token.into()),
    }
}

fn open_auth() -> ResolvedAuth {
    ResolvedAuth {
        mode: AuthMode::None,
        token: None,
    }
}

fn assert_security_headers(res: &reqwest::Response) {
    let headers = res.headers();
    assert_eq!(
        headers.get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
}

#[tokio::test]
async fn health_passes_gate_with_bearer_token() {
    let base = serve(token_auth("test-token"), ExtensionHost::new()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base}/health"))
        .bearer_auth("test-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_security_headers(&res);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn gate_rejects_missing_and_wrong_credentials() {
    let base = serve(token_auth("test-token"), ExtensionHost::new()).await;
    let client = reqwest::Client::new();

    let missing = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(missing.status(), 401);
    // Rejections carry the security headers too.
    assert_security_headers(&missing);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let wrong = client
        .get(format!("{base}/health"))
        .bearer_auth("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
}

#[tokio::test]
async fn gate_accepts_query_token() {
    let base = serve(token_auth("test-token"), ExtensionHost::new()).await;
    let res = reqwest::get(format!("{base}/health?token=test-token"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn none_mode_passes_without_credentials() {
    let base = serve(open_auth(), ExtensionHost::new()).await;
    let res = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn unknown_path_is_404_with_headers() {
    let base = serve(open_auth(), ExtensionHost::new()).await;
    let res = reqwest::get(format!("{base}/no/such/route")).await.unwrap();
    assert_eq!(res.status(), 404);
    assert_security_headers(&res);
}

#[tokio::test]
async fn extension_route_is_served_through_the_router() {
    use doorman_extensions::ExtensionApi;

    let host = ExtensionHost::new();
    host.register_http_route(
        "/ext/hello",
        Arc::new(|req| {
            Box::pin(async move {
                let name = req.query("name").unwrap_or("world").to_string();
                Ok(RouteResponse::text(200, format!("hello {name}")))
            })
        }),
    )
    .unwrap();

    let base = serve(open_auth(), host).await;
    let res = reqwest::get(format!("{base}/ext/hello?name=doorman"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_security_headers(&res);
    assert_eq!(res.text().await.unwrap(), "hello doorman");
}

#[tokio::test]
async fn extension_redirect_keeps_location_header() {
    use doorman_extensions::ExtensionApi;

    let host = ExtensionHost::new();
    host.register_http_route(
        "/go",
        Arc::new(|_req| {
            Box::pin(async { Ok(RouteResponse::redirect("https://example.com/next")) })
        }),
    )
    .unwrap();

    let base = serve(open_auth(), host).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let res = client.get(format!("{base}/go")).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(
        res.headers().get("location").unwrap(),
        "https://example.com/next"
    );
}
