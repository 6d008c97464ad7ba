//! # Receipt Issuer Demo
//!
//! A minimal HTTP front end over [`peac_core::issuer::Issuer`]. Framework
//! glue like this is explicitly out of scope for the core library; it lives
//! here only to make the issue path runnable end to end.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use peac_core::canon::base64url;
use peac_core::crypto::Ed25519KeyPair;
use peac_core::issuer::{IssueRequest, Issuer, TransportChoice};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEMO_KID: &str = "demo-k1";
const DEMO_ISSUER: &str = "https://issuer.demo.peacprotocol.org";

#[derive(Clone)]
struct AppState {
    issuer: Arc<Issuer>,
    kid: String,
    public_key: [u8; 32],
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("set subscriber");

    let key = Ed25519KeyPair::generate();
    let public_key = key.public_bytes();
    let issuer = Issuer::new(DEMO_ISSUER, key, DEMO_KID, None).expect("valid issuer config");

    let state = AppState { issuer: Arc::new(issuer), kid: DEMO_KID.to_string(), public_key };

    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);
    let router = Router::new()
        .route("/issue", post(issue))
        .route("/.well-known/jwks.json", get(jwks))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind("0.0.0.0:8081").await.expect("should bind");
    tracing::info!("listening on {}", listener.local_addr().expect("should have addr"));
    axum::serve(listener, router).await.expect("server should run");
}

#[derive(Deserialize)]
struct IssueBody {
    aud: String,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    purpose_declared: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

async fn issue(State(state): State<AppState>, Json(body): Json<IssueBody>) -> Response {
    let request = IssueRequest {
        aud: body.aud,
        sub: body.sub,
        purpose_declared: body.purpose_declared.into_iter().collect(),
        nonce: body.nonce,
        expires_in: body.expires_in,
        ..IssueRequest::default()
    };

    match state.issuer.issue(request, TransportChoice::Auto).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(json!({
                "jws": issued.jws,
                "profile": format!("{:?}", issued.profile),
                "claims": issued.claims,
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

async fn jwks(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "keys": [{
            "kty": "OKP",
            "crv": "Ed25519",
            "x": base64url::encode(&state.public_key),
            "kid": state.kid,
            "use": "sig",
        }],
    }))
}
