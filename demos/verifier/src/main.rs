//! # Edge Verification Gateway Demo
//!
//! A thin axum front end over [`peac_core::gateway::Gateway`]. The gateway
//! itself is a pure request FSM; this binary only does the HTTP-framework
//! translation the core deliberately leaves out.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use peac_core::config::RuntimeConfig;
use peac_core::gateway::{Gateway, GatewayConfig, GatewayDecision, ProblemDetails};
use peac_core::jwks::{Resolver, ResolverConfig};
use peac_core::replay::{InMemoryReplayStore, NoopReplayStore, ReplayStore};
use peac_core::transport::RequestCarriers;
use peac_core::verifier::{Verifier, VerifyPolicy};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

struct AppState {
    verifier: Verifier,
    gateway_config: GatewayConfig,
    http_client: reqwest::Client,
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("set subscriber");

    let (config, warnings) = RuntimeConfig::from_env().expect("valid environment configuration");
    for warning in &warnings {
        tracing::warn!(field = warning.field, "{}", warning.message);
    }

    let http_client = reqwest::Client::new();
    let resolver = Resolver::new(http_client.clone(), ResolverConfig::default());
    for issuer in config.trusted_issuers.iter().chain(config.issuer_allowlist.iter()) {
        for verifier in &config.verify_keys {
            resolver.seed(issuer, verifier.clone(), 3600);
        }
    }

    let policy = VerifyPolicy {
        issuer_allowlist: config.issuer_allowlist.clone(),
        unsafe_allow_any_issuer: config.unsafe_allow_any_issuer,
        require_replay_protection: !config.unsafe_allow_no_replay,
        ..VerifyPolicy::default()
    };

    let replay_store: Arc<dyn ReplayStore> = if config.unsafe_allow_no_replay {
        Arc::new(NoopReplayStore)
    } else {
        Arc::new(InMemoryReplayStore::new())
    };

    let verifier = Verifier::new(resolver, replay_store, policy);
    let gateway_config = GatewayConfig { bypass_paths: config.bypass_paths.clone(), ..GatewayConfig::default() };
    let state = Arc::new(AppState { verifier, gateway_config, http_client });

    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);
    let router = Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind("0.0.0.0:8082").await.expect("should bind");
    tracing::info!("listening on {}", listener.local_addr().expect("should have addr"));
    axum::serve(listener, router).await.expect("server should run");
}

async fn handle(
    State(state): State<Arc<AppState>>, headers: HeaderMap, uri: axum::http::Uri, body: Bytes,
) -> Response {
    let lower_headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let carriers = RequestCarriers {
        headers: &lower_headers,
        body: if body.is_empty() { None } else { Some(body.as_ref()) },
    };

    let gateway = Gateway::with_client(state.gateway_config.clone(), &state.verifier, None, state.http_client.clone());
    let decision = gateway.handle(uri.path(), "anonymous", &carriers).await;

    match decision {
        GatewayDecision::Pass => (StatusCode::OK, "bypassed").into_response(),
        GatewayDecision::Forward { headers } => {
            let mut response_headers = HeaderMap::new();
            for (name, value) in headers {
                if let (Ok(name), Ok(value)) =
                    (axum::http::HeaderName::try_from(name), axum::http::HeaderValue::try_from(value))
                {
                    response_headers.insert(name, value);
                }
            }
            (StatusCode::OK, response_headers, "verified").into_response()
        }
        GatewayDecision::Challenge(problem) => problem_response(&problem),
        GatewayDecision::Error(problem) => problem_response(&problem),
        GatewayDecision::RateLimited(problem) => problem_response(&problem),
    }
}

fn problem_response(problem: &ProblemDetails) -> Response {
    let status = StatusCode::from_u16(problem.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(problem)).into_response()
}
