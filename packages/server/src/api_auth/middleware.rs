use std::time::Instant;

use axum::{
    extract::{MatchedPath, OriginalUri, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::authenticate;
use crate::extractors::client_ip;
use crate::state::AppState;
use crate::usage::{ErrorNote, RequestRecord, TransferStats, UsageAggregator};

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Authenticate every request on the public API namespace and, for API-key
/// callers, record the finished request with the usage aggregator.
///
/// Requests rejected here are neither logged nor counted against the key.
pub async fn public_api_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let started = Instant::now();

    // Clients sign the full path they sent, before any router nesting.
    let signed_path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| signed_path.clone());
    let method = req.method().clone();

    let principal = match authenticate(&state, &method, &signed_path, req.headers()).await {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };

    let Some(api_key_id) = principal.api_key_id() else {
        req.extensions_mut().insert(principal);
        return next.run(req).await;
    };

    let request_size = content_length(req.headers()).unwrap_or(0);
    let ip_address = client_ip::resolve(
        req.headers(),
        req.extensions(),
        &state.config.server.trusted_proxies,
    );
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    req.extensions_mut().insert(principal);
    let response = next.run(req).await;

    let transfer = response
        .extensions()
        .get::<TransferStats>()
        .copied()
        .unwrap_or_default();
    let response_size = content_length(response.headers()).unwrap_or(transfer.bytes_downloaded);
    let error_message = response
        .extensions()
        .get::<ErrorNote>()
        .map(|note| note.0.clone());

    let record = RequestRecord {
        api_key_id,
        method: method.to_string(),
        endpoint,
        status_code: response.status().as_u16(),
        duration: started.elapsed(),
        request_size,
        response_size,
        ip_address: Some(ip_address),
        user_agent,
        error_message,
        transfer,
    };

    if let Err(e) = UsageAggregator::new(&state.db).record(&record).await {
        warn!(api_key_id, error = %e, "Failed to record API usage");
    }

    response
}
