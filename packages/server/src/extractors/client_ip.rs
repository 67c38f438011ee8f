use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};

use crate::state::AppState;

/// Client address used for view dedupe and request logs.
///
/// Forwarding headers are honoured only when the socket peer is one of the
/// configured trusted proxies; otherwise the peer address is the client.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

fn header_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the client address from connection info, consulting forwarding
/// headers only for requests that arrive from `trusted_proxies`.
pub fn resolve(headers: &HeaderMap, extensions: &Extensions, trusted_proxies: &[IpAddr]) -> String {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match peer {
        Some(peer) if trusted_proxies.contains(&peer) => {
            header_ip(headers).unwrap_or_else(|| peer.to_string())
        }
        Some(peer) => peer.to_string(),
        None => "unknown".to_string(),
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(resolve(
            &parts.headers,
            &parts.extensions,
            &state.config.server.trusted_proxies,
        )))
    }
}
