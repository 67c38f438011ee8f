use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use chrono::Duration;
use tracing::{error, instrument, warn};

use super::render::{render_error, render_not_found, render_portfolio};
use crate::extractors::client_ip;
use crate::portfolio::{PortfolioService, record_view};
use crate::state::AppState;

/// Serve tenant portfolios for requests whose `Host` names a tenant subdomain;
/// everything else continues to the regular router.
pub async fn subdomain_router(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host());

    let Some(slug) = host.and_then(|h| state.tenant_hosts.resolve(h)) else {
        return next.run(req).await;
    };

    let ip = client_ip::resolve(
        req.headers(),
        req.extensions(),
        &state.config.server.trusted_proxies,
    );
    serve_tenant(&state, &slug, &ip).await
}

#[instrument(skip(state), fields(slug = %slug))]
async fn serve_tenant(state: &AppState, slug: &str, ip: &str) -> Response {
    let platform_url = &state.config.portfolio.platform_url;

    let found = match PortfolioService::new(&state.db).find_published(slug).await {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "Failed to load tenant portfolio");
            return page(
                StatusCode::INTERNAL_SERVER_ERROR,
                render_error(&e.to_string(), platform_url),
            );
        }
    };

    let Some((mut portfolio, owner_name)) = found else {
        return page(StatusCode::NOT_FOUND, render_not_found(slug, platform_url));
    };

    let window = Duration::hours(state.config.portfolio.view_window_hours);
    match record_view(&state.db, portfolio.id, ip, None, window).await {
        Ok(true) => portfolio.views_count += 1,
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Failed to record portfolio view"),
    }

    page(
        StatusCode::OK,
        render_portfolio(&portfolio, &owner_name, platform_url),
    )
}

fn page(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}
