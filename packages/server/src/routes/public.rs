use axum::middleware;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api_auth::middleware::public_api_auth;
use crate::handlers::public_api;
use crate::handlers::shared::upload_body_limit;
use crate::state::AppState;

/// Every route here is authenticated by `public_api_auth`, which also records
/// usage for API-key callers.
pub fn routes(state: &AppState) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(public_api::upload))
        .layer(upload_body_limit(state));

    OpenApiRouter::new()
        .routes(routes!(public_api::list))
        .routes(routes!(public_api::metadata, public_api::delete))
        .routes(routes!(public_api::download))
        .routes(routes!(public_api::usage))
        .merge(upload)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            public_api_auth,
        ))
}
