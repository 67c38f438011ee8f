use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::shared::upload_body_limit;
use crate::handlers::{api_key, portfolio, storage};
use crate::state::AppState;

pub fn routes(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/portfolios", portfolio_routes())
        .nest("/storage", storage_routes(state))
}

fn portfolio_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            portfolio::list_portfolios,
            portfolio::create_portfolio
        ))
        .routes(routes!(
            portfolio::get_portfolio,
            portfolio::update_portfolio,
            portfolio::delete_portfolio
        ))
        .routes(routes!(portfolio::autosave_portfolio))
        .routes(routes!(portfolio::toggle_like))
        .routes(routes!(portfolio::get_public_portfolio))
}

fn storage_routes(state: &AppState) -> OpenApiRouter<AppState> {
    let files = OpenApiRouter::new()
        .routes(routes!(
            storage::list_container_files,
            storage::upload_file
        ))
        .layer(upload_body_limit(state));

    OpenApiRouter::new()
        .routes(routes!(storage::list_containers, storage::create_container))
        .routes(routes!(storage::get_container, storage::delete_container))
        .routes(routes!(storage::get_file, storage::delete_file))
        .routes(routes!(storage::download_file))
        .routes(routes!(storage::recalculate_container))
        .routes(routes!(storage::storage_usage))
        .merge(files)
        .merge(api_key_routes())
}

fn api_key_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            api_key::get_api_key,
            api_key::create_api_key,
            api_key::deactivate_api_key
        ))
        .routes(routes!(api_key::regenerate_secret))
        .routes(routes!(api_key::api_key_usage))
}
