use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entity::portfolio;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::client_ip::ClientIp;
use crate::extractors::json::AppJson;
use crate::models::portfolio::*;
use crate::models::shared::MessageResponse;
use crate::portfolio::{NewPortfolio, PortfolioService, record_view};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Portfolios",
    operation_id = "createPortfolio",
    summary = "Create a portfolio",
    description = "Creates a portfolio owned by the caller. The slug is derived from the title; \
        on collision a numeric suffix is appended (`foo`, `foo-1`, `foo-2`). \
        An owner may hold at most five portfolios.",
    request_body = CreatePortfolioRequest,
    responses(
        (status = 201, description = "Portfolio created", body = PortfolioResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Portfolio limit reached (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, title = %payload.title))]
pub async fn create_portfolio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePortfolioRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = NewPortfolio {
        title: payload.title.trim().to_string(),
        description: payload.description,
        html_content: payload.html_content,
        css_content: payload.css_content,
        js_content: payload.js_content,
        is_public: payload.is_public,
        tags: payload.tags.iter().map(|t| t.trim().to_string()).collect(),
    };

    let created = PortfolioService::new(&state.db)
        .create(auth_user.user_id, input, state.config.portfolio.max_per_owner)
        .await?;
    let url = state.config.portfolio.portfolio_url(&created.slug);

    Ok((
        StatusCode::CREATED,
        Json(PortfolioResponse::new(created, url)),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Portfolios",
    operation_id = "listPortfolios",
    summary = "List own portfolios",
    responses(
        (status = 200, description = "Caller's portfolios", body = PortfolioListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_portfolios(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PortfolioListResponse>, AppError> {
    let items = portfolio::Entity::find()
        .filter(portfolio::Column::OwnerId.eq(auth_user.user_id))
        .order_by_desc(portfolio::Column::UpdatedAt)
        .all(&state.db)
        .await?;

    let remaining = state
        .config
        .portfolio
        .max_per_owner
        .saturating_sub(items.len() as u64);
    let data = items
        .into_iter()
        .map(|p| {
            let url = state.config.portfolio.portfolio_url(&p.slug);
            PortfolioSummary::new(p, url)
        })
        .collect();

    Ok(Json(PortfolioListResponse { data, remaining }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Portfolios",
    operation_id = "getPortfolio",
    summary = "Get an own portfolio",
    params(("id" = Uuid, Path, description = "Portfolio ID")),
    responses(
        (status = 200, description = "Portfolio", body = PortfolioResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn get_portfolio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let found = PortfolioService::new(&state.db)
        .find_owned(auth_user.user_id, id)
        .await?;
    let url = state.config.portfolio.portfolio_url(&found.slug);
    Ok(Json(PortfolioResponse::new(found, url)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Portfolios",
    operation_id = "updatePortfolio",
    summary = "Update a portfolio",
    description = "Replaces the given fields. The slug is stable across updates.",
    params(("id" = Uuid, Path, description = "Portfolio ID")),
    request_body = UpdatePortfolioRequest,
    responses(
        (status = 200, description = "Portfolio updated", body = PortfolioResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, %id))]
pub async fn update_portfolio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdatePortfolioRequest>,
) -> Result<Json<PortfolioResponse>, AppError> {
    payload.validate()?;

    let found = PortfolioService::new(&state.db)
        .find_owned(auth_user.user_id, id)
        .await?;

    let mut active: portfolio::ActiveModel = found.into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(html) = payload.html_content {
        active.html_content = Set(html);
    }
    if let Some(css) = payload.css_content {
        active.css_content = Set(css);
    }
    if let Some(js) = payload.js_content {
        active.js_content = Set(js);
    }
    if let Some(is_public) = payload.is_public {
        active.is_public = Set(is_public);
    }
    if let Some(tags) = payload.tags {
        let tags: Vec<String> = tags.iter().map(|t| t.trim().to_string()).collect();
        active.tags = Set(serde_json::json!(tags));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    let url = state.config.portfolio.portfolio_url(&updated.slug);
    Ok(Json(PortfolioResponse::new(updated, url)))
}

#[utoipa::path(
    patch,
    path = "/{id}/autosave",
    tag = "Portfolios",
    operation_id = "autosavePortfolio",
    summary = "Autosave portfolio content",
    description = "Partial save of the markup, stylesheet and script blobs from the editor.",
    params(("id" = Uuid, Path, description = "Portfolio ID")),
    request_body = AutosaveRequest,
    responses(
        (status = 200, description = "Saved", body = MessageResponse),
        (status = 400, description = "Nothing to save (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, %id))]
pub async fn autosave_portfolio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<AutosaveRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.is_empty() {
        return Err(AppError::Validation("No content to save".into()));
    }

    let mut update = portfolio::Entity::update_many()
        .col_expr(portfolio::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(portfolio::Column::Id.eq(id))
        .filter(portfolio::Column::OwnerId.eq(auth_user.user_id));
    if let Some(html) = payload.html_content {
        update = update.col_expr(portfolio::Column::HtmlContent, Expr::value(html));
    }
    if let Some(css) = payload.css_content {
        update = update.col_expr(portfolio::Column::CssContent, Expr::value(css));
    }
    if let Some(js) = payload.js_content {
        update = update.col_expr(portfolio::Column::JsContent, Expr::value(js));
    }

    if update.exec(&state.db).await?.rows_affected == 0 {
        return Err(AppError::NotFound("Portfolio not found".into()));
    }
    Ok(Json(MessageResponse::ok("Saved")))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Portfolios",
    operation_id = "deletePortfolio",
    summary = "Delete a portfolio",
    description = "Deletes the portfolio with its view and like records.",
    params(("id" = Uuid, Path, description = "Portfolio ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn delete_portfolio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    PortfolioService::new(&state.db)
        .delete(auth_user.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/like",
    tag = "Portfolios",
    operation_id = "togglePortfolioLike",
    summary = "Like or unlike a portfolio",
    params(("id" = Uuid, Path, description = "Portfolio ID")),
    responses(
        (status = 200, description = "New like state", body = LikeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found or not public (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn toggle_like(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    let found = portfolio::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .filter(|p| p.is_public || p.owner_id == auth_user.user_id)
        .ok_or_else(|| AppError::NotFound("Portfolio not found".into()))?;

    let (liked, likes_count) = PortfolioService::new(&state.db)
        .toggle_like(found.id, auth_user.user_id)
        .await?;
    Ok(Json(LikeResponse { liked, likes_count }))
}

#[utoipa::path(
    get,
    path = "/by-slug/{slug}",
    tag = "Portfolios",
    operation_id = "getPublicPortfolio",
    summary = "Get a published portfolio",
    description = "Public detail view. Counts one view per client IP per rolling window, \
        the same policy the subdomain renderer applies.",
    params(("slug" = String, Path, description = "Portfolio slug")),
    responses(
        (status = 200, description = "Portfolio", body = PublicPortfolioResponse),
        (status = 404, description = "Not found or not public (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, ip), fields(%slug))]
pub async fn get_public_portfolio(
    auth_user: Option<AuthUser>,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicPortfolioResponse>, AppError> {
    let (mut found, author) = PortfolioService::new(&state.db)
        .find_published(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Portfolio not found".into()))?;

    let window = Duration::hours(state.config.portfolio.view_window_hours);
    let viewer = auth_user.map(|u| u.user_id);
    match record_view(&state.db, found.id, &ip, viewer, window).await {
        Ok(true) => found.views_count += 1,
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Failed to record portfolio view"),
    }

    let url = state.config.portfolio.portfolio_url(&found.slug);
    Ok(Json(PublicPortfolioResponse::new(found, author, url)))
}
