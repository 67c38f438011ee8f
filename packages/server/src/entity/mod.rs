pub mod api_request_log;
pub mod api_usage_daily;
pub mod plan_limit;
pub mod portfolio;
pub mod portfolio_like;
pub mod portfolio_view;
pub mod public_api_key;
pub mod storage_container;
pub mod storage_usage_daily;
pub mod stored_file;
pub mod user;
