pub mod api_key;
pub mod portfolio;
pub mod public_api;
pub mod shared;
pub mod storage;
