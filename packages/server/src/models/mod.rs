pub mod api_key;
pub mod portfolio;
pub mod shared;
pub mod storage;
