mod common;

mod portfolio;
mod public_api;
mod seed;
mod storage;
