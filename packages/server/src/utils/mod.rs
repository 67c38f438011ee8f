pub mod filename;
pub mod html;
pub mod jwt;
pub mod slug;
pub mod token;
pub mod units;
