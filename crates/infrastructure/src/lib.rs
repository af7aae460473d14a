pub mod cache;
pub mod database;
pub mod error_handling;
pub mod timeout_handler;

pub use cache::*;
pub use database::*;
pub use timeout_handler::TimeoutUtils;
