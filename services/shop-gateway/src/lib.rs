pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod security_middleware;
pub mod services;

pub use config::Config;
pub use errors::{GatewayError, Result};
