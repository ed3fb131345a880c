pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod repositories;
pub mod services;
pub mod testing;
pub mod validate;

pub use auth::Claims;
pub use context::Context;
pub use error::{AdalError, ErrorKind};
