mod auth_service;
mod user_admin_service;

pub use auth_service::*;
pub use user_admin_service::*;
