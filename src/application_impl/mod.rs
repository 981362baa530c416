mod auth_service_impl;
mod credential_hasher_argon2;
mod gate;
mod reset_notifier_log;
mod token_codec_jwt;
mod user_admin_service_impl;

pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use gate::*;
pub use reset_notifier_log::*;
pub use token_codec_jwt::*;
pub use user_admin_service_impl::*;
