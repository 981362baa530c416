use crate::application_port::*;

/// Out-of-band delivery of a raw reset token (e-mail in production).
#[async_trait::async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, email: &str, reset_token: &str) -> Result<(), AuthError>;
}
