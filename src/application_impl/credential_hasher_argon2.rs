use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;

/// Argon2id for passwords and refresh-token digests, HMAC-SHA256 for the
/// deterministic reset-token cache key.
pub struct Argon2CredentialHasher {
    params: Params,
    deterministic_key: Vec<u8>,
}

impl Argon2CredentialHasher {
    pub fn new(params: Params, deterministic_key: Vec<u8>) -> Self {
        Argon2CredentialHasher {
            params,
            deterministic_key,
        }
    }

    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
        deterministic_key: Vec<u8>,
    ) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::InternalError(format!("argon2 params: {e}")))?;
        Ok(Self::new(params, deterministic_key))
    }

    fn argon2(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

#[async_trait::async_trait]
impl CredentialHasher for Argon2CredentialHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let params = self.params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Self::argon2(params)
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::InternalError(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("hash task: {e}")))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)
                .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

            // The PHC string carries its own parameters; verification ignores ours.
            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(_) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
            }
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("verify task: {e}")))?
    }

    fn hash_deterministic(&self, secret: &str) -> Result<String, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.deterministic_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(secret.as_bytes());
        let out = mac.finalize().into_bytes();
        Ok(hex::encode(out))
    }
}
