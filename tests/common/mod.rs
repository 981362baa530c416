#![allow(dead_code)]

use chrono::Utc;
use gatehouse::api::v1::CookiePolicy;
use gatehouse::application_impl::*;
use gatehouse::application_port::*;
use gatehouse::domain_model::*;
use gatehouse::domain_port::*;
use gatehouse::infra_memory::*;
use gatehouse::server::Server;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ALICE_PASSWORD: &str = "CorrectPass1!";
pub const ADMIN_PASSWORD: &str = "AdminPass1!";

/// Keeps delivered reset tokens instead of mailing them.
#[derive(Default)]
pub struct CapturingNotifier {
    delivered: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait::async_trait]
impl ResetNotifier for CapturingNotifier {
    async fn deliver(&self, email: &str, reset_token: &str) -> Result<(), AuthError> {
        self.delivered
            .lock()
            .unwrap()
            .push((email.to_string(), reset_token.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub auth: Arc<dyn AuthService>,
    pub admin: Arc<dyn UserAdminService>,
    pub codec: Arc<dyn TokenCodec>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub user_repo: Arc<dyn UserRepo>,
    pub session_store: Arc<MemorySessionStore>,
    pub notifier: Arc<CapturingNotifier>,
    pub alice: UserRecord,
    pub bob: UserRecord,
    pub root: UserRecord,
}

pub fn codec(access_ttl: Duration) -> Arc<dyn TokenCodec> {
    Arc::new(JwtHs256Codec::new(JwtConfig {
        issuer: "gatehouse.test".into(),
        audience: "admin-console".into(),
        access_ttl,
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        signing_key: b"integration-signing-key".to_vec(),
    }))
}

pub fn hasher() -> Arc<dyn CredentialHasher> {
    Arc::new(Argon2CredentialHasher::with_cost(1024, 1, 1, b"integration-reset-key".to_vec()).unwrap())
}

async fn seed(
    user_repo: &dyn UserRepo,
    hasher: &dyn CredentialHasher,
    username: &str,
    password: &str,
    role: Role,
) -> UserRecord {
    let user = UserRecord {
        user_id: UserId::new_random(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: hasher.hash_password(password).await.unwrap(),
        status: UserStatus::Active,
        role,
        created_at: Utc::now(),
    };
    assert!(user_repo.insert_if_absent(&user).await.unwrap());
    user
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(Duration::from_secs(15 * 60), |repo| repo).await
    }

    pub async fn with_access_ttl(access_ttl: Duration) -> Self {
        Self::build(access_ttl, |repo| repo).await
    }

    /// `wrap` lets a test put a decorator around the user repo.
    pub async fn with_user_repo(
        wrap: impl FnOnce(Arc<dyn UserRepo>) -> Arc<dyn UserRepo>,
    ) -> Self {
        Self::build(Duration::from_secs(15 * 60), wrap).await
    }

    async fn build(
        access_ttl: Duration,
        wrap: impl FnOnce(Arc<dyn UserRepo>) -> Arc<dyn UserRepo>,
    ) -> Self {
        let db = MemoryDb::new();
        let memory_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new(db.clone()));
        let session_store = Arc::new(MemorySessionStore::new(db.clone()));
        let tx_manager: Arc<dyn TxManager> = Arc::new(MemoryTxManager::new(db));
        let tickets: Arc<dyn ResetTicketStore> = Arc::new(MemoryResetTicketStore::new());
        let notifier = Arc::new(CapturingNotifier::default());
        let codec = codec(access_ttl);
        let hasher = hasher();

        let alice = seed(memory_repo.as_ref(), hasher.as_ref(), "alice", ALICE_PASSWORD, Role::User).await;
        let bob = seed(memory_repo.as_ref(), hasher.as_ref(), "bob", "BobPass123!", Role::User).await;
        let root = seed(memory_repo.as_ref(), hasher.as_ref(), "root", ADMIN_PASSWORD, Role::Admin).await;

        let user_repo = wrap(memory_repo);

        let auth: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            session_store.clone(),
            tickets,
            notifier.clone(),
            hasher.clone(),
            codec.clone(),
            tx_manager.clone(),
        ));
        let admin: Arc<dyn UserAdminService> = Arc::new(RealUserAdminService::new(
            user_repo.clone(),
            session_store.clone(),
            tx_manager,
        ));

        Harness {
            auth,
            admin,
            codec,
            hasher,
            user_repo,
            session_store,
            notifier,
            alice,
            bob,
            root,
        }
    }

    pub fn server(&self) -> Arc<Server> {
        Arc::new(Server::new(
            self.auth.clone(),
            self.admin.clone(),
            Arc::new(Gate::new(self.codec.clone())),
            CookiePolicy {
                secure: false,
                access_max_age_secs: 900,
                refresh_max_age_secs: 604_800,
            },
        ))
    }

    pub async fn login(&self, who: &str, password: &str) -> Result<LoginResult, AuthError> {
        self.auth
            .login(LoginInput {
                email_or_username: who.to_string(),
                password: password.to_string(),
                session_info: SessionInfo::from_request(
                    Some("Mozilla/5.0 (iPhone) Mobile".to_string()),
                    Some("10.0.0.7".to_string()),
                ),
            })
            .await
    }

    pub async fn active_sessions(&self, user_id: UserId) -> Vec<RefreshSession> {
        self.session_store
            .list_active_for_user(user_id, Utc::now())
            .await
            .unwrap()
    }
}
