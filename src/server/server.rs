use crate::api::v1::CookiePolicy;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{AdminSeed, Settings, StorageBackend};
use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Storage adapters for one backend.
struct Backend {
    user_repo: Arc<dyn UserRepo>,
    session_store: Arc<dyn SessionStore>,
    reset_ticket_store: Arc<dyn ResetTicketStore>,
    tx_manager: Arc<dyn TxManager>,
    pool: Option<Pool<MySql>>,
}

impl Backend {
    async fn open(settings: &Settings) -> anyhow::Result<Self> {
        let storage = &settings.storage;
        match storage.backend {
            StorageBackend::Mysql => {
                let mysql_dsn = storage
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("storage.mysql_dsn is required for the mysql backend"))?;
                let redis_dsn = storage
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("storage.redis_dsn is required for the mysql backend"))?;

                let pool = Pool::<MySql>::connect(mysql_dsn)
                    .await
                    .context("connecting to mysql")?;
                let redis_client = redis::Client::open(redis_dsn)?;
                let redis_manager = redis_client
                    .get_connection_manager()
                    .await
                    .context("connecting to redis")?;

                info!("storage backend: mysql + redis");
                Ok(Backend {
                    user_repo: Arc::new(MySqlUserRepo::new(pool.clone())),
                    session_store: Arc::new(MySqlSessionStore::new(pool.clone())),
                    reset_ticket_store: Arc::new(RedisResetTicketStore::new(
                        redis_manager,
                        storage.redis_prefix.clone(),
                    )),
                    tx_manager: Arc::new(MySqlTxManager::new(pool.clone())),
                    pool: Some(pool),
                })
            }
            StorageBackend::Memory => {
                let db = MemoryDb::new();
                warn!("storage backend: memory, nothing survives a restart");
                Ok(Backend {
                    user_repo: Arc::new(MemoryUserRepo::new(db.clone())),
                    session_store: Arc::new(MemorySessionStore::new(db.clone())),
                    reset_ticket_store: Arc::new(MemoryResetTicketStore::new()),
                    tx_manager: Arc::new(MemoryTxManager::new(db)),
                    pool: None,
                })
            }
        }
    }
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_admin_service: Arc<dyn UserAdminService>,
    pub gate: Arc<Gate>,
    pub cookie_policy: CookiePolicy,
    pool: Option<Pool<MySql>>,
}

impl Server {
    /// Assembles a server from services that are already wired.
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_admin_service: Arc<dyn UserAdminService>,
        gate: Arc<Gate>,
        cookie_policy: CookiePolicy,
    ) -> Self {
        Server {
            auth_service,
            user_admin_service,
            gate,
            cookie_policy,
            pool: None,
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        Self::try_with_notifier(settings, Arc::new(LogResetNotifier)).await
    }

    /// Same wiring with a caller-chosen reset delivery channel.
    pub async fn try_with_notifier(
        settings: &Settings,
        reset_notifier: Arc<dyn ResetNotifier>,
    ) -> anyhow::Result<Self> {
        let auth = &settings.auth;
        if auth.signing_key.is_empty() {
            bail!("auth.signing_key must not be empty");
        }
        if auth.reset_token_key.is_empty() {
            bail!("auth.reset_token_key must not be empty");
        }

        let backend = Backend::open(settings).await?;

        let credential_hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2CredentialHasher::with_cost(
                auth.argon2.memory_kib,
                auth.argon2.iterations,
                auth.argon2.parallelism,
                auth.reset_token_key.clone().into_bytes(),
            )?);

        let access_ttl = Duration::from_secs(auth.access_ttl_secs);
        let refresh_ttl = Duration::from_secs(auth.refresh_ttl_secs);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            access_ttl,
            refresh_ttl,
            signing_key: auth.signing_key.clone().into_bytes(),
        }));

        if let Some(seed) = &settings.admin {
            seed_admin(seed, backend.user_repo.as_ref(), credential_hasher.as_ref()).await?;
        }

        let auth_service: Arc<dyn AuthService> = Arc::new(
            RealAuthService::new(
                backend.user_repo.clone(),
                backend.session_store.clone(),
                backend.reset_ticket_store,
                reset_notifier,
                credential_hasher,
                token_codec.clone(),
                backend.tx_manager.clone(),
            )
            .with_reset_ticket_ttl(Duration::from_secs(auth.reset_ticket_ttl_secs))
            .with_min_password_len(auth.min_password_len),
        );

        let user_admin_service: Arc<dyn UserAdminService> = Arc::new(RealUserAdminService::new(
            backend.user_repo,
            backend.session_store,
            backend.tx_manager,
        ));

        let cookie_policy = CookiePolicy {
            secure: settings.http.secure_cookies,
            access_max_age_secs: access_ttl.as_secs(),
            refresh_max_age_secs: refresh_ttl.as_secs(),
        };

        info!("server started");

        Ok(Self {
            auth_service,
            user_admin_service,
            gate: Arc::new(Gate::new(token_codec)),
            cookie_policy,
            pool: backend.pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

async fn seed_admin(
    seed: &AdminSeed,
    user_repo: &dyn UserRepo,
    credential_hasher: &dyn CredentialHasher,
) -> anyhow::Result<()> {
    let admin = UserRecord {
        user_id: UserId::new_random(),
        username: seed.username.clone(),
        email: seed.email.clone(),
        password_hash: credential_hasher.hash_password(&seed.password).await?,
        status: UserStatus::Active,
        role: Role::Admin,
        created_at: Utc::now(),
    };

    if user_repo.insert_if_absent(&admin).await? {
        info!(username = %seed.username, "administrator account created");
    } else {
        debug!(username = %seed.username, "administrator account already present");
    }
    Ok(())
}
