mod common;

use chrono::Utc;
use common::*;
use futures_util::future::join_all;
use gatehouse::application_port::*;
use gatehouse::client::{RefreshCoordinator, RefreshOutcome, TokenRefresher};
use gatehouse::domain_model::*;
use gatehouse::domain_port::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn reset(token: &str, password: &str) -> ResetPasswordInput {
    ResetPasswordInput {
        reset_token: token.to_string(),
        new_password: password.to_string(),
    }
}

#[tokio::test]
async fn login_refresh_logout_scenario() {
    let h = Harness::new().await;

    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();
    assert!(!login.access_token.0.is_empty());
    assert_eq!(login.role, Role::User);

    let refreshed = h.auth.refresh_token(&login.refresh_token).await.unwrap();
    let claims = h.codec.verify_access_token(&refreshed.access_token).await.unwrap();
    assert_eq!(claims.user_id, h.alice.user_id);

    h.auth
        .logout(h.alice.user_id, &login.refresh_token)
        .await
        .unwrap();

    assert!(matches!(
        h.auth.refresh_token(&login.refresh_token).await,
        Err(AuthError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn login_records_a_hashed_seven_day_session() {
    let h = Harness::new().await;
    let login = h.login("alice@example.com", ALICE_PASSWORD).await.unwrap();

    let claims = h.codec.verify_access_token(&login.access_token).await.unwrap();
    assert_eq!(claims.user_id, h.alice.user_id);
    assert_eq!(claims.username, "alice");

    let sessions = h.active_sessions(h.alice.user_id).await;
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];

    let refresh_claims = h.codec.verify_refresh_token(&login.refresh_token).await.unwrap();
    assert_eq!(refresh_claims.jti.as_deref(), Some(session.token_id.as_str()));
    assert_ne!(session.token_hash, login.refresh_token.0);
    assert!(h
        .hasher
        .verify_password(&login.refresh_token.0, &session.token_hash)
        .await
        .unwrap());

    let ahead = session.expires_at - Utc::now();
    assert!((ahead - chrono::Duration::days(7)).num_seconds().abs() <= 5);
    assert_eq!(session.device_info.as_deref(), Some("Mobile"));
    assert_eq!(session.ip_address.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let h = Harness::new().await;

    assert!(matches!(
        h.login("nobody", ALICE_PASSWORD).await,
        Err(AuthError::NotFound(m)) if m == "User does not exist"
    ));
    assert!(matches!(
        h.login("alice", "WrongPass1!").await,
        Err(AuthError::Unauthorized(m)) if m == "Invalid password"
    ));
    // Lookup is an exact match.
    assert!(matches!(
        h.login("ALICE", ALICE_PASSWORD).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn refresh_fails_once_the_session_is_revoked() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();
    let jti = h
        .codec
        .verify_refresh_token(&login.refresh_token)
        .await
        .unwrap()
        .jti
        .unwrap();

    assert!(h.session_store.revoke(&jti, Utc::now()).await.unwrap());

    assert!(matches!(
        h.auth.refresh_token(&login.refresh_token).await,
        Err(AuthError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn refresh_keeps_the_refresh_token_and_touches_the_session() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    h.auth.refresh_token(&login.refresh_token).await.unwrap();
    h.auth.refresh_token(&login.refresh_token).await.unwrap();

    let sessions = h.active_sessions(h.alice.user_id).await;
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].last_used_at.is_some());
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();
    let forged = RefreshToken(login.access_token.0.clone());

    assert!(matches!(
        h.auth.refresh_token(&forged).await,
        Err(AuthError::Unauthorized(_))
    ));
    assert!(matches!(
        h.auth.logout(h.alice.user_id, &forged).await,
        Err(AuthError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn second_logout_fails() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    h.auth
        .logout(h.alice.user_id, &login.refresh_token)
        .await
        .unwrap();
    assert!(matches!(
        h.auth.logout(h.alice.user_id, &login.refresh_token).await,
        Err(AuthError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn logout_is_scoped_to_the_caller() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    assert!(matches!(
        h.auth.logout(h.bob.user_id, &login.refresh_token).await,
        Err(AuthError::Unauthorized(_))
    ));
    assert_eq!(h.active_sessions(h.alice.user_id).await.len(), 1);
}

#[tokio::test]
async fn reset_ticket_is_readable_until_consumed() {
    let h = Harness::new().await;

    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();

    assert!(h.auth.verify_reset_token(&token).await.unwrap());
    assert!(h.auth.verify_reset_token(&token).await.unwrap());
    assert!(matches!(
        h.auth.verify_reset_token("not-a-ticket").await,
        Err(AuthError::BadRequest(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn reset_ticket_expires_after_fifteen_minutes() {
    let h = Harness::new().await;

    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();

    tokio::time::advance(std::time::Duration::from_secs(14 * 60)).await;
    assert!(h.auth.verify_reset_token(&token).await.unwrap());

    tokio::time::advance(std::time::Duration::from_secs(61)).await;
    assert!(matches!(
        h.auth.verify_reset_token(&token).await,
        Err(AuthError::BadRequest(_))
    ));
    assert!(matches!(
        h.auth.reset_password(reset(&token, "BrandNew123!")).await,
        Err(AuthError::BadRequest(_))
    ));
}

#[tokio::test]
async fn forgot_password_requires_a_known_active_email() {
    let h = Harness::new().await;

    assert!(matches!(
        h.auth.forgot_password("ghost@example.com").await,
        Err(AuthError::NotFound(m)) if m == "Email does not exist"
    ));

    h.admin
        .update_status(h.alice.user_id, UserStatus::Inactive)
        .await
        .unwrap();
    assert!(matches!(
        h.auth.forgot_password("alice@example.com").await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(h.notifier.last_token_for("alice@example.com").is_none());
}

#[tokio::test]
async fn reset_revokes_every_session_and_swaps_the_password() {
    let h = Harness::new().await;
    let first = h.login("alice", ALICE_PASSWORD).await.unwrap();
    let second = h.login("alice@example.com", ALICE_PASSWORD).await.unwrap();
    let bobs = h.login("bob", "BobPass123!").await.unwrap();
    assert_eq!(h.active_sessions(h.alice.user_id).await.len(), 2);

    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();
    h.auth
        .reset_password(reset(&token, "BrandNew123!"))
        .await
        .unwrap();

    assert!(h.active_sessions(h.alice.user_id).await.is_empty());
    for old in [&first.refresh_token, &second.refresh_token] {
        assert!(matches!(
            h.auth.refresh_token(old).await,
            Err(AuthError::Unauthorized(_))
        ));
    }
    // Other users are untouched.
    h.auth.refresh_token(&bobs.refresh_token).await.unwrap();

    assert!(matches!(
        h.login("alice", ALICE_PASSWORD).await,
        Err(AuthError::Unauthorized(_))
    ));
    h.login("alice", "BrandNew123!").await.unwrap();

    // The ticket is single use.
    assert!(matches!(
        h.auth.verify_reset_token(&token).await,
        Err(AuthError::BadRequest(_))
    ));
}

#[tokio::test]
async fn short_password_keeps_the_ticket() {
    let h = Harness::new().await;
    h.login("alice", ALICE_PASSWORD).await.unwrap();
    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();

    assert!(matches!(
        h.auth.reset_password(reset(&token, "short")).await,
        Err(AuthError::BadRequest(_))
    ));
    assert!(h.auth.verify_reset_token(&token).await.unwrap());
    assert_eq!(h.active_sessions(h.alice.user_id).await.len(), 1);
}

/// Fails every password write; everything else goes to the wrapped repo.
struct BrokenPasswordWrites(Arc<dyn UserRepo>);

#[async_trait::async_trait]
impl UserRepo for BrokenPasswordWrites {
    async fn find_by_email_or_username(&self, s: &str) -> Result<Option<UserRecord>, AuthError> {
        self.0.find_by_email_or_username(s).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        self.0.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        self.0.find_by_id(user_id).await
    }

    async fn insert_if_absent(&self, user: &UserRecord) -> Result<bool, AuthError> {
        self.0.insert_if_absent(user).await
    }

    async fn update_password_hash_in_tx(
        &self,
        _tx: &mut dyn StorageTx,
        _user_id: UserId,
        _password_hash: &str,
    ) -> Result<(), AuthError> {
        Err(AuthError::Store("disk full".to_string()))
    }

    async fn update_status_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        status: UserStatus,
    ) -> Result<(), AuthError> {
        self.0.update_status_in_tx(tx, user_id, status).await
    }
}

#[tokio::test]
async fn failed_password_write_rolls_back_the_revocation() {
    let h = Harness::with_user_repo(|repo| -> Arc<dyn UserRepo> {
        Arc::new(BrokenPasswordWrites(repo))
    })
    .await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();

    assert!(matches!(
        h.auth.reset_password(reset(&token, "BrandNew123!")).await,
        Err(AuthError::Store(_))
    ));

    // Neither half applied, and the ticket survives for a retry.
    assert_eq!(h.active_sessions(h.alice.user_id).await.len(), 1);
    h.auth.refresh_token(&login.refresh_token).await.unwrap();
    h.login("alice", ALICE_PASSWORD).await.unwrap();
    assert!(h.auth.verify_reset_token(&token).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_resets_spend_the_ticket_once() {
    let h = Harness::new().await;
    h.auth.forgot_password("alice@example.com").await.unwrap();
    let token = h.notifier.last_token_for("alice@example.com").unwrap();

    let (first, second) = tokio::join!(
        h.auth.reset_password(reset(&token, "FirstNew123!")),
        h.auth.reset_password(reset(&token, "SecondNew123!")),
    );
    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );

    let (winner, loser, refused) = if first.is_ok() {
        ("FirstNew123!", "SecondNew123!", second)
    } else {
        ("SecondNew123!", "FirstNew123!", first)
    };
    assert!(matches!(refused, Err(AuthError::BadRequest(_))));
    h.login("alice", winner).await.unwrap();
    assert!(matches!(
        h.login("alice", loser).await,
        Err(AuthError::Unauthorized(_))
    ));
    assert!(matches!(
        h.auth.verify_reset_token(&token).await,
        Err(AuthError::BadRequest(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_with_one_token_share_the_session() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    let results = join_all((0..8).map(|_| h.auth.refresh_token(&login.refresh_token))).await;
    for result in results {
        let refreshed = result.unwrap();
        let claims = h
            .codec
            .verify_access_token(&refreshed.access_token)
            .await
            .unwrap();
        assert_eq!(claims.user_id, h.alice.user_id);
    }

    let sessions = h.active_sessions(h.alice.user_id).await;
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].last_used_at.is_some());
    // The shared refresh token still works afterwards.
    h.auth.refresh_token(&login.refresh_token).await.unwrap();
}

#[tokio::test]
async fn blocked_accounts_are_forbidden_and_lose_their_sessions() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    h.admin
        .update_status(h.alice.user_id, UserStatus::Banned)
        .await
        .unwrap();
    assert!(h.active_sessions(h.alice.user_id).await.is_empty());

    let banned = h.login("alice", ALICE_PASSWORD).await;
    assert!(matches!(banned, Err(AuthError::Forbidden(m)) if m.contains("banned")));
    assert!(matches!(
        h.auth.refresh_token(&login.refresh_token).await,
        Err(AuthError::Forbidden(_))
    ));

    h.admin
        .update_status(h.alice.user_id, UserStatus::Inactive)
        .await
        .unwrap();
    let inactive = h.login("alice", ALICE_PASSWORD).await;
    assert!(matches!(inactive, Err(AuthError::Forbidden(m)) if m.contains("deactivated")));

    h.admin
        .update_status(h.alice.user_id, UserStatus::Active)
        .await
        .unwrap();
    h.login("alice", ALICE_PASSWORD).await.unwrap();
    // The pre-ban session stays revoked.
    assert!(matches!(
        h.auth.refresh_token(&login.refresh_token).await,
        Err(AuthError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn status_update_edge_cases() {
    let h = Harness::new().await;

    assert!(matches!(
        h.admin.update_status(h.alice.user_id, UserStatus::Active).await,
        Err(AuthError::Conflict(_))
    ));
    assert!(matches!(
        h.admin
            .update_status(UserId::new_random(), UserStatus::Banned)
            .await,
        Err(AuthError::NotFound(_))
    ));
    assert!(matches!(
        h.admin.list_sessions(UserId::new_random()).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn session_listing_hides_revoked_sessions() {
    let h = Harness::new().await;
    let first = h.login("alice", ALICE_PASSWORD).await.unwrap();
    h.login("alice", ALICE_PASSWORD).await.unwrap();
    h.auth
        .logout(h.alice.user_id, &first.refresh_token)
        .await
        .unwrap();

    let listed = h.admin.list_sessions(h.alice.user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    let json = serde_json::to_value(&listed[0]).unwrap();
    assert!(json.get("tokenHash").is_none());
    assert!(json.get("token_hash").is_none());
}

/// Calls the session manager's refresh and counts how often it ran.
struct ServiceRefresher {
    auth: Arc<dyn AuthService>,
    token: RefreshToken,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TokenRefresher for ServiceRefresher {
    async fn refresh(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Lets the other callers queue behind this attempt.
        tokio::task::yield_now().await;
        self.auth.refresh_token(&self.token).await?;
        Ok(())
    }
}

#[tokio::test]
async fn concurrent_unauthorized_requests_refresh_once() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();

    let refresher = Arc::new(ServiceRefresher {
        auth: h.auth.clone(),
        token: login.refresh_token.clone(),
        calls: AtomicUsize::new(0),
    });
    let coordinator = RefreshCoordinator::new(refresher.clone());

    let outcomes = join_all((0..2).map(|_| coordinator.on_unauthorized())).await;

    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes, [RefreshOutcome::Retry, RefreshOutcome::Retry]);
}

#[tokio::test]
async fn coordinator_gives_up_after_logout() {
    let h = Harness::new().await;
    let login = h.login("alice", ALICE_PASSWORD).await.unwrap();
    h.auth
        .logout(h.alice.user_id, &login.refresh_token)
        .await
        .unwrap();

    let refresher = Arc::new(ServiceRefresher {
        auth: h.auth.clone(),
        token: login.refresh_token,
        calls: AtomicUsize::new(0),
    });
    let coordinator = RefreshCoordinator::new(refresher.clone());

    let outcomes = join_all((0..3).map(|_| coordinator.on_unauthorized())).await;
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    assert!(outcomes.iter().all(|o| *o == RefreshOutcome::GiveUp));
}
