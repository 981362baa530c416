use crate::logger::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// What a request that just saw a 401 should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Retry,
    GiveUp,
}

/// Performs the actual refresh call; the coordinator decides who calls it.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct State {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Single-flight refresh: `idle -> refreshing -> idle`. The first caller to
/// see a 401 runs the refresh, every caller arriving meanwhile waits for
/// that same attempt instead of spending the refresh token again.
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    state: Mutex<State>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        RefreshCoordinator {
            refresher,
            state: Mutex::new(State::default()),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub async fn on_unauthorized(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            // A dropped leader closes the channel.
            return rx.await.unwrap_or(RefreshOutcome::GiveUp);
        }

        let mut leader = Leader {
            coordinator: self,
            outcome: RefreshOutcome::GiveUp,
        };
        match self.refresher.refresh().await {
            Ok(()) => {
                debug!("token refresh succeeded");
                leader.outcome = RefreshOutcome::Retry;
            }
            Err(e) => warn!("token refresh failed: {:#}", e),
        }
        leader.outcome
    }

    fn release(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(waiters = waiters.len(), ?outcome, "releasing queued requests");
        for waiter in waiters {
            let _ = waiter.send(outcome);
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the wait-list however the leader's future ends, including
/// being dropped mid-refresh.
struct Leader<'a> {
    coordinator: &'a RefreshCoordinator,
    outcome: RefreshOutcome,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        self.coordinator.release(self.outcome);
    }
}
