// store

mod reset_ticket_store;
mod session_store;

pub use reset_ticket_store::*;
pub use session_store::*;

// repo

mod storage_tx;
mod user_repo;

pub use storage_tx::*;
pub use user_repo::*;

// delivery

mod reset_notifier;

pub use reset_notifier::*;
