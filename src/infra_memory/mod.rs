//! Process-local adapters with the same semantics as the MySQL and Redis
//! ones. Backs the `memory` storage backend and the test suites.

mod reset_ticket_store_memory;
mod session_store_memory;
mod store;
mod user_repo_memory;

pub use reset_ticket_store_memory::*;
pub use session_store_memory::*;
pub use store::{MemoryDb, MemoryTx, MemoryTxManager};
pub use user_repo_memory::*;
