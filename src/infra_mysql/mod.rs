mod session_store_mysql;
mod tx_mysql;
mod user_repo_mysql;

pub use session_store_mysql::*;
pub use tx_mysql::*;
pub use user_repo_mysql::*;
