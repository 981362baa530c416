mod reset_ticket;
mod session;
mod user;

pub use reset_ticket::*;
pub use session::*;
pub use user::*;
