mod reset_ticket_store_redis;

pub use reset_ticket_store_redis::*;
