//! Global tracing subscriber with a reloadable filter, plus the logging
//! macros the rest of the crate imports from here.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
