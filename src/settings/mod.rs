//! Layered settings: a TOML file chosen by build profile or `--settings`,
//! overridden by `GATEHOUSE__SECTION__KEY` environment variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
