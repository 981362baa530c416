use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "gatehouse", about = "Session authentication service")]
pub struct Cli {
    /// Path to a settings file, without or with the `.toml` extension.
    #[arg(long)]
    pub settings: Option<String>,
}
