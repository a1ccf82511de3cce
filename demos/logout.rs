//! Example: Revoke the stored token and forget it
//!
//! Usage:
//!   cargo run --example logout -- [--config FILE] [--token-file FILE]

mod cli;

use cli::{init_tracing, parse_options};
use osf_explorer::ExplorerHandle;
use osf_explorer::error::Result;

const USAGE: &str = "Usage: cargo run --example logout -- [--config FILE] [--token-file FILE]";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 0);

    let explorer = ExplorerHandle::connect(options.config)?;
    match explorer.restore_session().await? {
        Some(user) => {
            explorer.logout().await?;
            println!("Logged out {}", user.full_name);
        }
        None => println!("No stored session"),
    }

    explorer.shutdown().await;
    Ok(())
}
