//! Example: Log in to the OSF and store the token
//!
//! Usage:
//!   cargo run --example login -- [--config FILE] [--token-file FILE] [--proxy PROXY]
//!
//! OSF_CLIENT_ID and OSF_REDIRECT_URI must name a registered OAuth application.

mod cli;

use cli::{init_tracing, open_session, parse_options};
use osf_explorer::error::Result;

const USAGE: &str =
    "Usage: cargo run --example login -- [--config FILE] [--token-file FILE] [--proxy PROXY]";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 0);

    let explorer = open_session(&options).await?;
    if let Some(user) = explorer.user().await? {
        println!();
        println!("Name: {}", user.full_name);
        println!("User ID: {}", user.id);
    }
    if let Some(path) = &options.config.token_file {
        println!("Token stored in: {}", path.display());
    }

    explorer.shutdown().await;
    Ok(())
}
