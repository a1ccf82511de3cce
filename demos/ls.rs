//! Example: List a project, provider or folder
//!
//! Usage:
//!   cargo run --example ls -- [--config FILE] [--token-file FILE] <PATH>
//!
//! PATH is made of display names, e.g. "My Project/osfstorage/data". Use "/"
//! for the list of projects.

mod cli;

use cli::{init_tracing, open_session, parse_options, resolve_path};
use osf_explorer::error::Result;

const USAGE: &str = "Usage: cargo run --example ls -- [--config FILE] [--token-file FILE] <PATH>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 1);
    let explorer = open_session(&options).await?;

    let path = &options.positionals[0];
    let target = resolve_path(&explorer, path).await?;
    println!("\nListing: {}\n", path);

    let children = explorer.expand(&target.id).await?;
    if children.is_empty() {
        println!("  (empty)");
    }
    for child in children {
        let kind = if child.is_file() { "file" } else { "dir " };
        println!("  {} {:<40} {:>10}", kind, child.name, child.display_size());
    }

    explorer.shutdown().await;
    Ok(())
}
