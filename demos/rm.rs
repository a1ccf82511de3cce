mod cli;

use cli::{init_tracing, open_session, parse_options, resolve_path};
use osf_explorer::error::Result;

const USAGE: &str = "Usage: cargo run --example rm -- [--config FILE] [--token-file FILE] <PATH>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 1);
    let explorer = open_session(&options).await?;

    let node = resolve_path(&explorer, &options.positionals[0]).await?;
    println!("Deleting: {}", node.name);
    explorer.delete(&node.id).await?;
    println!("Deleted.");

    explorer.shutdown().await;
    Ok(())
}
