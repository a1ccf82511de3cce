//! Example: Upload a file into a folder, or as a new version of a file
//!
//! Usage:
//!   cargo run --example upload -- [--config FILE] [--token-file FILE] <LOCAL_PATH> <REMOTE_PATH>

mod cli;

use cli::{init_tracing, open_session, parse_options, resolve_path};
use osf_explorer::TreeEvent;
use osf_explorer::error::Result;
use osf_explorer::progress::make_progress_bar;

const USAGE: &str = "Usage: cargo run --example upload -- [--config FILE] [--token-file FILE] <LOCAL_PATH> <REMOTE_PATH>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 2);
    let explorer = open_session(&options).await?;

    let local = &options.positionals[0];
    let target = resolve_path(&explorer, &options.positionals[1]).await?;

    let mut events = explorer.subscribe();
    let reporter = tokio::spawn(async move {
        let mut bar = make_progress_bar();
        while let Ok(event) = events.recv().await {
            if let TreeEvent::Progress(progress) = event {
                bar(&progress);
            }
        }
    });

    println!("Uploading {} to {}", local, target.name);
    let record = explorer.upload(&target.id, local).await?;
    println!("Upload complete: {} ({})", record.name, record.display_size());

    reporter.abort();
    explorer.shutdown().await;
    Ok(())
}
