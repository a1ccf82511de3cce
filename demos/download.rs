//! Example: Download a file with a progress bar
//!
//! Usage:
//!   cargo run --example download -- [--config FILE] [--token-file FILE] <REMOTE_PATH> <LOCAL_PATH>

mod cli;

use cli::{init_tracing, open_session, parse_options, resolve_path};
use indicatif::{ProgressBar, ProgressStyle};
use osf_explorer::TreeEvent;
use osf_explorer::error::Result;

const USAGE: &str = "Usage: cargo run --example download -- [--config FILE] [--token-file FILE] <REMOTE_PATH> <LOCAL_PATH>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 2);
    let explorer = open_session(&options).await?;

    let node = resolve_path(&explorer, &options.positionals[0]).await?;
    let local_path = &options.positionals[1];
    println!("Found: {} ({})", node.name, node.display_size());

    let progress_bar = ProgressBar::new(node.size.unwrap_or(0));
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress_bar.set_message(node.name.clone());

    let mut events = explorer.subscribe();
    let bar = progress_bar.clone();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let TreeEvent::Progress(progress) = event else {
                continue;
            };
            if progress.total > 0 {
                bar.set_length(progress.total);
                bar.set_position(progress.done.min(progress.total));
            } else {
                bar.set_length(progress.done.max(1));
                bar.set_position(progress.done);
            }
        }
    });

    explorer.download(&node.id, local_path).await?;
    progress_bar.finish_with_message(format!("{} complete", node.name));
    println!("Saved to: {}", local_path);

    reporter.abort();
    explorer.shutdown().await;
    Ok(())
}
