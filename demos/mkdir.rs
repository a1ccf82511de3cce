mod cli;

use cli::{init_tracing, open_session, parse_options, resolve_path};
use osf_explorer::error::Result;

const USAGE: &str =
    "Usage: cargo run --example mkdir -- [--config FILE] [--token-file FILE] <PARENT_PATH> <NAME>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let options = parse_options(USAGE, 2);
    let explorer = open_session(&options).await?;

    let parent = resolve_path(&explorer, &options.positionals[0]).await?;
    let name = &options.positionals[1];

    println!("Creating folder {} in {}", name, parent.name);
    match explorer.create_folder(&parent.id, name).await {
        Ok(record) => {
            println!("Folder created successfully!");
            println!("Name: {}", record.name);
            println!("ID: {}", record.id);
        }
        Err(e) => {
            eprintln!("Failed to create folder: {}", e);
        }
    }

    explorer.shutdown().await;
    Ok(())
}
